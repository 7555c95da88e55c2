/// Page size used when a listing request leaves it unset
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a single listing request may ask for
pub const MAX_PAGE_SIZE: u32 = 100;
