/// Default broker subject that user change events are published to
pub const DEFAULT_USER_EVENTS_TOPIC: &str = "userfeed.user-events";

/// Default interval between change feed polls when no commit is signalled
pub const DEFAULT_FEED_POLL_INTERVAL_MS: u64 = 500;

/// Number of change records fetched per cursor query
pub const CHANGE_FEED_BATCH_SIZE: i64 = 100;

/// Lower bound for the change feed poll interval
pub const MIN_FEED_POLL_INTERVAL_MS: u64 = 10;

/// Default age after which change feed records are pruned
pub const DEFAULT_FEED_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;

/// Interval between change feed pruning passes
pub const FEED_PRUNE_INTERVAL_SECS: u64 = 5 * 60;
