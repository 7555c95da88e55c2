//! Userfeed Core - Domain entities, services, and traits.
//!
//! This crate contains the user domain and the change-feed relay contracts.
//! It is database-agnostic and defines traits that are implemented by the
//! `storage-sqlite` and `broker` crates.

pub mod constants;
pub mod errors;
pub mod events;
pub mod users;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
