//! SQLite storage implementation for userfeed.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the repository and watcher traits defined in `userfeed-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations, including the triggers that maintain the `user_changes` feed
//! - The user repository and the change feed cursor/watcher
//! - Age-based pruning of the change feed
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! This crate is the only place in the application where Diesel dependencies exist.
//!
//! ```text
//!   core (domain, relay contracts)
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!     SQLite DB (users + user_changes)
//! ```

pub mod db;
pub mod errors;
pub mod schema;

// Repository implementations
pub mod users;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from userfeed-core for convenience
pub use userfeed_core::errors::{DatabaseError, Error, Result};
