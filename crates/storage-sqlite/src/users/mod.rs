//! SQLite storage implementation for users and their change feed.

mod change_stream;
mod model;
mod repository;
mod retention;
mod watcher;

pub use change_stream::{ChangeStreamOptions, UserChangeStream};
pub use model::{decode_user_document, UserChangeDB, UserChangesetDB, UserDB};
pub use repository::UserRepository;
pub use retention::{prune_user_changes, spawn_feed_pruner, FeedRetention};
pub use watcher::UserChangeStreamWatcher;
