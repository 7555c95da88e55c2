//! Cursor over the `user_changes` feed table.

use diesel::dsl::max;
use diesel::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::db::{get_connection, DbPool};
use crate::errors::IntoCore;
use crate::schema::user_changes;
use userfeed_core::constants::{
    CHANGE_FEED_BATCH_SIZE, DEFAULT_FEED_POLL_INTERVAL_MS, MIN_FEED_POLL_INTERVAL_MS,
};
use userfeed_core::errors::{DatabaseError, Error, Result};

use super::model::UserChangeDB;

/// Tuning knobs for a [`UserChangeStream`].
#[derive(Debug, Clone)]
pub struct ChangeStreamOptions {
    /// Upper bound on how long a committed change can go unnoticed when the
    /// commit did not go through the local writer.
    pub poll_interval: Duration,
    pub batch_size: i64,
}

impl Default for ChangeStreamOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_FEED_POLL_INTERVAL_MS),
            batch_size: CHANGE_FEED_BATCH_SIZE,
        }
    }
}

impl ChangeStreamOptions {
    /// Poll interval actually waited on, never below the minimum.
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval
            .max(Duration::from_millis(MIN_FEED_POLL_INTERVAL_MS))
    }
}

enum Wake {
    Cancelled,
    Commit,
    CommitsClosed,
    Timer,
}

/// Forward-only cursor over user mutations, starting after the last change
/// recorded when it was opened.
pub struct UserChangeStream {
    pool: Arc<DbPool>,
    options: ChangeStreamOptions,
    commits: Option<watch::Receiver<u64>>,
    position: i64,
    pending: VecDeque<UserChangeDB>,
    closed: bool,
}

impl UserChangeStream {
    /// Opens a cursor positioned at the current end of the feed.
    ///
    /// `commits` is the writer's commit counter; without it the cursor only
    /// polls.
    pub async fn open(
        pool: Arc<DbPool>,
        options: ChangeStreamOptions,
        commits: Option<watch::Receiver<u64>>,
    ) -> Result<Self> {
        let position = run_blocking(pool.clone(), |conn| {
            user_changes::table
                .select(max(user_changes::seq))
                .first::<Option<i64>>(conn)
                .into_core()
        })
        .await?
        .unwrap_or(0);

        Ok(Self {
            pool,
            options,
            commits,
            position,
            pending: VecDeque::new(),
            closed: false,
        })
    }

    /// Sequence number of the last record handed out.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Waits for the next change record.
    ///
    /// Returns `Ok(None)` once `cancel` fires or the cursor has been closed.
    /// Any `Err` means the cursor can no longer make progress.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<UserChangeDB>> {
        loop {
            if self.closed || cancel.is_cancelled() {
                return Ok(None);
            }

            if let Some(record) = self.pending.pop_front() {
                self.position = record.seq;
                return Ok(Some(record));
            }

            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                batch = fetch_after(self.pool.clone(), self.position, self.options.batch_size) => batch?,
            };
            if !batch.is_empty() {
                self.pending.extend(batch);
                continue;
            }

            match self.wait(cancel).await {
                Wake::Cancelled => return Ok(None),
                Wake::CommitsClosed => self.commits = None,
                Wake::Commit | Wake::Timer => {}
            }
        }
    }

    /// Releases the cursor. Later calls to [`next`](Self::next) return `None`.
    pub fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
        self.commits = None;
    }

    async fn wait(&mut self, cancel: &CancellationToken) -> Wake {
        let poll = tokio::time::sleep(self.options.effective_poll_interval());
        match self.commits.as_mut() {
            Some(commits) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                changed = commits.changed() => match changed {
                    Ok(()) => Wake::Commit,
                    Err(_) => Wake::CommitsClosed,
                },
                _ = poll => Wake::Timer,
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                _ = poll => Wake::Timer,
            },
        }
    }
}

async fn fetch_after(pool: Arc<DbPool>, position: i64, limit: i64) -> Result<Vec<UserChangeDB>> {
    run_blocking(pool, move |conn| {
        user_changes::table
            .select(UserChangeDB::as_select())
            .filter(user_changes::seq.gt(position))
            .order(user_changes::seq.asc())
            .limit(limit)
            .load::<UserChangeDB>(conn)
            .into_core()
    })
    .await
}

/// Runs a read on a pooled connection off the async runtime.
async fn run_blocking<F, T>(pool: Arc<DbPool>, query: F) -> Result<T>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = get_connection(&pool)?;
        query(&mut *conn)
    })
    .await
    .map_err(|e| Error::Database(DatabaseError::ChangeStreamFailed(e.to_string())))?
}
