//! Age-based pruning of the `user_changes` feed table.

use chrono::{NaiveDateTime, TimeDelta, Utc};
use diesel::prelude::*;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::WriteHandle;
use crate::errors::IntoCore;
use crate::schema::user_changes;
use userfeed_core::constants::{DEFAULT_FEED_RETENTION_SECS, FEED_PRUNE_INTERVAL_SECS};
use userfeed_core::errors::Result;

/// How long change records are kept and how often old ones are removed.
#[derive(Debug, Clone)]
pub struct FeedRetention {
    pub max_age: Duration,
    pub prune_interval: Duration,
}

impl Default for FeedRetention {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(DEFAULT_FEED_RETENTION_SECS),
            prune_interval: Duration::from_secs(FEED_PRUNE_INTERVAL_SECS),
        }
    }
}

impl FeedRetention {
    /// Oldest `recorded_at` that survives a pass run at `now`.
    ///
    /// `None` when the window reaches past the start of the calendar.
    pub fn cutoff(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let max_age = TimeDelta::from_std(self.max_age).ok()?;
        now.checked_sub_signed(max_age)
    }
}

/// Deletes change records recorded before `cutoff`.
///
/// Returns the number of removed records. Sequence numbers are never reused,
/// so cursors opened later still only see new mutations.
pub async fn prune_user_changes(writer: &WriteHandle, cutoff: NaiveDateTime) -> Result<usize> {
    writer
        .exec(move |conn| {
            diesel::delete(user_changes::table.filter(user_changes::recorded_at.lt(cutoff)))
                .execute(conn)
                .into_core()
        })
        .await
}

/// Spawns a task that prunes the change feed every `prune_interval` until
/// `cancel` fires. The first pass runs immediately.
pub fn spawn_feed_pruner(
    writer: WriteHandle,
    retention: FeedRetention,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Change feed pruner started (retention {:?}, every {:?})",
            retention.max_age, retention.prune_interval
        );
        let mut ticker = tokio::time::interval(retention.prune_interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(cutoff) = retention.cutoff(Utc::now().naive_utc()) else {
                continue;
            };
            match prune_user_changes(&writer, cutoff).await {
                Ok(0) => debug!("No change records older than {}", cutoff),
                Ok(removed) => info!(
                    "Pruned {} change records older than {}",
                    removed, cutoff
                ),
                Err(e) => warn!("Failed to prune change feed: {}", e),
            }
        }

        info!("Change feed pruner stopped");
    })
}
