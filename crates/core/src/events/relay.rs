//! Change-feed relay contracts and the dispatch loop that joins them.
//!
//! A watcher turns store mutations into [`DomainEvent`]s on a single-slot
//! channel; the dispatch loop drains that channel in order and hands each
//! event to a producer.

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::DomainEvent;
use crate::errors::Result;

/// Capacity of the watcher to dispatch loop handoff.
pub const HANDOFF_CAPACITY: usize = 1;

/// Ordered, cancellable sequence of user change events.
pub type UserEventStream = mpsc::Receiver<DomainEvent>;

/// Source of user change events.
#[async_trait]
pub trait UserWatcherTrait: Send + Sync {
    /// Opens a fresh cursor at the feed's current position and streams every
    /// subsequent mutation.
    ///
    /// The returned stream closes when `cancel` fires or the cursor fails.
    async fn watch_users(&self, cancel: CancellationToken) -> Result<UserEventStream>;
}

/// Sink that forwards user change events to a broker.
#[async_trait]
pub trait UserProducerTrait: Send + Sync {
    /// Enqueues one event for delivery.
    ///
    /// `Ok` means the broker client accepted the message, not that it was
    /// acknowledged remotely.
    async fn send_message(&self, event: &DomainEvent) -> Result<()>;
}

/// Counters reported when a dispatch loop finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub forwarded: u64,
    pub dropped: u64,
}

/// Forwards every event from `events` to `producer` in arrival order.
///
/// Failed sends are logged and the event is dropped. Returns once the stream
/// is closed by its sender.
pub async fn dispatch_user_events(
    mut events: UserEventStream,
    producer: &dyn UserProducerTrait,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    while let Some(event) = events.recv().await {
        match producer.send_message(&event).await {
            Ok(()) => {
                debug!(
                    "Forwarded {} event {} for user '{}'",
                    event.operation_type.as_str(),
                    event.id,
                    event.user_id
                );
                summary.forwarded += 1;
            }
            Err(e) => {
                error!(
                    "Failed to forward {} event {} for user '{}': {}",
                    event.operation_type.as_str(),
                    event.id,
                    event.user_id,
                    e
                );
                summary.dropped += 1;
            }
        }
    }

    info!(
        "User event stream closed ({} forwarded, {} dropped)",
        summary.forwarded, summary.dropped
    );
    summary
}
