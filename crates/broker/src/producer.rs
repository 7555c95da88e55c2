//! Publisher of user change events.

use async_trait::async_trait;
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use userfeed_core::errors::Result;
use userfeed_core::events::{DomainEvent, UserProducerTrait};

use crate::client::{BrokerClient, DeliveryReport};
use crate::errors::BrokerError;
use crate::wire::UserEventMessage;

/// Publishes user change events to a single topic, keyed by user id.
pub struct UserProducer {
    client: Arc<dyn BrokerClient>,
    topic: String,
    drain_started: AtomicBool,
}

impl UserProducer {
    pub fn new(client: Arc<dyn BrokerClient>, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
            drain_started: AtomicBool::new(false),
        }
    }

    /// Starts logging delivery reports. Runs at most once per producer.
    fn ensure_delivery_drain(&self) {
        if self.drain_started.swap(true, Ordering::AcqRel) {
            return;
        }

        match self.client.delivery_reports() {
            Some(mut reports) => {
                tokio::spawn(async move {
                    while let Some(report) = reports.recv().await {
                        log_delivery(&report);
                    }
                    debug!("Delivery report stream closed");
                });
            }
            None => info!("Delivery reports already taken; outcomes will not be logged"),
        }
    }
}

fn log_delivery(report: &DeliveryReport) {
    match &report.result {
        Ok(sequence) => debug!(
            "Delivered message for key '{}' to {} (seq {})",
            report.key, report.topic, sequence
        ),
        Err(reason) => error!(
            "Delivery failed for key '{}' on {}: {}",
            report.key, report.topic, reason
        ),
    }
}

#[async_trait]
impl UserProducerTrait for UserProducer {
    async fn send_message(&self, event: &DomainEvent) -> Result<()> {
        self.ensure_delivery_drain();

        let payload =
            serde_json::to_vec(&UserEventMessage::from(event)).map_err(BrokerError::from)?;
        self.client
            .produce(&self.topic, &event.user_id, payload)
            .await?;
        Ok(())
    }
}
