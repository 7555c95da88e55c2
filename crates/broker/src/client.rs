//! Broker client abstraction and its NATS JetStream implementation.

use async_nats::jetstream::context::PublishAckFuture;
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::jetstream::{self, Context as JetStreamContext};
use async_nats::HeaderMap;
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::errors::BrokerError;

/// Header carrying the ordering key of a message.
pub const KEY_HEADER: &str = "Userfeed-Key";

/// Outcome of a previously accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub topic: String,
    pub key: String,
    /// Stream sequence assigned by the broker, or the rejection reason.
    pub result: Result<u64, String>,
}

/// Minimal producer-side broker API.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Enqueues `payload` on `topic`, keyed for ordering by `key`.
    ///
    /// Returns once the client has accepted the message; delivery is
    /// reported later through [`delivery_reports`](Self::delivery_reports).
    async fn produce(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Takes the delivery report channel. Only the first call gets it.
    fn delivery_reports(&self) -> Option<mpsc::Receiver<DeliveryReport>>;
}

/// Connection settings for [`NatsBrokerClient`].
#[derive(Debug, Clone)]
pub struct NatsBrokerConfig {
    pub url: String,
    /// JetStream stream that stores the published subjects.
    pub stream_name: String,
    pub subjects: Vec<String>,
    /// Maximum number of messages awaiting acknowledgment.
    pub max_in_flight: usize,
}

impl NatsBrokerConfig {
    pub fn new(url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream_name: "USERFEED".to_string(),
            subjects: vec![topic.into()],
            max_in_flight: 1024,
        }
    }
}

struct PendingAck {
    topic: String,
    key: String,
    ack: PublishAckFuture,
}

/// JetStream-backed broker client.
///
/// Publishing only waits for the message to be handed to the connection;
/// acknowledgments are awaited by a resolver task and turned into
/// [`DeliveryReport`]s.
pub struct NatsBrokerClient {
    jetstream: JetStreamContext,
    in_flight: mpsc::Sender<PendingAck>,
    reports: Mutex<Option<mpsc::Receiver<DeliveryReport>>>,
}

impl NatsBrokerClient {
    /// Connects, makes sure the stream exists and starts the ack resolver.
    pub async fn connect(config: NatsBrokerConfig) -> Result<Self, BrokerError> {
        info!("Connecting to NATS at {}", config.url);
        let client = async_nats::connect(config.url.as_str())
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        let jetstream = jetstream::new(client);

        ensure_stream(&jetstream, &config).await?;

        let capacity = config.max_in_flight.max(1);
        let (in_flight, pending) = mpsc::channel(capacity);
        let (report_tx, reports) = mpsc::channel(capacity);
        tokio::spawn(resolve_acks(pending, report_tx));

        Ok(Self {
            jetstream,
            in_flight,
            reports: Mutex::new(Some(reports)),
        })
    }
}

#[async_trait]
impl BrokerClient for NatsBrokerClient {
    async fn produce(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        // Reserve the slot first so a full queue fails before anything is sent.
        let slot = self.in_flight.try_reserve().map_err(|e| match e {
            TrySendError::Full(_) => BrokerError::QueueFull,
            TrySendError::Closed(_) => BrokerError::Closed,
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(KEY_HEADER, key);

        let ack = self
            .jetstream
            .publish_with_headers(topic.to_string(), headers, payload.into())
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        slot.send(PendingAck {
            topic: topic.to_string(),
            key: key.to_string(),
            ack,
        });
        Ok(())
    }

    fn delivery_reports(&self) -> Option<mpsc::Receiver<DeliveryReport>> {
        self.reports.lock().ok().and_then(|mut reports| reports.take())
    }
}

async fn ensure_stream(
    jetstream: &JetStreamContext,
    config: &NatsBrokerConfig,
) -> Result<(), BrokerError> {
    let stream = jetstream
        .get_or_create_stream(StreamConfig {
            name: config.stream_name.clone(),
            subjects: config.subjects.clone(),
            ..Default::default()
        })
        .await
        .map_err(|e| BrokerError::Stream(e.to_string()))?;
    info!(
        "Using JetStream stream {} for {:?}",
        stream.cached_info().config.name,
        config.subjects
    );
    Ok(())
}

/// Awaits acknowledgments in publish order and forwards their outcome.
async fn resolve_acks(
    mut pending: mpsc::Receiver<PendingAck>,
    reports: mpsc::Sender<DeliveryReport>,
) {
    while let Some(PendingAck { topic, key, ack }) = pending.recv().await {
        let result = ack
            .await
            .map(|ack| ack.sequence)
            .map_err(|e| e.to_string());
        let report = DeliveryReport { topic, key, result };

        // Nobody may be listening; reports are diagnostics only.
        if let Err(TrySendError::Full(report)) = reports.try_send(report) {
            debug!("Delivery report queue full, discarding {:?}", report);
        }
    }
    debug!("NATS ack resolver stopped");
}
