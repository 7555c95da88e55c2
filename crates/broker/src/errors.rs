//! Broker error types.

use thiserror::Error;
use userfeed_core::errors::Error;

/// Errors raised while talking to the message broker.
///
/// Converted to `userfeed_core::Error::Publish` at the crate boundary.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Failed to connect to broker: {0}")]
    Connect(String),

    #[error("Failed to prepare stream: {0}")]
    Stream(String),

    #[error("Failed to publish message: {0}")]
    Publish(String),

    #[error("In-flight message queue is full")]
    QueueFull,

    #[error("Broker client is closed")]
    Closed,

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<BrokerError> for Error {
    fn from(err: BrokerError) -> Self {
        Error::Publish(err.to_string())
    }
}
