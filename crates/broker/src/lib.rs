//! Message broker publishing for userfeed.
//!
//! Provides the `BrokerClient` abstraction with a NATS JetStream
//! implementation, the JSON wire format of user change events, and
//! `UserProducer`, which implements `UserProducerTrait` from `userfeed-core`.

pub mod client;
pub mod errors;
pub mod producer;
pub mod wire;

pub use client::{BrokerClient, DeliveryReport, NatsBrokerClient, NatsBrokerConfig, KEY_HEADER};
pub use errors::BrokerError;
pub use producer::UserProducer;
pub use wire::{UserEventMessage, UserMessage, WireOperationType};
