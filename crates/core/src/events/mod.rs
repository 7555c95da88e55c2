//! Domain events module.
//!
//! Provides the user change event type and the relay contracts that carry
//! events from the store's change feed to a message broker.

mod domain_event;
mod relay;

pub use domain_event::*;
pub use relay::*;
