//! Structures to talk to a message broker with queue semantics
//!
//! The broker itself is abstracted by the [`BrokerFactory`], [`BrokerClient`] and
//! [`BrokerSubscription`] traits. Implementations for specific brokers live in the
//! [`implementation`] module. On top of that the [`TransportHandler`] manages the connection
//! lifecycle and provides the two ways of receiving messages:
//!
//! 1. [`listen`](TransportHandler::listen) which hands every message to a [`MessageConsumer`] until stopped
//! 2. [`listen_with_timeout`](TransportHandler::listen_with_timeout) which waits for the first
//!    message satisfying a predicate, but no longer than a given duration
//!
//! Before subscribing, both publish a probe message to the queue as a queue that does not exist
//! can not be subscribed to on some brokers. The probe is filtered out before any callback sees it.

mod broker;
mod error;
mod handler;

pub mod implementation;

pub use broker::*;
pub use error::*;
pub use handler::*;
