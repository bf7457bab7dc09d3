use crate::library::BoxedError;
use std::time::Duration;
use thiserror::Error;

/// Failure to reach or talk to the message broker or the cache store
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Opening the connection failed
    #[error("unable to connect to broker")]
    ConnectFailed(#[source] BoxedError),
    /// Broker answered the connection attempt with an error frame
    #[error("broker refused connection: {0}")]
    Refused(String),
    /// An operation required a live connection but none has been established
    #[error("client not connected")]
    NotConnected,
    /// An operation on an established connection failed
    #[error("broker operation failed")]
    Broker(#[source] BoxedError),
    /// Broker ended a subscription while it was being waited on
    #[error("subscription has been closed by the broker")]
    SubscriptionClosed,
    /// Cache store could not be reached
    #[error("cache store unavailable")]
    Cache(#[source] BoxedError),
}

/// Error returned by [`TransportHandler`](super::TransportHandler) operations
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection level failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// No message satisfied the bounded wait in time
    #[error("no message consumed within {0:?}")]
    Timeout(Duration),
}
