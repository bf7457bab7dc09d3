use crate::constants::{HEADER_SESSION, SENTINEL_BODY};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Message headers as transported by the broker
pub type Headers = BTreeMap<String, String>;

/// Message as delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InboundMessage {
    /// Transport headers
    pub headers: Headers,
    /// Raw body
    pub body: String,
}

impl InboundMessage {
    /// Creates a new instance from raw parts
    pub fn new(headers: Headers, body: impl Into<String>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    /// Value of a header, if present
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Whether this is the probe message used to create a queue before subscribing
    pub fn is_sentinel(&self) -> bool {
        self.body == SENTINEL_BODY
    }
}

/// Message received through a [`BrokerSubscription`] which has not yet been acknowledged
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Opaque value identifying this delivery towards the broker
    pub receipt: String,
    /// Received message
    pub message: InboundMessage,
}

/// Kind of frame a broker answers a connection attempt with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCommand {
    /// Connection has been accepted
    Connected,
    /// Connection has been refused, the body describes why
    Error,
}

/// Frame returned by the broker when a connection is established
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFrame {
    /// Whether the connection was accepted
    pub command: FrameCommand,
    /// Frame headers, usually containing the session identifier
    pub headers: Headers,
    /// Frame body
    pub body: String,
}

impl ConnectionFrame {
    /// Frame of an accepted connection with the given session identifier
    pub fn connected(session: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert(HEADER_SESSION.to_string(), session.into());

        Self {
            command: FrameCommand::Connected,
            headers,
            body: String::new(),
        }
    }

    /// Frame of a refused connection
    pub fn error(body: impl Into<String>) -> Self {
        Self {
            command: FrameCommand::Error,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Session identifier assigned by the broker
    pub fn session(&self) -> Option<&str> {
        self.headers.get(HEADER_SESSION).map(String::as_str)
    }
}

/// Factory which opens connections to a message broker
#[async_trait]
pub trait BrokerFactory: Send + Sync + 'static {
    /// Client type returned by [`connect`](BrokerFactory::connect)
    type Client: BrokerClient;

    /// Opens a new connection
    async fn connect(&self) -> Result<Self::Client, BoxedError>;
}

/// Live connection to a message broker with queue semantics
///
/// Every message published to a queue is delivered to exactly one subscriber of that queue.
#[async_trait]
pub trait BrokerClient: Send + Sync + 'static {
    /// Subscription type returned by [`subscribe`](BrokerClient::subscribe)
    type Subscription: BrokerSubscription + 'static;

    /// Frame the broker answered the connection attempt with
    fn connection_frame(&self) -> &ConnectionFrame;

    /// Whether the connection is still usable
    fn is_open(&self) -> bool;

    /// Sends a message to a queue
    async fn publish(&self, queue: &str, body: &str, headers: &Headers) -> EmptyResult;

    /// Starts receiving messages from a queue with individual acknowledgement
    async fn subscribe(&self, queue: &str) -> Result<Self::Subscription, BoxedError>;

    /// Closes the connection
    async fn close(&self) -> EmptyResult;
}

/// Active subscription to a queue
///
/// Deliveries which have not been acknowledged when the subscription ends are handed back to the
/// broker and become available to other subscribers again.
#[async_trait]
pub trait BrokerSubscription: Send {
    /// Waits for the next delivery, `None` if the subscription has been closed by the broker
    ///
    /// Implementations have to be cancel safe: dropping the future must not lose a message.
    async fn next(&mut self) -> Result<Option<Delivery>, BoxedError>;

    /// Acknowledges a delivery which removes it from the queue for good
    async fn ack(&mut self, delivery: &Delivery) -> EmptyResult;

    /// Hands an unacknowledged delivery back to the broker right away
    ///
    /// The message is put behind everything currently waiting on the queue and may be delivered
    /// to any subscriber, including this one.
    async fn reject(&mut self, delivery: &Delivery) -> EmptyResult;

    /// Ends the subscription and returns all unacknowledged deliveries to the queue
    async fn unsubscribe(&mut self) -> EmptyResult;
}

/// Entity which processes messages received by an indefinite subscription
#[async_trait]
pub trait MessageConsumer {
    /// Processes a message, errors are logged by the caller and otherwise ignored
    async fn consume(&self, message: InboundMessage) -> EmptyResult;
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn recognise_sentinel_messages() {
        assert!(InboundMessage::new(Headers::new(), SENTINEL_BODY).is_sentinel());
        assert!(!InboundMessage::new(Headers::new(), "Foo").is_sentinel());
    }

    #[test]
    fn expose_session_of_connection_frame() {
        assert_eq!(ConnectionFrame::connected("123").session(), Some("123"));
        assert_eq!(ConnectionFrame::error("nope").session(), None);
    }
}
