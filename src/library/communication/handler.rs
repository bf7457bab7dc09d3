use super::{
    BrokerClient, BrokerFactory, BrokerSubscription, ConnectionError, FrameCommand, Headers,
    InboundMessage, MessageConsumer, TransportError,
};
use crate::constants::SENTINEL_BODY;
use crate::library::helpers::{with_timeout, BackgroundWork};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

/// Maximum duration a connection attempt may take
const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);

/// Minimum pause before a waiter takes another pass over messages it has turned down
const REDELIVERY_BACKOFF: Duration = Duration::from_millis(20);

/// Handle to an indefinite subscription, see [`TransportHandler::listen`]
pub type Listener = BackgroundWork;

struct Connection<C> {
    client: Arc<C>,
    session: String,
}

/// Owner of the connection to a message broker
///
/// A handler created with [`disabled`](TransportHandler::disabled) represents a deployment without
/// a broker. Every operation on it succeeds without doing anything and operations which would
/// produce something return `None`.
///
/// The connection is established lazily by the first operation that needs it and may be shared
/// between multiple users by wrapping the handler in an [`Arc`].
pub struct TransportHandler<F: BrokerFactory> {
    factory: Option<F>,
    connection: Mutex<Option<Connection<F::Client>>>,
    sequence: AtomicU64,
}

impl<F: BrokerFactory> TransportHandler<F> {
    /// Creates a new handler which connects using the given factory
    pub fn new(factory: F) -> Self {
        Self::from_factory(Some(factory))
    }

    /// Creates a handler for a deployment without a broker
    pub fn disabled() -> Self {
        Self::from_factory(None)
    }

    fn from_factory(factory: Option<F>) -> Self {
        Self {
            factory,
            connection: Mutex::new(None),
            sequence: AtomicU64::new(0),
        }
    }

    /// Whether a broker has been configured
    pub fn is_enabled(&self) -> bool {
        self.factory.is_some()
    }

    /// Establishes the connection unless it is already open
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let mut slot = self.connection.lock().await;
        self.connect_locked(&mut slot).await.map(|_| ())
    }

    /// Closes the connection if one is open
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        if let Some(connection) = self.connection.lock().await.take() {
            info!("Disconnecting from broker");
            connection
                .client
                .close()
                .await
                .map_err(ConnectionError::Broker)?;
        }

        Ok(())
    }

    /// Whether a live, open connection exists
    pub async fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.client.is_open())
            .unwrap_or(false)
    }

    /// Sends a message to a queue, dropping headers with empty values
    #[instrument(skip(self, body, headers))]
    pub async fn publish(
        &self,
        queue: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<(), ConnectionError> {
        let client = match self.client().await? {
            Some(client) => client,
            None => return Ok(()),
        };

        let headers: Headers = headers
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        trace!(?headers, "Publishing message");
        client
            .publish(queue, body, &headers)
            .await
            .map_err(ConnectionError::Broker)
    }

    /// Mints a token which is unique for every call on this connection
    ///
    /// Combines the session identifier of the connection with a high resolution timestamp and
    /// a sequence number. Requires an established connection.
    pub async fn correlation_token(&self) -> Result<Option<String>, ConnectionError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let slot = self.connection.lock().await;
        let connection = slot.as_ref().ok_or(ConnectionError::NotConnected)?;

        let now = Utc::now();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

        Ok(Some(format!(
            "{}_{}.{:09}-{}",
            connection.session,
            now.timestamp(),
            now.timestamp_subsec_nanos(),
            sequence
        )))
    }

    /// Hands every message arriving on a queue to a consumer until the returned work is stopped
    ///
    /// Every delivery, including the probe message, is acknowledged before the consumer sees it.
    /// Errors returned by the consumer are logged and do not end the subscription.
    #[instrument(skip(self, consumer))]
    pub async fn listen<C>(
        &self,
        queue: &str,
        consumer: C,
    ) -> Result<Option<Listener>, ConnectionError>
    where
        C: MessageConsumer + Send + Sync + 'static,
    {
        let client = match self.client().await? {
            Some(client) => client,
            None => return Ok(None),
        };

        info!("Subscribing to {}", queue);
        let mut subscription = self.subscribe(client.as_ref(), queue).await?;
        let queue = queue.to_owned();

        let work = BackgroundWork::spawn(move |mut signal| async move {
            loop {
                let delivery = tokio::select! {
                    _ = signal.cancelled() => break,
                    delivery = subscription.next() => delivery,
                };

                match delivery {
                    Ok(Some(delivery)) => {
                        if let Err(e) = subscription.ack(&delivery).await {
                            warn!(%queue, error = %e, "Failed to acknowledge message");
                        }

                        if delivery.message.is_sentinel() {
                            continue;
                        }

                        if let Err(e) = consumer.consume(delivery.message).await {
                            error!(%queue, error = %e, "Error during polling");
                        }
                    }
                    Ok(None) => {
                        warn!(%queue, "Subscription has been closed by the broker");
                        break;
                    }
                    Err(e) => {
                        error!(%queue, error = %e, "Failed to receive message");
                        break;
                    }
                }
            }

            if let Err(e) = subscription.unsubscribe().await {
                warn!(%queue, error = %e, "Failed to unsubscribe");
            }
        });

        Ok(Some(work))
    }

    /// Waits for the first message on a queue which satisfies the predicate
    ///
    /// Messages rejected by the predicate are handed back to the broker right away so that other
    /// subscribers of the same queue can pick them up. Once every waiting message has been turned
    /// down, the next pass starts after a short pause. The deadline covers subscribing as well as
    /// waiting. When it passes, the subscription is cancelled and a [`TransportError::Timeout`] is
    /// returned.
    #[instrument(skip(self, predicate))]
    pub async fn listen_with_timeout<P>(
        &self,
        queue: &str,
        timeout: Duration,
        mut predicate: P,
    ) -> Result<Option<InboundMessage>, TransportError>
    where
        P: FnMut(&InboundMessage) -> bool + Send + 'static,
    {
        let client = match self.client().await? {
            Some(client) => client,
            None => return Ok(None),
        };

        let deadline = Instant::now() + timeout;

        info!("Subscribing to {} with timeout {:?}", queue, timeout);
        let mut subscription =
            match tokio::time::timeout_at(deadline, self.subscribe(client.as_ref(), queue)).await {
                Ok(subscription) => subscription?,
                Err(_) => return Err(TransportError::Timeout(timeout)),
            };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let outcome = with_timeout(remaining, move |mut signal| async move {
            let mut rejected = HashSet::new();

            let result = loop {
                let delivery = tokio::select! {
                    _ = signal.cancelled() => break Ok(None),
                    delivery = subscription.next() => delivery,
                };

                match delivery {
                    Ok(Some(delivery)) if delivery.message.is_sentinel() => {
                        if let Err(e) = subscription.ack(&delivery).await {
                            warn!(error = %e, "Failed to acknowledge probe message");
                        }
                    }
                    Ok(Some(delivery)) => {
                        if predicate(&delivery.message) {
                            if let Err(e) = subscription.ack(&delivery).await {
                                error!(error = %e, "Failed to acknowledge message");
                            }

                            break Ok(Some(delivery.message));
                        }

                        trace!("Returning message which does not satisfy the predicate");
                        if let Err(e) = subscription.reject(&delivery).await {
                            warn!(error = %e, "Failed to return message to the queue");
                        }

                        if !rejected.insert(delivery.message) {
                            tokio::select! {
                                _ = signal.cancelled() => break Ok(None),
                                _ = tokio::time::sleep(redelivery_backoff()) => {}
                            }
                        }
                    }
                    Ok(None) => break Err(ConnectionError::SubscriptionClosed),
                    Err(e) => break Err(ConnectionError::Broker(e)),
                }
            };

            if let Err(e) = subscription.unsubscribe().await {
                warn!(error = %e, "Failed to unsubscribe");
            }

            result
        })
        .await;

        match outcome {
            Some(Ok(Some(message))) => Ok(Some(message)),
            Some(Ok(None)) | None => Err(TransportError::Timeout(timeout)),
            Some(Err(e)) => Err(e.into()),
        }
    }

    /// Publishes the probe message to force the queue into existence, then subscribes to it
    async fn subscribe(
        &self,
        client: &F::Client,
        queue: &str,
    ) -> Result<<F::Client as BrokerClient>::Subscription, ConnectionError> {
        client
            .publish(queue, SENTINEL_BODY, &Headers::new())
            .await
            .map_err(ConnectionError::Broker)?;

        client
            .subscribe(queue)
            .await
            .map_err(ConnectionError::Broker)
    }

    /// Retrieves the current client, connecting first if necessary
    async fn client(&self) -> Result<Option<Arc<F::Client>>, ConnectionError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let mut slot = self.connection.lock().await;
        self.connect_locked(&mut slot).await
    }

    async fn connect_locked(
        &self,
        slot: &mut Option<Connection<F::Client>>,
    ) -> Result<Option<Arc<F::Client>>, ConnectionError> {
        let factory = match &self.factory {
            Some(factory) => factory,
            None => return Ok(None),
        };

        if let Some(connection) = slot.as_ref() {
            if connection.client.is_open() {
                return Ok(Some(connection.client.clone()));
            }

            debug!("Existing connection has been closed, reconnecting");
        }

        info!("Connecting to broker");

        let client = tokio::time::timeout(CONNECT_TIMEOUT, factory.connect())
            .await
            .map_err(|_| ConnectionError::ConnectFailed("connection attempt timed out".into()))?
            .map_err(ConnectionError::ConnectFailed)?;

        if !client.is_open() {
            return Err(ConnectionError::ConnectFailed(
                "connection is not open".into(),
            ));
        }

        let frame = client.connection_frame();
        if frame.command == FrameCommand::Error {
            return Err(ConnectionError::Refused(frame.body.clone()));
        }

        let session = match frame.session() {
            Some(session) => session.to_owned(),
            None => Uuid::new_v4().to_string(),
        };

        let client = Arc::new(client);
        *slot = Some(Connection {
            client: client.clone(),
            session,
        });

        Ok(Some(client))
    }
}

/// Jittered so that waiters turning down each other's messages fall out of step
fn redelivery_backoff() -> Duration {
    let jitter = Uuid::new_v4().as_u128() % REDELIVERY_BACKOFF.as_millis();
    REDELIVERY_BACKOFF + Duration::from_millis(jitter as u64)
}
