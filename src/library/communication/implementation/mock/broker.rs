use crate::constants::SENTINEL_BODY;
use crate::library::communication::{
    BrokerClient, BrokerFactory, BrokerSubscription, ConnectionFrame, Delivery, Headers,
    InboundMessage,
};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Message as it has been handed to [`BrokerClient::publish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Destination queue
    pub queue: String,
    /// Headers passed to the broker
    pub headers: Headers,
    /// Raw body
    pub body: String,
}

/// Function which produces replies for messages published to a queue
///
/// Returned tuples contain the destination queue and the message to put on it.
pub type AutoReply =
    Arc<dyn Fn(&PublishedMessage) -> Vec<(String, InboundMessage)> + Send + Sync + 'static>;

struct MockQueue {
    messages: VecDeque<InboundMessage>,
    notifier: watch::Sender<()>,
    watcher: watch::Receiver<()>,
}

impl Default for MockQueue {
    fn default() -> Self {
        let (notifier, watcher) = watch::channel(());

        Self {
            messages: VecDeque::new(),
            notifier,
            watcher,
        }
    }
}

impl MockQueue {
    fn notify(&self) {
        self.notifier.send(()).ok();
    }
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, MockQueue>,
    published: Vec<PublishedMessage>,
    auto_replies: HashMap<String, AutoReply>,
    connections: usize,
    subscriptions_opened: usize,
    active_subscriptions: usize,
    next_receipt: u64,
    unsubscribe_delay: Option<Duration>,
}

impl BrokerState {
    fn push(&mut self, queue: &str, message: InboundMessage) {
        let queue = self.queues.entry(queue.to_owned()).or_default();
        queue.messages.push_back(message);
        queue.notify();
    }
}

#[derive(Clone)]
enum ConnectMode {
    Accept,
    Refuse(String),
    Unreachable,
}

/// Broker which keeps all queues in memory
///
/// Clones share the same queues so a test can keep one instance around for inspection while the
/// code under test owns another one.
#[derive(Clone)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
    mode: ConnectMode,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::with_mode(ConnectMode::Accept)
    }
}

impl MockBroker {
    /// Creates a broker which accepts every connection
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker which answers connection attempts with an error frame
    pub fn refusing(reason: &str) -> Self {
        Self::with_mode(ConnectMode::Refuse(reason.to_owned()))
    }

    /// Creates a broker which can not be reached at all
    pub fn unreachable() -> Self {
        Self::with_mode(ConnectMode::Unreachable)
    }

    fn with_mode(mode: ConnectMode) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            mode,
        }
    }

    /// Puts a message onto a queue without going through a client
    pub fn inject(&self, queue: &str, headers: Headers, body: &str) {
        self.state
            .lock()
            .unwrap()
            .push(queue, InboundMessage::new(headers, body));
    }

    /// Registers a function which is invoked for every message published to the queue
    pub fn auto_reply<F>(&self, queue: &str, reply: F)
    where
        F: Fn(&PublishedMessage) -> Vec<(String, InboundMessage)> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .unwrap()
            .auto_replies
            .insert(queue.to_owned(), Arc::new(reply));
    }

    /// Messages published to a queue through a client, excluding probe messages
    pub fn published(&self, queue: &str) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .unwrap()
            .published
            .iter()
            .filter(|m| m.queue == queue)
            .filter(|m| m.body != SENTINEL_BODY)
            .cloned()
            .collect()
    }

    /// Messages currently waiting on a queue
    pub fn queued(&self, queue: &str) -> Vec<InboundMessage> {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map(|q| q.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Makes every subsequent unsubscribe take the given time before it completes
    pub fn stall_unsubscribe(&self, delay: Duration) {
        self.state.lock().unwrap().unsubscribe_delay = Some(delay);
    }

    /// Number of connections that have been established
    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }

    /// Number of subscriptions that have been opened over the lifetime of the broker
    pub fn subscriptions_opened(&self) -> usize {
        self.state.lock().unwrap().subscriptions_opened
    }

    /// Number of subscriptions that have not yet ended
    pub fn active_subscriptions(&self) -> usize {
        self.state.lock().unwrap().active_subscriptions
    }
}

#[async_trait]
impl BrokerFactory for MockBroker {
    type Client = MockClient;

    async fn connect(&self) -> Result<Self::Client, BoxedError> {
        let frame = match &self.mode {
            ConnectMode::Accept => {
                let mut state = self.state.lock().unwrap();
                state.connections += 1;
                ConnectionFrame::connected(format!("session-{}", state.connections))
            }
            ConnectMode::Refuse(reason) => ConnectionFrame::error(reason.as_str()),
            ConnectMode::Unreachable => return Err("connection refused (os error 111)".into()),
        };

        Ok(MockClient {
            state: self.state.clone(),
            frame,
            open: AtomicBool::new(true),
        })
    }
}

/// Client of a [`MockBroker`]
pub struct MockClient {
    state: Arc<Mutex<BrokerState>>,
    frame: ConnectionFrame,
    open: AtomicBool,
}

#[async_trait]
impl BrokerClient for MockClient {
    type Subscription = MockSubscription;

    fn connection_frame(&self) -> &ConnectionFrame {
        &self.frame
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn publish(&self, queue: &str, body: &str, headers: &Headers) -> EmptyResult {
        if !self.is_open() {
            return Err("connection closed".into());
        }

        let published = PublishedMessage {
            queue: queue.to_owned(),
            headers: headers.clone(),
            body: body.to_owned(),
        };

        let mut state = self.state.lock().unwrap();
        state.push(queue, InboundMessage::new(headers.clone(), body));

        if let Some(reply) = state.auto_replies.get(queue).cloned() {
            for (destination, message) in reply(&published) {
                state.push(&destination, message);
            }
        }

        state.published.push(published);

        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<Self::Subscription, BoxedError> {
        let mut state = self.state.lock().unwrap();
        state.subscriptions_opened += 1;
        state.active_subscriptions += 1;

        let watcher = state
            .queues
            .entry(queue.to_owned())
            .or_default()
            .watcher
            .clone();

        Ok(MockSubscription {
            state: self.state.clone(),
            queue: queue.to_owned(),
            watcher,
            in_flight: Vec::new(),
            active: true,
        })
    }

    async fn close(&self) -> EmptyResult {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Subscription of a [`MockClient`]
///
/// Unacknowledged deliveries are returned to the front of the queue when the subscription is
/// ended or dropped.
pub struct MockSubscription {
    state: Arc<Mutex<BrokerState>>,
    queue: String,
    watcher: watch::Receiver<()>,
    in_flight: Vec<Delivery>,
    active: bool,
}

impl MockSubscription {
    fn pop(&mut self) -> Option<Delivery> {
        let mut state = self.state.lock().unwrap();
        let message = state.queues.get_mut(&self.queue)?.messages.pop_front()?;

        state.next_receipt += 1;
        let delivery = Delivery {
            receipt: state.next_receipt.to_string(),
            message,
        };

        self.in_flight.push(delivery.clone());
        Some(delivery)
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }

        self.active = false;

        let mut state = self.state.lock().unwrap();
        state.active_subscriptions -= 1;

        let queue = state.queues.entry(self.queue.clone()).or_default();
        for delivery in self.in_flight.drain(..).rev() {
            queue.messages.push_front(delivery.message);
        }
        queue.notify();
    }
}

#[async_trait]
impl BrokerSubscription for MockSubscription {
    async fn next(&mut self) -> Result<Option<Delivery>, BoxedError> {
        loop {
            if !self.active {
                return Ok(None);
            }

            if let Some(delivery) = self.pop() {
                return Ok(Some(delivery));
            }

            if self.watcher.changed().await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> EmptyResult {
        let index = self
            .in_flight
            .iter()
            .position(|d| d.receipt == delivery.receipt)
            .ok_or("unknown receipt")?;

        self.in_flight.remove(index);
        Ok(())
    }

    async fn reject(&mut self, delivery: &Delivery) -> EmptyResult {
        self.ack(delivery).await?;
        self.state
            .lock()
            .unwrap()
            .push(&self.queue, delivery.message.clone());

        Ok(())
    }

    async fn unsubscribe(&mut self) -> EmptyResult {
        let delay = self.state.lock().unwrap().unsubscribe_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.release();
        Ok(())
    }
}

impl Drop for MockSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
