use super::{envelope::Envelope, in_flight_key, queue_key, RedisSubscription};
use crate::library::communication::{BrokerClient, ConnectionFrame, Headers};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::sync::atomic::{AtomicBool, Ordering};

/// Connection to a redis server acting as a broker
pub struct RedisBrokerClient {
    client: Client,
    con: MultiplexedConnection,
    frame: ConnectionFrame,
    open: AtomicBool,
}

impl RedisBrokerClient {
    pub(super) fn new(client: Client, con: MultiplexedConnection, frame: ConnectionFrame) -> Self {
        Self {
            client,
            con,
            frame,
            open: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl BrokerClient for RedisBrokerClient {
    type Subscription = RedisSubscription;

    fn connection_frame(&self) -> &ConnectionFrame {
        &self.frame
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn publish(&self, queue: &str, body: &str, headers: &Headers) -> EmptyResult {
        let payload = serde_json::to_string(&Envelope {
            headers: headers.clone(),
            body: body.to_owned(),
        })?;

        let mut con = self.con.clone();
        con.lpush::<_, _, ()>(queue_key(queue), payload).await?;

        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<Self::Subscription, BoxedError> {
        // Blocking pops would stall every other user of the multiplexed connection
        let blocking = self.client.get_async_connection().await?;

        Ok(RedisSubscription::new(
            blocking,
            self.con.clone(),
            queue_key(queue),
            in_flight_key(queue),
        ))
    }

    async fn close(&self) -> EmptyResult {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}
