use super::ResponseCache;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Cache backed by a redis server
///
/// The connection is established on first use and shared afterwards.
pub struct RedisCache {
    client: Client,
    con: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCache {
    /// Creates a new instance for the given `redis://` url without connecting
    pub fn new(url: &str) -> Result<Self, BoxedError> {
        Ok(Self {
            client: Client::open(url)?,
            con: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, BoxedError> {
        let mut slot = self.con.lock().await;

        if let Some(con) = slot.as_ref() {
            return Ok(con.clone());
        }

        debug!("Connecting to cache");
        let con = self.client.get_multiplexed_tokio_connection().await?;
        *slot = Some(con.clone());

        Ok(con)
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxedError> {
        let mut con = self.connection().await?;
        Ok(con.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> EmptyResult {
        // Redis rejects an expiry of zero seconds
        let seconds = ttl.as_secs().max(1) as usize;

        let mut con = self.connection().await?;
        con.set_ex::<_, _, ()>(key, value, seconds).await?;

        Ok(())
    }

    async fn del(&self, key: &str) -> EmptyResult {
        let mut con = self.connection().await?;
        con.del::<_, ()>(key).await?;

        Ok(())
    }
}
