use super::RedisBrokerClient;
use crate::library::communication::{BrokerFactory, ConnectionFrame};
use crate::library::BoxedError;
use async_trait::async_trait;
use redis::Client;
use tracing::{debug, warn};

/// Factory which connects to a redis server
pub struct RedisBrokerFactory {
    client: Client,
}

impl RedisBrokerFactory {
    /// Creates a new factory for the given `redis://` url
    ///
    /// No connection is attempted until [`connect`](BrokerFactory::connect) is called.
    pub fn new(url: &str) -> Result<Self, BoxedError> {
        Ok(Self {
            client: Client::open(url)?,
        })
    }
}

#[async_trait]
impl BrokerFactory for RedisBrokerFactory {
    type Client = RedisBrokerClient;

    async fn connect(&self) -> Result<Self::Client, BoxedError> {
        let mut con = self.client.get_multiplexed_tokio_connection().await?;

        // The server assigns every connection a unique id which doubles as the session
        let frame = match redis::cmd("CLIENT")
            .arg("ID")
            .query_async::<_, i64>(&mut con)
            .await
        {
            Ok(id) => {
                debug!(id, "Connected to redis");
                ConnectionFrame::connected(id.to_string())
            }
            Err(error) if !error.is_io_error() => {
                warn!(?error, "Redis rejected the connection");
                ConnectionFrame::error(error.to_string())
            }
            Err(error) => return Err(error.into()),
        };

        Ok(RedisBrokerClient::new(self.client.clone(), con, frame))
    }
}
