use super::{
    fingerprint, Config, ConfigError, MessageContent, NebulousError, OutgoingMessage, Response,
    Target,
};
use crate::constants::HEADER_IN_REPLY_TO;
use crate::library::cache::ResponseCache;
use crate::library::communication::{BrokerFactory, ConnectionError, TransportHandler};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Shared handle to a cache store
pub type SharedCache = Arc<dyn ResponseCache + Send + Sync>;

/// Request to a target which may be sent and answered multiple times
///
/// Every send mints a new correlation token, so multiple requests may share one
/// [`TransportHandler`] and even one receive queue concurrently. Replies which belong to other
/// requests are left on the queue for their owners.
pub struct Request<F: BrokerFactory> {
    target: Target,
    content: MessageContent,
    transport: Arc<TransportHandler<F>>,
    cache: Option<SharedCache>,
    timeout: Duration,
    cache_ttl: Duration,
    correlation_token: Option<String>,
}

impl<F: BrokerFactory> Request<F> {
    /// Resolves the target and prepares the request without connecting
    pub fn new(
        config: &Config,
        target: &str,
        content: MessageContent,
        transport: Arc<TransportHandler<F>>,
    ) -> Result<Self, ConfigError> {
        let target = config.target(target)?.clone();
        let timeout = target
            .message_timeout()
            .unwrap_or_else(|| config.message_timeout());

        Ok(Self {
            target,
            content,
            transport,
            cache: None,
            timeout,
            cache_ttl: config.cache_timeout(),
            correlation_token: None,
        })
    }

    /// Enables caching of responses in the given store
    pub fn with_cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Target the request is sent to
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Content of the request
    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Timeout used by sends which do not override it
    pub fn effective_timeout(&self) -> Duration {
        self.timeout
    }

    /// Token of the most recent send, `None` before the first one
    pub fn correlation_token(&self) -> Option<&str> {
        self.correlation_token.as_deref()
    }

    /// Key the response of this request is cached under
    pub fn cache_key(&self) -> String {
        fingerprint(&self.target, &self.content)
    }

    /// Performs a round trip, neither reading nor writing the cache
    #[instrument(skip(self))]
    pub async fn send_no_cache(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Response, NebulousError> {
        if !self.transport.is_enabled() {
            return Err(ConfigError::TransportDisabled.into());
        }

        let timeout = timeout.unwrap_or(self.timeout);

        self.transport.connect().await?;
        let token = self
            .transport
            .correlation_token()
            .await?
            .ok_or(ConfigError::TransportDisabled)?;
        self.correlation_token = Some(token.clone());

        let message =
            OutgoingMessage::request(&self.content, &token, self.target.receive_queue())?;

        info!(
            target_name = %self.target.name(),
            %token,
            "Sending request to {}",
            self.target.send_queue()
        );
        self.transport
            .publish(self.target.send_queue(), &message.body, &message.headers)
            .await?;

        let reply = self
            .transport
            .listen_with_timeout(self.target.receive_queue(), timeout, move |message| {
                message.header(HEADER_IN_REPLY_TO) == Some(token.as_str())
            })
            .await?
            .ok_or(ConfigError::TransportDisabled)?;

        debug!("Received reply");
        Ok(Response::from_transport_message(&reply))
    }

    /// Answers from the cache if possible, otherwise performs a round trip and caches the result
    ///
    /// Behaves like [`send_no_cache`](Request::send_no_cache) if no cache has been set. A response
    /// which can not be written to the cache is still returned.
    pub async fn send(
        &mut self,
        timeout: Option<Duration>,
        cache_ttl: Option<Duration>,
    ) -> Result<Response, NebulousError> {
        let cache = match &self.cache {
            Some(cache) => cache.clone(),
            None => return self.send_no_cache(timeout).await,
        };

        if let Some(response) = self.get_from_cache().await? {
            debug!(target_name = %self.target.name(), "Answering from cache");
            return Ok(response);
        }

        let response = self.send_no_cache(timeout).await?;

        let ttl = cache_ttl.unwrap_or(self.cache_ttl);
        if let Err(e) = cache
            .set(&self.cache_key(), &response.to_cache_record()?, ttl)
            .await
        {
            warn!(target_name = %self.target.name(), error = %e, "Failed to cache response");
        }

        Ok(response)
    }

    /// Looks up the cached response of this request
    pub async fn get_from_cache(&self) -> Result<Option<Response>, NebulousError> {
        let cache = match &self.cache {
            Some(cache) => cache,
            None => return Ok(None),
        };

        let record = cache
            .get(&self.cache_key())
            .await
            .map_err(ConnectionError::Cache)?;

        match record {
            Some(record) => Ok(Some(Response::from_cache_record(&record)?)),
            None => Ok(None),
        }
    }

    /// Removes the cached response of this request, leaving all other entries alone
    pub async fn clear_cache(&self) -> Result<(), NebulousError> {
        if let Some(cache) = &self.cache {
            cache
                .del(&self.cache_key())
                .await
                .map_err(ConnectionError::Cache)?;
        }

        Ok(())
    }
}
