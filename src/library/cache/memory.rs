use super::ResponseCache;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use lru::LruCache;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Cache which lives in process memory
///
/// Evicts the least recently used entry once the capacity is reached. Expired entries are removed
/// when they are read.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, (String, Instant)>>,
}

impl MemoryCache {
    /// Creates a new cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxedError> {
        let key = key.to_owned();
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(&key) {
            Some((value, deadline)) if *deadline > Instant::now() => {
                return Ok(Some(value.clone()))
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(&key);
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> EmptyResult {
        self.entries
            .lock()
            .await
            .put(key.to_owned(), (value.to_owned(), Instant::now() + ttl));

        Ok(())
    }

    async fn del(&self, key: &str) -> EmptyResult {
        self.entries.lock().await.pop(&key.to_owned());
        Ok(())
    }
}
