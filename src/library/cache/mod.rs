//! Key-value stores with per-entry expiry
//!
//! Used to keep responses around so identical requests can be answered without a round trip.

mod memory;
mod redis;

pub use self::redis::*;
pub use memory::*;

use super::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::time::Duration;

/// Store mapping string keys to string values which expire after a given time
#[async_trait]
pub trait ResponseCache {
    /// Reads a value, `None` if it does not exist or has expired
    async fn get(&self, key: &str) -> Result<Option<String>, BoxedError>;

    /// Writes a value which expires after the given duration
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> EmptyResult;

    /// Removes a value, succeeding if it did not exist
    async fn del(&self, key: &str) -> EmptyResult;
}
