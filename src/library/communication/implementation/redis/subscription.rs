use super::{envelope::Envelope, IN_FLIGHT_TTL_SECS, POLL_TIMEOUT_SECS};
use crate::library::communication::{BrokerSubscription, Delivery};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use redis::aio::{Connection, MultiplexedConnection};
use redis::{AsyncCommands, Script};
use std::future::Future;
use std::time::Duration;
use tracing::{trace, warn};

/// Moves every entry of the in-flight list back onto the consuming end of the queue,
/// most recently received first so the oldest entry is consumed next
const REQUEUE_SCRIPT: &str = r#"
local count = 0
while true do
    local entry = redis.call('LPOP', KEYS[1])
    if not entry then
        break
    end
    redis.call('RPUSH', KEYS[2], entry)
    count = count + 1
end
return count
"#;

/// Moves a single entry from the in-flight list to the producing end of the queue
const REJECT_SCRIPT: &str = r#"
local removed = redis.call('LREM', KEYS[1], 1, ARGV[1])
if removed > 0 then
    redis.call('LPUSH', KEYS[2], ARGV[1])
end
return removed
"#;

/// Subscription to a redis list
///
/// Deliveries are kept in an in-flight list until they are acknowledged. If the subscription is
/// dropped without calling [`unsubscribe`](BrokerSubscription::unsubscribe) the requeue runs in
/// the background.
pub struct RedisSubscription {
    blocking: Option<Connection>,
    con: MultiplexedConnection,
    queue_key: String,
    in_flight_key: String,
}

impl RedisSubscription {
    pub(super) fn new(
        blocking: Connection,
        con: MultiplexedConnection,
        queue_key: String,
        in_flight_key: String,
    ) -> Self {
        Self {
            blocking: Some(blocking),
            con,
            queue_key,
            in_flight_key,
        }
    }

    async fn requeue(
        mut con: MultiplexedConnection,
        in_flight_key: String,
        queue_key: String,
    ) -> EmptyResult {
        let count: usize = Script::new(REQUEUE_SCRIPT)
            .key(in_flight_key)
            .key(queue_key)
            .invoke_async(&mut con)
            .await?;

        trace!(count, "Requeued unacknowledged entries");
        Ok(())
    }

    /// Requeues now and, if a blocking pop was interrupted, once more after the server is
    /// guaranteed to have finished serving it
    fn requeue_detached(&mut self, interrupted: bool) -> Option<impl Future<Output = EmptyResult>> {
        if self.in_flight_key.is_empty() {
            return None;
        }

        let in_flight_key = std::mem::take(&mut self.in_flight_key);
        let con = self.con.clone();
        let queue_key = self.queue_key.clone();

        Some(async move {
            Self::requeue(con.clone(), in_flight_key.clone(), queue_key.clone()).await?;

            if interrupted {
                tokio::spawn(async move {
                    tokio::time::sleep(late_pop_delay()).await;
                    if let Err(error) = Self::requeue(con, in_flight_key, queue_key).await {
                        warn!(?error, "Failed to requeue entries of interrupted pop");
                    }
                });
            }

            Ok(())
        })
    }
}

/// Time after which a blocking pop issued by a dropped connection can no longer be served
pub(super) fn late_pop_delay() -> Duration {
    Duration::from_secs(POLL_TIMEOUT_SECS as u64 + 1)
}

#[async_trait]
impl BrokerSubscription for RedisSubscription {
    async fn next(&mut self) -> Result<Option<Delivery>, BoxedError> {
        loop {
            // A blocking command that is interrupted leaves the connection in an unknown state,
            // so it is only put back once the command has completed. Entries popped by an
            // interrupted command end up in the in-flight list and are requeued later on.
            let mut blocking = match self.blocking.take() {
                Some(blocking) => blocking,
                None => return Ok(None),
            };

            let raw: Option<String> = blocking
                .brpoplpush(&self.queue_key, &self.in_flight_key, POLL_TIMEOUT_SECS)
                .await?;

            self.blocking = Some(blocking);

            if let Some(raw) = raw {
                if let Err(error) = self
                    .con
                    .expire::<_, ()>(&self.in_flight_key, IN_FLIGHT_TTL_SECS)
                    .await
                {
                    warn!(?error, "Failed to set expiry of in-flight list");
                }

                return Ok(Some(Delivery {
                    message: Envelope::decode(&raw),
                    receipt: raw,
                }));
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> EmptyResult {
        self.con
            .lrem::<_, _, ()>(&self.in_flight_key, 1, &delivery.receipt)
            .await?;

        Ok(())
    }

    async fn reject(&mut self, delivery: &Delivery) -> EmptyResult {
        let removed: usize = Script::new(REJECT_SCRIPT)
            .key(&self.in_flight_key)
            .key(&self.queue_key)
            .arg(&delivery.receipt)
            .invoke_async(&mut self.con)
            .await?;

        if removed == 0 {
            warn!("Rejected entry was no longer in flight");
        }

        Ok(())
    }

    async fn unsubscribe(&mut self) -> EmptyResult {
        let interrupted = self.blocking.take().is_none();

        match self.requeue_detached(interrupted) {
            Some(task) => task.await,
            None => Ok(()),
        }
    }
}

impl Drop for RedisSubscription {
    fn drop(&mut self) {
        let interrupted = self.blocking.is_none();
        let task = match self.requeue_detached(interrupted) {
            Some(task) => task,
            None => return,
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(error) = task.await {
                        warn!(?error, "Failed to requeue entries of dropped subscription");
                    }
                });
            }
            Err(_) => warn!("Subscription dropped outside of a runtime, entries remain in flight"),
        }
    }
}
