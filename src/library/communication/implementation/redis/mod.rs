//! Broker implementation using [Redis](https://redis.io) lists
//!
//! Each queue is a list which producers `LPUSH` onto. Consumers move entries atomically into a
//! per-subscription in-flight list using `BRPOPLPUSH` and remove them from there when they are
//! acknowledged. Ending a subscription moves whatever remains in the in-flight list back onto the
//! consuming end of the queue. In-flight lists expire an hour after their last delivery so that
//! entries of crashed consumers do not linger forever.

use uuid::Uuid;

const QUEUE_KEY_PREFIX: &str = "nebulous:queue:";
const IN_FLIGHT_KEY_PREFIX: &str = "nebulous:inflight:";

/// Seconds a single blocking pop waits before it is reissued
const POLL_TIMEOUT_SECS: usize = 1;

/// Seconds an in-flight list survives after its most recent delivery
const IN_FLIGHT_TTL_SECS: usize = 60 * 60;

mod client;
mod envelope;
mod factory;
mod subscription;

pub use client::*;
pub use factory::*;
pub use subscription::*;

fn queue_key(queue: &str) -> String {
    format!("{}{}", QUEUE_KEY_PREFIX, queue)
}

fn in_flight_key(queue: &str) -> String {
    format!("{}{}:{}", IN_FLIGHT_KEY_PREFIX, queue, Uuid::new_v4())
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keep_in_flight_entries_per_subscription() {
        let first = in_flight_key("/queue/laplace.out");
        let second = in_flight_key("/queue/laplace.out");

        assert!(first.starts_with("nebulous:inflight:/queue/laplace.out:"));
        assert_ne!(first, second);
        assert_eq!(queue_key("/queue/laplace.out"), "nebulous:queue:/queue/laplace.out");
    }

    #[test]
    fn outlive_blocking_pops_with_in_flight_lists() {
        assert!(IN_FLIGHT_TTL_SECS > POLL_TIMEOUT_SECS);
        assert!(subscription::late_pop_delay().as_secs() > POLL_TIMEOUT_SECS as u64);
    }
}
