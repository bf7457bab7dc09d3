//! Broker implementations

#[cfg(test)]
pub mod mock;
pub mod redis;
