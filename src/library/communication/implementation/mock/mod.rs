//! In-memory broker for tests

mod broker;

pub use broker::*;
