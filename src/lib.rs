//! Request and response over publish/subscribe message queues.
//!
//! A caller sends a request to a named [`Target`](domain::Target) and synchronously awaits the
//! correlated reply, optionally caching it so that repeated identical requests skip the round trip.
//! Submodules are split the same way as their responsibilities: the project agnostic plumbing
//! (broker seams, bounded waits, caches) lives in [`library`] while everything that is specific to the
//! request/response protocol lives in [`domain`].

#![warn(missing_docs)]

pub mod constants;
pub mod domain;
pub mod library;
