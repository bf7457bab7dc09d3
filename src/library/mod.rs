//! Independent and project agnostic libraries
//!
//! Nothing in here knows about targets, verbs or correlation headers. The submodules provide the
//! plumbing that the [`domain`](super::domain) builds its request/response protocol on: access to a
//! message broker, a TTL key-value store used as a response cache, and small helpers like the
//! bounded wait primitive.

pub mod cache;
pub mod communication;
pub mod helpers;

/// Generic error type
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result with no value and a [`BoxedError`]
pub type EmptyResult = Result<(), BoxedError>;
