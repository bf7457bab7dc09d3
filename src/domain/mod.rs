//! Request/response protocol built on top of the [`library`](crate::library) plumbing
//!
//! A [`Request`] resolves a [`Target`] from the [`Config`], publishes its [`MessageContent`] with
//! a fresh correlation token and waits for the [`Response`] carrying that token. Responses may be
//! kept in a [`ResponseCache`](crate::library::cache::ResponseCache) under a fingerprint of the
//! request so identical requests skip the round trip.
//!
//! The other side of the conversation is a [`Responder`] which hands incoming requests to a
//! [`RequestProcessor`] and sends its replies back.

mod config;
mod error;
mod keys;
mod message;
mod request;
mod responder;
mod response;
mod target;

pub use config::*;
pub use error::*;
pub use keys::*;
pub use message::*;
pub use request::*;
pub use responder::*;
pub use response::*;
pub use target::*;
