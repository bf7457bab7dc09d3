use crate::library::communication::{ConnectionError, TransportError};
use std::time::Duration;
use thiserror::Error;

/// Invalid or incomplete configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Lookup of a target which has not been registered
    #[error("unknown target {0}")]
    UnknownTarget(String),
    /// Required field is absent from a target record
    #[error("missing a {0}")]
    MissingField(&'static str),
    /// Required field of a target record is empty
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    /// A target of the same name has already been registered
    #[error("target {0} is defined more than once")]
    DuplicateTarget(String),
    /// Configuration document could not be parsed
    #[error("malformed configuration")]
    Malformed(#[from] serde_yaml::Error),
    /// Configuration file could not be read
    #[error("unable to read configuration")]
    Io(#[from] std::io::Error),
    /// A round trip was requested but no broker has been configured
    #[error("no broker configured")]
    TransportDisabled,
}

/// Error returned by a [`Request`](super::Request)
///
/// Apart from [`Timeout`](NebulousError::Timeout) every variant is fatal to the operation.
#[derive(Error, Debug)]
pub enum NebulousError {
    /// Request can not be built or sent with the given configuration
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// Broker or cache store failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// No reply arrived within the given duration
    #[error("no reply received within {0:?}")]
    Timeout(Duration),
    /// A cached response is corrupt
    #[error("malformed cache record")]
    Protocol(#[from] serde_json::Error),
}

impl NebulousError {
    /// Whether the error is a timeout which may be retried
    pub fn is_timeout(&self) -> bool {
        matches!(self, NebulousError::Timeout(_))
    }
}

impl From<TransportError> for NebulousError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Connection(e) => NebulousError::Connection(e),
            TransportError::Timeout(duration) => NebulousError::Timeout(duration),
        }
    }
}
