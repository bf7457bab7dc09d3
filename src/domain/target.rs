use super::ConfigError;
use serde::Deserialize;
use std::convert::TryFrom;
use std::time::Duration;

/// Named pair of queues describing one remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "TargetRecord")]
pub struct Target {
    name: String,
    send_queue: String,
    receive_queue: String,
    message_timeout: Option<Duration>,
}

impl Target {
    /// Creates a new target, failing if any of the names is empty
    pub fn new(
        name: impl Into<String>,
        send_queue: impl Into<String>,
        receive_queue: impl Into<String>,
        message_timeout: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        let target = Self {
            name: name.into(),
            send_queue: send_queue.into(),
            receive_queue: receive_queue.into(),
            message_timeout,
        };

        if target.name.is_empty() {
            return Err(ConfigError::EmptyField("name"));
        }

        if target.send_queue.is_empty() {
            return Err(ConfigError::EmptyField("sendQueue"));
        }

        if target.receive_queue.is_empty() {
            return Err(ConfigError::EmptyField("receiveQueue"));
        }

        Ok(target)
    }

    /// Name the target is registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue requests are published to
    pub fn send_queue(&self) -> &str {
        &self.send_queue
    }

    /// Queue replies arrive on
    pub fn receive_queue(&self) -> &str {
        &self.receive_queue
    }

    /// Timeout overriding the process-wide default
    pub fn message_timeout(&self) -> Option<Duration> {
        self.message_timeout
    }
}

/// Target as written in a configuration file, timeout in seconds
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TargetRecord {
    name: Option<String>,
    send_queue: Option<String>,
    receive_queue: Option<String>,
    message_timeout: Option<u64>,
}

impl TryFrom<TargetRecord> for Target {
    type Error = ConfigError;

    fn try_from(record: TargetRecord) -> Result<Self, Self::Error> {
        Target::new(
            record.name.ok_or(ConfigError::MissingField("name"))?,
            record
                .send_queue
                .ok_or(ConfigError::MissingField("sendQueue"))?,
            record
                .receive_queue
                .ok_or(ConfigError::MissingField("receiveQueue"))?,
            record.message_timeout.map(Duration::from_secs),
        )
    }
}
