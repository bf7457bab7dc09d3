use super::{ConfigError, Target};
use crate::constants::{DEFAULT_CACHE_TIMEOUT, DEFAULT_MESSAGE_TIMEOUT};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Connection parameters, defaults and the registry of known targets
///
/// Passed explicitly to everything that needs it, so independent configurations can coexist in
/// one process.
#[derive(Debug, Clone)]
pub struct Config {
    broker: Option<String>,
    cache: Option<String>,
    message_timeout: Duration,
    cache_timeout: Duration,
    targets: HashMap<String, Target>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: None,
            cache: None,
            message_timeout: DEFAULT_MESSAGE_TIMEOUT,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            targets: HashMap::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigRecord {
    broker: Option<String>,
    cache: Option<String>,
    message_timeout: Option<u64>,
    cache_timeout: Option<u64>,
    #[serde(default)]
    targets: Vec<Target>,
}

impl Config {
    /// Parses a YAML document
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let record: ConfigRecord = serde_yaml::from_str(source)?;

        let mut config = Config {
            broker: record.broker,
            cache: record.cache,
            ..Default::default()
        };

        if let Some(seconds) = record.message_timeout {
            config.message_timeout = Duration::from_secs(seconds);
        }

        if let Some(seconds) = record.cache_timeout {
            config.cache_timeout = Duration::from_secs(seconds);
        }

        for target in record.targets {
            config.add_target(target)?;
        }

        Ok(config)
    }

    /// Reads and parses a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(?path, "Loading configuration");

        let source = std::fs::read_to_string(path)?;
        Self::from_yaml(&source)
    }

    /// Sets the url of the broker, an empty url disables the transport
    pub fn with_broker(mut self, url: impl Into<String>) -> Self {
        self.broker = Some(url.into());
        self
    }

    /// Sets the url of the cache store, an empty url disables caching
    pub fn with_cache(mut self, url: impl Into<String>) -> Self {
        self.cache = Some(url.into());
        self
    }

    /// Sets the timeout for targets which do not define their own
    pub fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout = timeout;
        self
    }

    /// Sets how long cached responses live
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// Registers a target under its name
    pub fn add_target(&mut self, target: Target) -> Result<(), ConfigError> {
        if self.targets.contains_key(target.name()) {
            return Err(ConfigError::DuplicateTarget(target.name().to_owned()));
        }

        self.targets.insert(target.name().to_owned(), target);
        Ok(())
    }

    /// Looks up a target by name
    pub fn target(&self, name: &str) -> Result<&Target, ConfigError> {
        self.targets
            .get(name)
            .ok_or_else(|| ConfigError::UnknownTarget(name.to_owned()))
    }

    /// All registered targets in no particular order
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// Timeout for targets which do not define their own
    pub fn message_timeout(&self) -> Duration {
        self.message_timeout
    }

    /// Time to live of cached responses
    pub fn cache_timeout(&self) -> Duration {
        self.cache_timeout
    }

    /// Url of the broker, `None` if the transport is turned off
    pub fn broker_url(&self) -> Option<&str> {
        self.broker.as_deref().filter(|url| !url.is_empty())
    }

    /// Url of the cache store, `None` if caching is turned off
    pub fn cache_url(&self) -> Option<&str> {
        self.cache.as_deref().filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r#"
broker: redis://127.0.0.1/
cache: ""
messageTimeout: 5
targets:
  - name: accord
    sendQueue: /queue/laplace.in
    receiveQueue: /queue/laplace.out
  - name: dummy
    sendQueue: foo
    receiveQueue: foo
    messageTimeout: 1
"#;

    #[test]
    fn parse_configuration() {
        let config = Config::from_yaml(CONFIG).unwrap();

        assert_eq!(config.broker_url(), Some("redis://127.0.0.1/"));
        assert_eq!(config.cache_url(), None);
        assert_eq!(config.message_timeout(), Duration::from_secs(5));
        assert_eq!(config.cache_timeout(), DEFAULT_CACHE_TIMEOUT);
        assert_eq!(config.targets().count(), 2);
        assert_eq!(
            config.target("dummy").unwrap().message_timeout(),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn fall_back_to_defaults() {
        let config = Config::from_yaml("targets: []").unwrap();

        assert_eq!(config.broker_url(), None);
        assert_eq!(config.message_timeout(), DEFAULT_MESSAGE_TIMEOUT);
    }

    #[test]
    fn reject_unknown_keys() {
        assert!(matches!(
            Config::from_yaml("brokr: redis://localhost"),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn reject_unknown_targets() {
        let config = Config::from_yaml(CONFIG).unwrap();

        for name in &["badtarget", "", "Accord"] {
            assert!(matches!(
                config.target(name),
                Err(ConfigError::UnknownTarget(_))
            ));
        }
    }

    #[test]
    fn reject_duplicate_targets() {
        let mut config = Config::default();
        config
            .add_target(Target::new("accord", "in", "out", None).unwrap())
            .unwrap();

        assert!(matches!(
            config.add_target(Target::new("accord", "other", "out", None).unwrap()),
            Err(ConfigError::DuplicateTarget(_))
        ));
    }
}
