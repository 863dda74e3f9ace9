//! Thread pool configuration snapshot and typed option access.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::ConfigError;

/// Option names understood by the provisioner.
pub mod keys {
    /// Topology discriminator: `cached`, `fixed` or `configured`.
    pub const THREAD_POOL_TYPE: &str = "thread-pool-type";
    /// Permanent worker count.
    pub const THREAD_POOL_CORE_SIZE: &str = "thread-pool-core-size";
    /// Worker upper bound (configured pools).
    pub const THREAD_POOL_MAX_SIZE: &str = "thread-pool-max-size";
    /// Idle seconds before a non-core worker exits (configured pools).
    pub const THREAD_POOL_KEEP_ALIVE_TIME: &str = "thread-pool-keep-alive-time";
    /// Backlog capacity; `0` means synchronous handoff.
    pub const THREAD_POOL_QUEUE_CAPACITY: &str = "thread-pool-queue-capacity";
    /// Let core workers time out too.
    pub const THREAD_POOL_ALLOW_CORE_THREAD_TIMEOUT: &str = "thread-pool-allow-core-thread-timeout";
    /// Start all core workers at construction.
    pub const THREAD_POOL_PRESTART_ALL_CORE_THREADS: &str = "thread-pool-prestart-all-core-threads";
    /// Registered name of the saturation handler.
    pub const THREAD_POOL_REJECTION_POLICY: &str = "thread-pool-rejection-policy";
    /// Registered name of the worker thread factory.
    pub const THREAD_FACTORY: &str = "thread-factory";
}

/// Pool topology selected by `thread-pool-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPoolType {
    /// Unbounded growth, idle workers reclaimed.
    #[default]
    Cached,
    /// Fixed worker count, unbounded backlog.
    Fixed,
    /// Every sizing and queueing option explicit.
    Configured,
}

impl FromStr for ThreadPoolType {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("cached") {
            Ok(Self::Cached)
        } else if value.eq_ignore_ascii_case("fixed") {
            Ok(Self::Fixed)
        } else if value.eq_ignore_ascii_case("configured") {
            Ok(Self::Configured)
        } else {
            Err(ConfigError::UnknownTopology {
                value: value.to_string(),
            })
        }
    }
}

impl fmt::Display for ThreadPoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached => write!(f, "cached"),
            Self::Fixed => write!(f, "fixed"),
            Self::Configured => write!(f, "configured"),
        }
    }
}

/// Immutable map of option name to raw string value, read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolConfiguration {
    properties: BTreeMap<String, String>,
}

impl PoolConfiguration {
    /// Empty configuration: a cached pool with the default thread factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub(crate) fn insert(&mut self, key: String, value: String) {
        self.properties.insert(key, value);
    }

    /// Raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Trimmed value of `key`, or `None` when absent or blank.
    #[must_use]
    pub fn get_non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterate options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Topology selected by `thread-pool-type`; absent or blank means cached.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnknownTopology` for any other value.
    pub fn pool_type(&self) -> Result<ThreadPoolType, ConfigError> {
        self.get(keys::THREAD_POOL_TYPE)
            .map_or(Ok(ThreadPoolType::Cached), ThreadPoolType::from_str)
    }

    /// Parse a required option.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidParameter` naming `key` when missing or unparsable.
    pub fn require<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.get(key);
        let value = raw
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::invalid(key, raw, "required value is missing"))?;
        value
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, raw, e.to_string()))
    }

    /// Parse an optional option, falling back to `default` when absent or blank.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidParameter` naming `key` when present but unparsable.
    pub fn optional<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if self.get_non_blank(key).is_none() {
            return Ok(default);
        }
        self.require(key)
    }

    /// Boolean option, `false` when absent or blank, `true`/`false` in any case otherwise.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidParameter` for anything else.
    pub fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.get_non_blank(key) {
            None => Ok(false),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            Some(_) => Err(ConfigError::invalid(key, self.get(key), "expected `true` or `false`")),
        }
    }

    /// Keep-alive in seconds as a duration.
    ///
    /// # Errors
    ///
    /// Same as [`require`](Self::require).
    pub fn require_seconds(&self, key: &str) -> Result<Duration, ConfigError> {
        self.require::<u64>(key).map(Duration::from_secs)
    }
}

impl<K, V> FromIterator<(K, V)> for PoolConfiguration
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
