//! Error types for provisioning and pool operations.

use thiserror::Error;

/// Errors produced while turning a configuration snapshot into a worker pool.
///
/// All variants are raised before any worker thread is spawned and are not
/// retryable: the configuration has to change for the call to succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required numeric or boolean option is missing or malformed.
    #[error("invalid value {value:?} for `{key}`: {reason}")]
    InvalidParameter {
        /// Option name, e.g. `thread-pool-core-size`.
        key: String,
        /// Raw value as found in the configuration, if any.
        value: Option<String>,
        /// What was wrong with it.
        reason: String,
    },
    /// A named thread factory or rejection policy is not registered or failed to build.
    #[error("cannot resolve `{key}` strategy `{name}`: {reason}")]
    UnresolvedStrategy {
        /// Option that named the strategy.
        key: String,
        /// Strategy name as configured.
        name: String,
        /// Lookup or construction failure.
        reason: String,
    },
    /// The topology discriminator matches none of the known kinds.
    #[error("unknown thread pool type `{value}`")]
    UnknownTopology {
        /// Raw discriminator value.
        value: String,
    },
}

impl ConfigError {
    /// Shorthand for an [`ConfigError::InvalidParameter`].
    pub fn invalid(key: &str, value: Option<&str>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            key: key.to_string(),
            value: value.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// Option name this error refers to, when there is one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::InvalidParameter { key, .. } | Self::UnresolvedStrategy { key, .. } => Some(key),
            Self::UnknownTopology { .. } => None,
        }
    }
}

/// Errors returned by a running [`WorkerPool`](crate::core::WorkerPool).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool has been shut down and accepts no more work.
    #[error("pool has been shut down")]
    Shutdown,
    /// The saturation handler refused the task.
    #[error("task rejected: {0}")]
    Rejected(String),
    /// A worker thread could not be created.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Outcome of a submitted task that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task panicked while running on a worker.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task was dropped before it ran (discard policy or `shutdown_now`).
    #[error("task was discarded before it ran")]
    Discarded,
    /// Waiting for the result exceeded the given timeout.
    #[error("timed out waiting for task result")]
    Timeout,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
