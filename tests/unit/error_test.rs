//! Tests for error types

use job_streamer_agent::config::keys;
use job_streamer_agent::core::{ConfigError, PoolError, TaskError};
use job_streamer_agent::runtime::NotifyError;

#[test]
fn test_invalid_parameter_error() {
    let err = ConfigError::invalid(keys::THREAD_POOL_CORE_SIZE, Some("abc"), "invalid digit found in string");
    assert_eq!(
        format!("{}", err),
        "invalid value Some(\"abc\") for `thread-pool-core-size`: invalid digit found in string"
    );
    assert_eq!(err.key(), Some(keys::THREAD_POOL_CORE_SIZE));
}

#[test]
fn test_unresolved_strategy_error() {
    let err = ConfigError::UnresolvedStrategy {
        key: keys::THREAD_FACTORY.to_string(),
        name: "custom".to_string(),
        reason: "not registered".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "cannot resolve `thread-factory` strategy `custom`: not registered"
    );
    assert_eq!(err.key(), Some(keys::THREAD_FACTORY));
}

#[test]
fn test_unknown_topology_error() {
    let err = ConfigError::UnknownTopology {
        value: "Elastic".to_string(),
    };
    assert_eq!(format!("{}", err), "unknown thread pool type `Elastic`");
    assert_eq!(err.key(), None);
}

#[test]
fn test_pool_errors() {
    assert_eq!(format!("{}", PoolError::Shutdown), "pool has been shut down");
    assert_eq!(format!("{}", PoolError::Rejected("full".to_string())), "task rejected: full");
    assert_eq!(
        format!("{}", PoolError::Spawn("out of memory".to_string())),
        "failed to spawn worker thread: out of memory"
    );
}

#[test]
fn test_task_errors() {
    assert_eq!(format!("{}", TaskError::Panicked("boom".to_string())), "task panicked: boom");
    assert_eq!(format!("{}", TaskError::Discarded), "task was discarded before it ran");
    assert_eq!(format!("{}", TaskError::Timeout), "timed out waiting for task result");
}

#[test]
fn test_notify_errors() {
    assert_eq!(
        format!("{}", NotifyError::MissingRequestId),
        "job property `request-id` is missing"
    );
    assert_eq!(
        format!("{}", NotifyError::InvalidRequestId("x".to_string())),
        "job property `request-id` is not an integer: \"x\""
    );
}

#[test]
fn test_config_error_converts_to_anyhow() {
    let err: anyhow::Error = ConfigError::UnknownTopology {
        value: "x".to_string(),
    }
    .into();
    assert!(err.downcast_ref::<ConfigError>().is_some());
}
