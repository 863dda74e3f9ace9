//! Tests for configuration loading and typed access

use job_streamer_agent::config::{
    apply_env_overrides, keys, load_properties_file, parse_properties, PoolConfiguration, ThreadPoolType,
};
use std::fs;

#[test]
fn test_properties_file_round_trip_through_loader() {
    let path = std::env::temp_dir().join(format!("jberet-unit-{}.properties", uuid::Uuid::new_v4()));
    fs::write(
        &path,
        "thread-pool-type=configured\nthread-pool-core-size=2\nthread-pool-max-size=5\n",
    )
    .unwrap();
    let cfg = load_properties_file(&path).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(cfg.pool_type(), Ok(ThreadPoolType::Configured));
    assert_eq!(cfg.require::<usize>(keys::THREAD_POOL_MAX_SIZE), Ok(5));
}

#[test]
fn test_unreadable_path_is_an_error() {
    let dir = std::env::temp_dir();
    let err = load_properties_file(&dir).unwrap_err();
    assert_eq!(err.path, dir);
}

#[test]
fn test_env_override_beats_file_value() {
    let mut cfg = parse_properties("thread-pool-core-size = 2\n");
    apply_env_overrides(
        &mut cfg,
        vec![("JOB_STREAMER_THREAD_POOL_CORE_SIZE".to_string(), "8".to_string())],
    );
    assert_eq!(cfg.require::<usize>(keys::THREAD_POOL_CORE_SIZE), Ok(8));
}

#[test]
fn test_pool_type_defaults_to_cached() {
    assert_eq!(PoolConfiguration::new().pool_type(), Ok(ThreadPoolType::Cached));
    let blank = PoolConfiguration::new().with(keys::THREAD_POOL_TYPE, " ");
    assert_eq!(blank.pool_type(), Ok(ThreadPoolType::Cached));
}

#[test]
fn test_pool_type_display() {
    assert_eq!(ThreadPoolType::Cached.to_string(), "cached");
    assert_eq!(ThreadPoolType::Fixed.to_string(), "fixed");
    assert_eq!(ThreadPoolType::Configured.to_string(), "configured");
}

#[test]
fn test_configuration_deserializes_from_json() {
    let cfg: PoolConfiguration =
        serde_json::from_str(r#"{"thread-pool-type":"fixed","thread-pool-core-size":"3"}"#).unwrap();
    assert_eq!(cfg.len(), 2);
    assert_eq!(cfg.pool_type(), Ok(ThreadPoolType::Fixed));
    assert_eq!(
        cfg.iter().map(|(k, _)| k).collect::<Vec<_>>(),
        vec![keys::THREAD_POOL_CORE_SIZE, keys::THREAD_POOL_TYPE]
    );
}
