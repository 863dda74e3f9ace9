//! Tests for the strategy registry and pool planning

use job_streamer_agent::builders::{build, PoolProvisioner, StrategyRegistry};
use job_streamer_agent::config::{keys, PoolConfiguration, ThreadPoolType};
use job_streamer_agent::core::{
    AbortPolicy, ConfigError, PlainThreadFactory, RejectionPolicy, ThreadFactory, WorkQueue,
};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_empty_registry_resolves_nothing() {
    let registry = StrategyRegistry::empty();
    assert!(registry.rejection_policy_names().is_empty());
    assert!(matches!(
        registry.rejection_policy("abort"),
        Err(ConfigError::UnresolvedStrategy { .. })
    ));
}

#[test]
fn test_registration_replaces_existing_name() {
    let mut registry = StrategyRegistry::with_builtins();
    registry
        .register_rejection_policy("abort", || Err("disabled in this deployment".to_string()))
        .register_rejection_policy("strict", || Ok(Arc::new(AbortPolicy) as Arc<dyn RejectionPolicy>));

    let Err(err) = registry.rejection_policy("abort") else {
        panic!("replaced constructor must fail");
    };
    assert!(err.to_string().contains("disabled in this deployment"));
    assert!(registry.rejection_policy("strict").is_ok());
}

#[test]
fn test_strategy_names_are_exact_after_trimming() {
    let registry = StrategyRegistry::with_builtins();
    assert!(registry.rejection_policy("  discard-oldest\t").is_ok());
    assert!(registry.rejection_policy("Discard-Oldest").is_err());
}

#[test]
fn test_plan_then_build() {
    let cfg = PoolConfiguration::new()
        .with(keys::THREAD_POOL_TYPE, "configured")
        .with(keys::THREAD_POOL_CORE_SIZE, "0")
        .with(keys::THREAD_POOL_MAX_SIZE, "3")
        .with(keys::THREAD_POOL_KEEP_ALIVE_TIME, "10")
        .with(keys::THREAD_POOL_QUEUE_CAPACITY, "2");
    let plan = PoolProvisioner::default().plan(&cfg).unwrap();
    assert_eq!(plan.pool_type, ThreadPoolType::Configured);
    assert_eq!(plan.options.queue, WorkQueue::Bounded(2));
    assert_eq!(plan.options.keep_alive, Duration::from_secs(10));

    let factory: Arc<dyn ThreadFactory> = Arc::new(PlainThreadFactory::default());
    let provisioned = build(plan, factory).unwrap();
    assert_eq!(provisioned.pool().core_size(), 0);
    assert_eq!(provisioned.pool().max_size(), 3);
    assert_eq!(provisioned.pool().submit(|| 4).unwrap().join(), Ok(4));
}

#[test]
fn test_cached_ignores_configured_only_options() {
    let cfg = PoolConfiguration::new()
        .with(keys::THREAD_POOL_MAX_SIZE, "not a number")
        .with(keys::THREAD_POOL_REJECTION_POLICY, "missing");
    let plan = PoolProvisioner::default().plan(&cfg).unwrap();
    assert_eq!(plan.pool_type, ThreadPoolType::Cached);
    assert!(plan.rejection_policy.is_none());
}
