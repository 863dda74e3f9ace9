//! Turn a configuration snapshot into a running worker pool.
//!
//! Provisioning happens in two steps. [`PoolProvisioner::plan`] reads and
//! validates every option without touching any thread; [`PoolProvisioner::provision`]
//! then builds the pool from the plan. A configuration error therefore never
//! leaves a half-built pool or a stray worker behind.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{keys, PoolConfiguration, ThreadPoolType};
use crate::core::{ConfigError, PoolOptions, RejectionPolicy, ThreadFactory, WorkQueue, WorkerPool};

use super::StrategyRegistry;

/// Everything needed to build a pool, validated.
#[derive(Clone)]
pub struct PoolPlan {
    /// Selected topology.
    pub pool_type: ThreadPoolType,
    /// Sizing and backlog parameters.
    pub options: PoolOptions,
    /// Named thread factory, when one is configured.
    pub thread_factory: Option<Arc<dyn ThreadFactory>>,
    /// Named saturation handler, when one is configured.
    pub rejection_policy: Option<Arc<dyn RejectionPolicy>>,
    /// Enable core thread timeout after construction.
    pub allow_core_thread_timeout: bool,
    /// Start all core workers after construction.
    pub prestart_all_core_threads: bool,
}

impl fmt::Debug for PoolPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolPlan")
            .field("pool_type", &self.pool_type)
            .field("options", &self.options)
            .field("custom_thread_factory", &self.thread_factory.is_some())
            .field("rejection_policy", &self.rejection_policy)
            .field("allow_core_thread_timeout", &self.allow_core_thread_timeout)
            .field("prestart_all_core_threads", &self.prestart_all_core_threads)
            .finish()
    }
}

/// A provisioned pool together with the factory creating its threads.
pub struct ProvisionedPool {
    pool: WorkerPool,
    thread_factory: Arc<dyn ThreadFactory>,
    pool_type: ThreadPoolType,
}

impl ProvisionedPool {
    /// The running pool.
    #[must_use]
    pub const fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Factory the pool uses for its worker threads.
    #[must_use]
    pub fn thread_factory(&self) -> Arc<dyn ThreadFactory> {
        Arc::clone(&self.thread_factory)
    }

    /// Topology the pool was built with.
    #[must_use]
    pub const fn pool_type(&self) -> ThreadPoolType {
        self.pool_type
    }

    /// Give up the factory and keep the pool.
    #[must_use]
    pub fn into_pool(self) -> WorkerPool {
        self.pool
    }
}

impl fmt::Debug for ProvisionedPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedPool")
            .field("pool_type", &self.pool_type)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Builds worker pools from configuration, resolving named strategies in a registry.
#[derive(Debug, Clone, Default)]
pub struct PoolProvisioner {
    registry: Arc<StrategyRegistry>,
}

impl PoolProvisioner {
    /// Provisioner resolving strategy names in `registry`.
    #[must_use]
    pub const fn new(registry: Arc<StrategyRegistry>) -> Self {
        Self { registry }
    }

    /// Registry used for strategy lookups.
    #[must_use]
    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Read and validate `config` without creating any thread.
    ///
    /// Errors are reported for the first offending option, in the order
    /// thread factory, topology, core size, max size, keep-alive, queue
    /// capacity, flags, rejection policy.
    ///
    /// # Errors
    ///
    /// - `ConfigError::UnresolvedStrategy` for an unknown or failing named strategy
    /// - `ConfigError::UnknownTopology` for an unrecognized `thread-pool-type`
    /// - `ConfigError::InvalidParameter` naming the first missing or malformed option
    pub fn plan(&self, config: &PoolConfiguration) -> Result<PoolPlan, ConfigError> {
        let thread_factory = config
            .get_non_blank(keys::THREAD_FACTORY)
            .map(|name| self.registry.thread_factory(name))
            .transpose()?;

        let pool_type = config.pool_type()?;
        let mut plan = PoolPlan {
            pool_type,
            options: PoolOptions::cached(),
            thread_factory,
            rejection_policy: None,
            allow_core_thread_timeout: false,
            prestart_all_core_threads: false,
        };

        match pool_type {
            ThreadPoolType::Cached => {}
            ThreadPoolType::Fixed => {
                let core_size = positive_core_size(config)?;
                plan.options = PoolOptions::fixed(core_size);
            }
            ThreadPoolType::Configured => {
                let core_size: usize = config.require(keys::THREAD_POOL_CORE_SIZE)?;
                let max_size: usize = config.require(keys::THREAD_POOL_MAX_SIZE)?;
                check_sizes(config, core_size, max_size)?;
                let keep_alive = config.require_seconds(keys::THREAD_POOL_KEEP_ALIVE_TIME)?;
                let queue_capacity: usize = config.optional(keys::THREAD_POOL_QUEUE_CAPACITY, 0)?;
                let allow_core_thread_timeout = config.flag(keys::THREAD_POOL_ALLOW_CORE_THREAD_TIMEOUT)?;
                let prestart_all_core_threads = config.flag(keys::THREAD_POOL_PRESTART_ALL_CORE_THREADS)?;
                if allow_core_thread_timeout && keep_alive == Duration::ZERO {
                    return Err(ConfigError::invalid(
                        keys::THREAD_POOL_KEEP_ALIVE_TIME,
                        config.get(keys::THREAD_POOL_KEEP_ALIVE_TIME),
                        "must be greater than 0 when core threads may time out",
                    ));
                }

                let queue = if queue_capacity > 0 {
                    WorkQueue::Bounded(queue_capacity)
                } else {
                    WorkQueue::Handoff
                };
                plan.options = PoolOptions::configured(core_size, max_size, keep_alive, queue);
                plan.rejection_policy = config
                    .get_non_blank(keys::THREAD_POOL_REJECTION_POLICY)
                    .map(|name| self.registry.rejection_policy(name))
                    .transpose()?;
                plan.allow_core_thread_timeout = allow_core_thread_timeout;
                plan.prestart_all_core_threads = prestart_all_core_threads;
            }
        }

        debug!(plan = ?plan, "Pool configuration validated");
        Ok(plan)
    }

    /// Build a running pool from `config`.
    ///
    /// `default_factory` creates the worker threads unless `thread-factory`
    /// names a registered one.
    ///
    /// # Errors
    ///
    /// Same as [`plan`](Self::plan); no thread exists when an error is returned.
    pub fn provision(
        &self,
        config: &PoolConfiguration,
        default_factory: Arc<dyn ThreadFactory>,
    ) -> Result<ProvisionedPool, ConfigError> {
        let plan = self.plan(config)?;
        build(plan, default_factory)
    }
}

/// Construct the pool described by `plan`, then apply the post-construction toggles.
///
/// # Errors
///
/// `ConfigError::InvalidParameter` on `thread-pool-max-size` (or
/// `thread-pool-queue-capacity` for an empty bounded queue) if a hand-built
/// plan breaks the sizing contract.
pub fn build(plan: PoolPlan, default_factory: Arc<dyn ThreadFactory>) -> Result<ProvisionedPool, ConfigError> {
    let thread_factory = plan.thread_factory.unwrap_or(default_factory);
    let (key, value) = match plan.options.queue {
        WorkQueue::Bounded(0) => (keys::THREAD_POOL_QUEUE_CAPACITY, "0".to_string()),
        _ => (keys::THREAD_POOL_MAX_SIZE, plan.options.max_size.to_string()),
    };
    let pool = WorkerPool::new(plan.options, Arc::clone(&thread_factory), plan.rejection_policy)
        .map_err(|e| ConfigError::invalid(key, Some(value.as_str()), e.to_string()))?;

    if plan.allow_core_thread_timeout {
        pool.allow_core_thread_timeout(true);
    }
    if plan.prestart_all_core_threads {
        pool.prestart_all_core_threads();
    }

    info!(pool_id = %pool.id(), pool_type = %plan.pool_type, "Worker pool provisioned");
    Ok(ProvisionedPool {
        pool,
        thread_factory,
        pool_type: plan.pool_type,
    })
}

fn positive_core_size(config: &PoolConfiguration) -> Result<usize, ConfigError> {
    let core_size: usize = config.require(keys::THREAD_POOL_CORE_SIZE)?;
    if core_size == 0 {
        return Err(ConfigError::invalid(
            keys::THREAD_POOL_CORE_SIZE,
            config.get(keys::THREAD_POOL_CORE_SIZE),
            "must be greater than 0",
        ));
    }
    Ok(core_size)
}

fn check_sizes(config: &PoolConfiguration, core_size: usize, max_size: usize) -> Result<(), ConfigError> {
    let raw_max = config.get(keys::THREAD_POOL_MAX_SIZE);
    if max_size == 0 {
        return Err(ConfigError::invalid(keys::THREAD_POOL_MAX_SIZE, raw_max, "must be greater than 0"));
    }
    if core_size > max_size {
        return Err(ConfigError::invalid(
            keys::THREAD_POOL_MAX_SIZE,
            raw_max,
            format!("must not be smaller than core size {core_size}"),
        ));
    }
    Ok(())
}
