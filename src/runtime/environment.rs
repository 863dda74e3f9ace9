//! Batch runtime environment: configuration, artifact loader and worker pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::builders::{PoolProvisioner, ProvisionedPool, StrategyRegistry};
use crate::config::{self, PoolConfiguration, ThreadPoolType};
use crate::core::{
    AppResult, ArtifactLoader, ConfigError, ContextBindingThreadFactory, EnvironmentHandle, PoolError,
    TaskHandle, ThreadFactory, WorkerPool,
};

/// Name prefix of worker threads created by the default thread factory.
pub const WORKER_THREAD_PREFIX: &str = "job-streamer-worker";

/// Services the batch runtime needs from the agent.
pub struct BatchEnvironment {
    configuration: PoolConfiguration,
    handle: EnvironmentHandle,
    pool: ProvisionedPool,
}

impl BatchEnvironment {
    /// Provision the worker pool described by `configuration`.
    ///
    /// Worker threads bind to whatever loader is attached with
    /// [`attach_loader`](Self::attach_loader) at the time they are created.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from provisioning.
    pub fn new(configuration: PoolConfiguration, registry: Arc<StrategyRegistry>) -> Result<Self, ConfigError> {
        let handle = EnvironmentHandle::new();
        let default_factory: Arc<dyn ThreadFactory> =
            Arc::new(ContextBindingThreadFactory::new(WORKER_THREAD_PREFIX, handle.clone()));
        let pool = PoolProvisioner::new(registry).provision(&configuration, default_factory)?;
        info!(pool_type = %pool.pool_type(), options = configuration.len(), "Batch environment ready");
        Ok(Self {
            configuration,
            handle,
            pool,
        })
    }

    /// Load the configuration file at `path` (plus environment overrides) and provision.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read, or if provisioning fails.
    pub fn bootstrap(path: &Path, registry: Arc<StrategyRegistry>) -> AppResult<Self> {
        let configuration = config::load(path).context("failed to load batch configuration")?;
        Self::new(configuration, registry).context("failed to provision worker pool")
    }

    /// Publish the artifact loader; workers created afterwards bind to it.
    pub fn attach_loader(&self, loader: Arc<dyn ArtifactLoader>) {
        self.handle.attach(loader);
    }

    /// Currently attached loader.
    #[must_use]
    pub fn loader(&self) -> Option<Arc<dyn ArtifactLoader>> {
        self.handle.loader()
    }

    /// Run a unit of batch work on the pool.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::submit`].
    pub fn submit_task<F, R>(&self, task: F) -> Result<TaskHandle<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.pool.pool().submit(task)
    }

    /// Configuration snapshot the environment was built from.
    #[must_use]
    pub const fn configuration(&self) -> &PoolConfiguration {
        &self.configuration
    }

    /// The worker pool.
    #[must_use]
    pub const fn pool(&self) -> &WorkerPool {
        self.pool.pool()
    }

    /// Topology of the worker pool.
    #[must_use]
    pub const fn pool_type(&self) -> ThreadPoolType {
        self.pool.pool_type()
    }

    /// Factory creating the pool's worker threads.
    #[must_use]
    pub fn thread_factory(&self) -> Arc<dyn ThreadFactory> {
        self.pool.thread_factory()
    }

    /// Shut the pool down and wait up to `timeout` for running work. Returns `true` if it finished.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let pool = self.pool.pool();
        pool.shutdown();
        pool.await_termination(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::keys;
    use crate::core::current_loader;

    #[derive(Debug)]
    struct TestLoader;

    impl ArtifactLoader for TestLoader {
        fn name(&self) -> &str {
            "test-loader"
        }
    }

    #[test]
    fn test_workers_bind_loader_attached_after_construction() {
        let env = BatchEnvironment::new(PoolConfiguration::new(), Arc::default()).unwrap();
        assert_eq!(env.pool_type(), ThreadPoolType::Cached);

        env.attach_loader(Arc::new(TestLoader));
        let handle = env
            .submit_task(|| {
                let name = std::thread::current().name().map(str::to_string);
                (name, current_loader().map(|l| l.name().to_string()))
            })
            .unwrap();
        let (thread_name, loader) = handle.join().unwrap();
        assert!(thread_name.unwrap().starts_with(WORKER_THREAD_PREFIX));
        assert_eq!(loader.as_deref(), Some("test-loader"));
        assert!(env.shutdown(Duration::from_secs(5)));
    }

    #[test]
    fn test_new_propagates_config_error() {
        let cfg = PoolConfiguration::new().with(keys::THREAD_POOL_TYPE, "fixed");
        let err = BatchEnvironment::new(cfg, Arc::default()).err().unwrap();
        assert_eq!(err.key(), Some(keys::THREAD_POOL_CORE_SIZE));
    }

    #[test]
    fn test_bootstrap_without_file_uses_defaults() {
        let env = BatchEnvironment::bootstrap(Path::new("/nonexistent/jberet.properties"), Arc::default()).unwrap();
        assert_eq!(env.pool().max_size(), usize::MAX);
    }
}
