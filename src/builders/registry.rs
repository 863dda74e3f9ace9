//! Name-to-constructor registry for pluggable pool strategies.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::keys;
use crate::core::{
    AbortPolicy, BlockPolicy, CallerRunsPolicy, ConfigError, DiscardOldestPolicy, DiscardPolicy,
    PlainThreadFactory, RejectionPolicy, ThreadFactory,
};

/// Builds a thread factory, or explains why it cannot.
pub type ThreadFactoryCtor = Arc<dyn Fn() -> Result<Arc<dyn ThreadFactory>, String> + Send + Sync>;

/// Builds a rejection policy, or explains why it cannot.
pub type RejectionPolicyCtor = Arc<dyn Fn() -> Result<Arc<dyn RejectionPolicy>, String> + Send + Sync>;

/// Strategies the `thread-factory` and `thread-pool-rejection-policy` options can name.
///
/// Populate it at startup; the provisioner only reads from it.
#[derive(Clone)]
pub struct StrategyRegistry {
    thread_factories: HashMap<String, ThreadFactoryCtor>,
    rejection_policies: HashMap<String, RejectionPolicyCtor>,
}

impl StrategyRegistry {
    /// Registry with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            thread_factories: HashMap::new(),
            rejection_policies: HashMap::new(),
        }
    }

    /// Registry with the built-in strategies.
    ///
    /// Rejection policies: `abort`, `caller-runs`, `discard`, `discard-oldest`, `block`.
    /// Thread factories: `plain`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_rejection_policy("abort", || Ok(Arc::new(AbortPolicy)));
        registry.register_rejection_policy("caller-runs", || Ok(Arc::new(CallerRunsPolicy)));
        registry.register_rejection_policy("discard", || Ok(Arc::new(DiscardPolicy)));
        registry.register_rejection_policy("discard-oldest", || Ok(Arc::new(DiscardOldestPolicy)));
        registry.register_rejection_policy("block", || Ok(Arc::new(BlockPolicy)));
        registry.register_thread_factory("plain", || Ok(Arc::new(PlainThreadFactory::default())));
        registry
    }

    /// Register (or replace) a thread factory under `name`.
    pub fn register_thread_factory<F>(&mut self, name: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn() -> Result<Arc<dyn ThreadFactory>, String> + Send + Sync + 'static,
    {
        self.thread_factories.insert(name.into(), Arc::new(ctor));
        self
    }

    /// Register (or replace) a rejection policy under `name`.
    pub fn register_rejection_policy<F>(&mut self, name: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn() -> Result<Arc<dyn RejectionPolicy>, String> + Send + Sync + 'static,
    {
        self.rejection_policies.insert(name.into(), Arc::new(ctor));
        self
    }

    /// Instantiate the thread factory registered as `name`.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnresolvedStrategy` if unknown or if its constructor fails.
    pub fn thread_factory(&self, name: &str) -> Result<Arc<dyn ThreadFactory>, ConfigError> {
        resolve(&self.thread_factories, keys::THREAD_FACTORY, name)
    }

    /// Instantiate the rejection policy registered as `name`.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnresolvedStrategy` if unknown or if its constructor fails.
    pub fn rejection_policy(&self, name: &str) -> Result<Arc<dyn RejectionPolicy>, ConfigError> {
        resolve(&self.rejection_policies, keys::THREAD_POOL_REJECTION_POLICY, name)
    }

    /// Registered thread factory names, sorted.
    #[must_use]
    pub fn thread_factory_names(&self) -> Vec<&str> {
        sorted_names(&self.thread_factories)
    }

    /// Registered rejection policy names, sorted.
    #[must_use]
    pub fn rejection_policy_names(&self) -> Vec<&str> {
        sorted_names(&self.rejection_policies)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("thread_factories", &self.thread_factory_names())
            .field("rejection_policies", &self.rejection_policy_names())
            .finish()
    }
}

fn resolve<T: ?Sized>(
    table: &HashMap<String, Arc<dyn Fn() -> Result<Arc<T>, String> + Send + Sync>>,
    key: &str,
    name: &str,
) -> Result<Arc<T>, ConfigError> {
    let name = name.trim();
    let unresolved = |reason: String| ConfigError::UnresolvedStrategy {
        key: key.to_string(),
        name: name.to_string(),
        reason,
    };
    let ctor = table
        .get(name)
        .ok_or_else(|| unresolved("no strategy registered under this name".to_string()))?;
    ctor().map_err(unresolved)
}

fn sorted_names<V>(table: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = table.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}
