//! Worker thread creation and artifact-loader binding.
//!
//! The batch runtime attaches its artifact loader to the environment only after
//! the pool exists, so the default factory reads the [`EnvironmentHandle`] each
//! time it creates a thread instead of capturing a loader up front. The loader
//! seen at creation stays bound to that thread for its whole life.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;
use tracing::debug;

/// Body a factory must run on the thread it creates.
pub type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// Resolves job artifacts (readers, writers, listeners) for the tasks running on a thread.
pub trait ArtifactLoader: Send + Sync + fmt::Debug {
    /// Human-readable loader name, used in logs.
    fn name(&self) -> &str;
}

/// Strategy used by a pool to create its worker threads.
pub trait ThreadFactory: Send + Sync {
    /// Spawn a thread that runs `body`.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the thread cannot be created.
    fn spawn(&self, body: WorkerBody) -> io::Result<JoinHandle<()>>;
}

thread_local! {
    static BOUND_LOADER: RefCell<Option<Arc<dyn ArtifactLoader>>> = const { RefCell::new(None) };
}

/// Loader bound to the current thread, if the thread was created with one.
#[must_use]
pub fn current_loader() -> Option<Arc<dyn ArtifactLoader>> {
    BOUND_LOADER.with(|slot| slot.borrow().clone())
}

/// Shared slot through which the environment publishes its artifact loader.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentHandle {
    loader: Arc<RwLock<Option<Arc<dyn ArtifactLoader>>>>,
}

impl EnvironmentHandle {
    /// Create an empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the loader; threads created from now on bind to it.
    pub fn attach(&self, loader: Arc<dyn ArtifactLoader>) {
        debug!(loader = loader.name(), "Artifact loader attached to environment");
        *self.loader.write() = Some(loader);
    }

    /// Loader currently published, read fresh on every call.
    #[must_use]
    pub fn loader(&self) -> Option<Arc<dyn ArtifactLoader>> {
        self.loader.read().clone()
    }
}

/// Default factory: names threads after the pool and binds the environment's loader.
pub struct ContextBindingThreadFactory {
    prefix: String,
    environment: EnvironmentHandle,
    next_id: AtomicUsize,
}

impl ContextBindingThreadFactory {
    /// Create a factory producing threads named `<prefix>-<n>`.
    pub fn new(prefix: impl Into<String>, environment: EnvironmentHandle) -> Self {
        Self {
            prefix: prefix.into(),
            environment,
            next_id: AtomicUsize::new(1),
        }
    }
}

impl fmt::Debug for ContextBindingThreadFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBindingThreadFactory")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl ThreadFactory for ContextBindingThreadFactory {
    fn spawn(&self, body: WorkerBody) -> io::Result<JoinHandle<()>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let loader = self.environment.loader();
        thread::Builder::new()
            .name(format!("{}-{id}", self.prefix))
            .spawn(move || {
                BOUND_LOADER.with(|slot| *slot.borrow_mut() = loader);
                body();
            })
    }
}

/// Factory that only names its threads.
#[derive(Debug)]
pub struct PlainThreadFactory {
    prefix: String,
    next_id: AtomicUsize,
}

impl PlainThreadFactory {
    /// Create a factory producing threads named `<prefix>-<n>`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_id: AtomicUsize::new(1),
        }
    }
}

impl Default for PlainThreadFactory {
    fn default() -> Self {
        Self::new("pool-worker")
    }
}

impl ThreadFactory for PlainThreadFactory {
    fn spawn(&self, body: WorkerBody) -> io::Result<JoinHandle<()>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("{}-{id}", self.prefix))
            .spawn(body)
    }
}
