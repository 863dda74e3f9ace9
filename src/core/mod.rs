//! Worker pool, thread creation and saturation handling.

pub mod error;
pub mod rejection;
pub mod threads;
pub mod worker_pool;

pub use error::{AppResult, ConfigError, PoolError, TaskError};
pub use rejection::{
    AbortPolicy, BlockPolicy, CallerRunsPolicy, DiscardOldestPolicy, DiscardPolicy, RejectionPolicy,
};
pub use threads::{
    current_loader, ArtifactLoader, ContextBindingThreadFactory, EnvironmentHandle, PlainThreadFactory,
    ThreadFactory, WorkerBody,
};
pub use worker_pool::{
    Job, PoolOptions, PoolStats, Saturation, TaskHandle, WorkQueue, WorkerPool, CACHED_KEEP_ALIVE,
};
