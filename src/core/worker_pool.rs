//! Thread-pool executor backing the batch environment.
//!
//! A `WorkerPool` keeps between `core_size` and `max_size` OS threads and a
//! backlog whose shape is picked by [`WorkQueue`]:
//!
//! - **Elastic**: no backlog; a task goes to an idle worker or a new one is spawned.
//! - **Unbounded**: FIFO backlog without limit, fed once `core_size` workers exist.
//! - **Bounded**: FIFO backlog of fixed capacity; when it is full the pool grows
//!   up to `max_size`, then the saturation handler decides.
//! - **Handoff**: zero-capacity rendezvous; submitters wait in FIFO order until a
//!   worker takes their task.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use job_streamer_agent::core::{PlainThreadFactory, PoolOptions, WorkerPool};
//!
//! let pool = WorkerPool::new(PoolOptions::fixed(4), Arc::new(PlainThreadFactory::default()), None)?;
//! let handle = pool.submit(|| 2 + 2)?;
//! assert_eq!(handle.join()?, 4);
//! pool.shutdown();
//! ```

mod handle;
mod pool;

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub use handle::{Job, TaskHandle};
pub use pool::{Saturation, WorkerPool};

/// Idle time after which cached-pool workers are reclaimed.
pub const CACHED_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Shape of the backlog between submitters and workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkQueue {
    /// Hand to an idle worker or spawn a new one; never queues.
    Elastic,
    /// Unlimited FIFO backlog.
    Unbounded,
    /// FIFO backlog holding at most this many tasks.
    Bounded(usize),
    /// Synchronous rendezvous with fair ordering among waiting submitters.
    ///
    /// The pool never grows past `max(core_size, 1)` workers here, so
    /// `max_size` has no effect; extra submitters wait instead.
    Handoff,
}

impl fmt::Display for WorkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elastic => write!(f, "elastic"),
            Self::Unbounded => write!(f, "unbounded"),
            Self::Bounded(capacity) => write!(f, "bounded({capacity})"),
            Self::Handoff => write!(f, "handoff"),
        }
    }
}

/// Sizing and queueing parameters for a [`WorkerPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Workers kept alive even when idle (unless core timeout is allowed).
    pub core_size: usize,
    /// Upper bound on live workers.
    pub max_size: usize,
    /// Idle time before a worker above `core_size` exits.
    pub keep_alive: Duration,
    /// Backlog shape.
    pub queue: WorkQueue,
    /// Whether core workers also exit after `keep_alive` of idleness.
    pub allow_core_thread_timeout: bool,
}

impl PoolOptions {
    /// Unbounded-growth pool whose idle workers are reclaimed after a minute.
    #[must_use]
    pub const fn cached() -> Self {
        Self {
            core_size: 0,
            max_size: usize::MAX,
            keep_alive: CACHED_KEEP_ALIVE,
            queue: WorkQueue::Elastic,
            allow_core_thread_timeout: false,
        }
    }

    /// Exactly `size` permanent workers in front of an unbounded backlog.
    #[must_use]
    pub const fn fixed(size: usize) -> Self {
        Self {
            core_size: size,
            max_size: size,
            keep_alive: Duration::ZERO,
            queue: WorkQueue::Unbounded,
            allow_core_thread_timeout: false,
        }
    }

    /// Fully parameterized pool.
    #[must_use]
    pub const fn configured(core_size: usize, max_size: usize, keep_alive: Duration, queue: WorkQueue) -> Self {
        Self {
            core_size,
            max_size,
            keep_alive,
            queue,
            allow_core_thread_timeout: false,
        }
    }

    /// Check the sizing contract.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size == 0 {
            return Err("max_size must be greater than 0".into());
        }
        if self.core_size > self.max_size {
            return Err(format!(
                "core_size ({}) must not exceed max_size ({})",
                self.core_size, self.max_size
            ));
        }
        if self.queue == WorkQueue::Bounded(0) {
            return Err("bounded queue capacity must be greater than 0".into());
        }
        Ok(())
    }
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Live worker threads.
    pub pool_size: usize,
    /// Workers currently waiting for a task.
    pub idle_workers: usize,
    /// Highest number of simultaneous workers seen.
    pub largest_pool_size: usize,
    /// Tasks running right now.
    pub active_tasks: u64,
    /// Tasks waiting in the backlog.
    pub queued_tasks: usize,
    /// Tasks handed to `submit`/`execute`.
    pub submitted_tasks: u64,
    /// Tasks that ran to completion.
    pub completed_tasks: u64,
    /// Tasks that panicked.
    pub failed_tasks: u64,
    /// Times the saturation handler was consulted.
    pub saturated_submissions: u64,
    /// Tasks refused, by shutdown or by the saturation handler.
    pub rejected_tasks: u64,
}

/// Lock-free counters shared by submitters and workers.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub saturated_submissions: AtomicU64,
    pub rejected_tasks: AtomicU64,
}

impl PoolCounters {
    /// Fill the counter part of a stats snapshot.
    pub fn snapshot(&self, stats: &mut PoolStats) {
        stats.active_tasks = self.active_tasks.load(Ordering::Relaxed);
        stats.submitted_tasks = self.submitted_tasks.load(Ordering::Relaxed);
        stats.completed_tasks = self.completed_tasks.load(Ordering::Relaxed);
        stats.failed_tasks = self.failed_tasks.load(Ordering::Relaxed);
        stats.saturated_submissions = self.saturated_submissions.load(Ordering::Relaxed);
        stats.rejected_tasks = self.rejected_tasks.load(Ordering::Relaxed);
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
