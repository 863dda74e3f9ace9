//! # Job Streamer Agent
//!
//! Worker pool provisioning for the job-streamer batch agent.
//!
//! The batch runtime hands every unit of work to a thread pool whose shape is
//! chosen by a handful of configuration options. This crate reads those
//! options, validates them, and builds the pool; it also sends the progress
//! message the control bus expects when a job finishes.
//!
//! ## Topologies
//!
//! | `thread-pool-type` | Workers | Backlog |
//! |--------------------|---------|---------|
//! | `cached` (default) | grow on demand, reclaimed after 60s idle | none |
//! | `fixed` | exactly `thread-pool-core-size` | unbounded FIFO |
//! | `configured` | `core-size` to `max-size`, `keep-alive-time` | handoff (`queue-capacity` 0) or bounded FIFO |
//!
//! A configured pool can name a saturation handler with
//! `thread-pool-rejection-policy`; without one, submitters block until the pool
//! has room. Any pool can name a thread factory with `thread-factory`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use job_streamer_agent::builders::StrategyRegistry;
//! use job_streamer_agent::config::{keys, PoolConfiguration};
//! use job_streamer_agent::runtime::BatchEnvironment;
//!
//! let config = PoolConfiguration::new()
//!     .with(keys::THREAD_POOL_TYPE, "Configured")
//!     .with(keys::THREAD_POOL_CORE_SIZE, "2")
//!     .with(keys::THREAD_POOL_MAX_SIZE, "5")
//!     .with(keys::THREAD_POOL_KEEP_ALIVE_TIME, "30")
//!     .with(keys::THREAD_POOL_QUEUE_CAPACITY, "10");
//!
//! let env = BatchEnvironment::new(config, Arc::new(StrategyRegistry::with_builtins()))?;
//! let handle = env.submit_task(|| "step done")?;
//! assert_eq!(handle.join()?, "step done");
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Worker pool, thread creation and saturation handling.
pub mod core;
/// Configuration snapshot and loading.
pub mod config;
/// Builders that turn configuration into pools.
pub mod builders;
/// Batch environment and progress reporting.
pub mod runtime;
/// Shared utilities.
pub mod util;
