//! Worker pool implementation on dedicated OS threads.
//!
//! # Design
//!
//! - One `parking_lot::Mutex` guards the backlog and worker bookkeeping
//! - Workers block on `work_ready`; submitters waiting on saturation block on `space_ready`
//! - Handoff fairness comes from the FIFO backlog plus enqueue/dequeue sequence numbers
//! - Task results travel on per-task crossbeam channels, so no result map is kept

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::rejection::{BlockPolicy, RejectionPolicy};
use crate::core::threads::ThreadFactory;
use crate::core::{PoolError, TaskError};

use super::{panic_message, Job, PoolCounters, PoolOptions, PoolStats, TaskHandle, WorkQueue};

/// Externally visible lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Accepting submissions.
    Running,
    /// No new submissions; backlog is drained.
    Shutdown,
    /// No new submissions; backlog was discarded.
    Stopped,
}

/// State guarded by the pool mutex.
struct State {
    core_size: usize,
    max_size: usize,
    keep_alive: Duration,
    queue_kind: WorkQueue,
    allow_core_thread_timeout: bool,
    lifecycle: Lifecycle,
    backlog: VecDeque<Job>,
    /// Live workers, counted from the moment a spawn is reserved.
    workers: usize,
    /// Workers blocked waiting for a task.
    idle: usize,
    largest: usize,
    /// Sequence numbers of jobs pushed to / removed from the backlog.
    enqueued: u64,
    dequeued: u64,
}

impl State {
    const fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running)
    }

    /// An idle worker exists that no queued job has claimed yet.
    fn has_unclaimed_idle(&self) -> bool {
        self.idle > self.backlog.len()
    }

    fn push(&mut self, job: Job) -> u64 {
        let seq = self.enqueued;
        self.enqueued += 1;
        self.backlog.push_back(job);
        seq
    }

    fn pop(&mut self) -> Option<Job> {
        let job = self.backlog.pop_front()?;
        self.dequeued += 1;
        Some(job)
    }

    fn reserve_worker(&mut self) {
        self.workers += 1;
        self.largest = self.largest.max(self.workers);
    }

    fn worker_may_time_out(&self) -> bool {
        self.allow_core_thread_timeout || self.workers > self.core_size
    }
}

/// What admission decided for a job.
enum Admission {
    Queued,
    Spawn(Job),
    Saturated(Job),
}

pub(crate) struct Inner {
    id: Uuid,
    state: Mutex<State>,
    work_ready: Condvar,
    space_ready: Condvar,
    terminated: Condvar,
    factory: Arc<dyn ThreadFactory>,
    rejection: Arc<dyn RejectionPolicy>,
    counters: PoolCounters,
    next_job_id: AtomicU64,
}

impl Inner {
    /// Place a job without ever blocking, or report saturation.
    fn admit(&self, state: &mut State, job: Job) -> Admission {
        match state.queue_kind {
            WorkQueue::Elastic => {
                if state.has_unclaimed_idle() {
                    state.push(job);
                    Admission::Queued
                } else if state.workers < state.max_size {
                    Admission::Spawn(job)
                } else {
                    Admission::Saturated(job)
                }
            }
            WorkQueue::Unbounded => {
                if state.workers < state.core_size.max(1) {
                    Admission::Spawn(job)
                } else {
                    state.push(job);
                    Admission::Queued
                }
            }
            WorkQueue::Bounded(capacity) => {
                // A queued job needs at least one live worker to pick it up.
                if state.workers < state.core_size || state.workers == 0 {
                    Admission::Spawn(job)
                } else if state.backlog.len() < capacity {
                    state.push(job);
                    Admission::Queued
                } else if state.workers < state.max_size {
                    Admission::Spawn(job)
                } else {
                    Admission::Saturated(job)
                }
            }
            WorkQueue::Handoff => {
                if state.has_unclaimed_idle() {
                    state.push(job);
                    Admission::Queued
                } else if state.workers < state.core_size.max(1) {
                    Admission::Spawn(job)
                } else {
                    Admission::Saturated(job)
                }
            }
        }
    }

    fn dispatch(self: &Arc<Self>, job: Job) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        if !state.is_running() {
            drop(state);
            self.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::Shutdown);
        }
        match self.admit(&mut state, job) {
            Admission::Queued => {
                drop(state);
                self.work_ready.notify_one();
                Ok(())
            }
            Admission::Spawn(job) => {
                state.reserve_worker();
                drop(state);
                self.spawn_worker(Some(job))
            }
            Admission::Saturated(job) => {
                drop(state);
                self.counters.saturated_submissions.fetch_add(1, Ordering::Relaxed);
                let outcome = self.rejection.rejected(job, &Saturation { inner: self });
                if outcome.is_err() {
                    self.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                }
                outcome
            }
        }
    }

    /// Start a worker for a slot already reserved in `State::workers`.
    fn spawn_worker(self: &Arc<Self>, first: Option<Job>) -> Result<(), PoolError> {
        let inner = Arc::clone(self);
        let spawned = self.factory.spawn(Box::new(move || inner.worker_loop(first)));
        match spawned {
            Ok(_detached) => Ok(()),
            Err(e) => {
                error!(pool_id = %self.id, error = %e, "Failed to spawn worker thread");
                self.release_worker(&mut self.state.lock());
                Err(PoolError::Spawn(e.to_string()))
            }
        }
    }

    fn release_worker(&self, state: &mut MutexGuard<'_, State>) {
        state.workers -= 1;
        if state.workers == 0 && !state.is_running() {
            self.terminated.notify_all();
        }
    }

    fn worker_loop(self: Arc<Self>, first: Option<Job>) {
        debug!(pool_id = %self.id, "Worker thread started");
        let mut task = first;
        loop {
            if let Some(job) = task.take() {
                self.run_job(job);
            }
            match self.next_job() {
                Some(job) => task = Some(job),
                None => break,
            }
        }
        debug!(pool_id = %self.id, "Worker thread exiting");
    }

    fn run_job(&self, job: Job) {
        self.counters.active_tasks.fetch_add(1, Ordering::Relaxed);
        let completed = job.run();
        self.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
        if completed {
            self.counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Wait for the next task. `None` means this worker must exit; its slot is already released.
    fn next_job(&self) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            if let Some(job) = state.pop() {
                drop(state);
                self.space_ready.notify_all();
                return Some(job);
            }
            if !state.is_running() {
                self.release_worker(&mut state);
                return None;
            }

            let timed = state.worker_may_time_out();
            state.idle += 1;
            let timed_out = if timed {
                let keep_alive = state.keep_alive;
                self.work_ready.wait_for(&mut state, keep_alive).timed_out()
            } else {
                self.work_ready.wait(&mut state);
                false
            };
            state.idle -= 1;

            if timed_out && state.backlog.is_empty() && state.worker_may_time_out() {
                debug!(pool_id = %self.id, "Idle worker reclaimed after keep-alive");
                self.release_worker(&mut state);
                return None;
            }
        }
    }
}

/// View of a saturated pool handed to a [`RejectionPolicy`].
pub struct Saturation<'a> {
    inner: &'a Arc<Inner>,
}

impl Saturation<'_> {
    /// Whether the pool has stopped accepting work.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        !self.inner.state.lock().is_running()
    }

    /// Tasks currently waiting in the backlog.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.state.lock().backlog.len()
    }

    /// Put `job` in place of the oldest queued task, keeping the backlog length.
    ///
    /// Returns the displaced task, or gives `job` back when nothing is queued
    /// or the pool has shut down. A non-empty backlog always has a live worker,
    /// so the replacement is never stranded.
    ///
    /// # Errors
    ///
    /// `Err(job)` when there is nothing to replace.
    pub fn replace_oldest(&self, job: Job) -> Result<Job, Job> {
        let inner = self.inner;
        let mut state = inner.state.lock();
        if !state.is_running() {
            return Err(job);
        }
        let Some(oldest) = state.pop() else {
            return Err(job);
        };
        state.push(job);
        drop(state);
        inner.space_ready.notify_all();
        inner.work_ready.notify_one();
        Ok(oldest)
    }

    /// Block the caller until the pool accepts `job`.
    ///
    /// Admission is re-checked first, since workers may have exited or become
    /// idle since the pool reported saturation. With a handoff or elastic
    /// backlog the caller then waits, in FIFO order with other waiters, until a
    /// worker has taken the job. Otherwise it waits for backlog space or a free
    /// worker slot.
    ///
    /// # Errors
    ///
    /// [`PoolError::Shutdown`] if the pool shuts down before accepting the job.
    pub fn wait_for_admission(&self, job: Job) -> Result<(), PoolError> {
        let inner = self.inner;
        let mut state = inner.state.lock();
        let rendezvous = matches!(state.queue_kind, WorkQueue::Handoff | WorkQueue::Elastic);

        let mut job = job;
        loop {
            if !state.is_running() {
                return Err(PoolError::Shutdown);
            }
            match inner.admit(&mut state, job) {
                Admission::Queued => {
                    drop(state);
                    inner.work_ready.notify_one();
                    return Ok(());
                }
                Admission::Spawn(spawn) => {
                    state.reserve_worker();
                    drop(state);
                    return inner.spawn_worker(Some(spawn));
                }
                // Saturated implies at least one live worker, which will take the job.
                Admission::Saturated(pending) if rendezvous => {
                    let seq = state.push(pending);
                    inner.work_ready.notify_one();
                    while state.dequeued <= seq {
                        inner.space_ready.wait(&mut state);
                    }
                    return Ok(());
                }
                Admission::Saturated(pending) => {
                    job = pending;
                    inner.space_ready.wait(&mut state);
                }
            }
        }
    }
}

/// Thread pool with configurable sizing, backlog and saturation handling.
///
/// Dropping the pool shuts it down like [`shutdown`](Self::shutdown) but does
/// not wait for the workers.
pub struct WorkerPool {
    inner: Arc<Inner>,
}

impl WorkerPool {
    /// Create a pool. No thread is started until work arrives or
    /// [`prestart_all_core_threads`](Self::prestart_all_core_threads) is called.
    ///
    /// `rejection` is the saturation handler; `None` selects [`BlockPolicy`].
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Rejected` if `options` violates the sizing contract.
    pub fn new(
        options: PoolOptions,
        factory: Arc<dyn ThreadFactory>,
        rejection: Option<Arc<dyn RejectionPolicy>>,
    ) -> Result<Self, PoolError> {
        options
            .validate()
            .map_err(|e| PoolError::Rejected(format!("invalid pool options: {e}")))?;

        let rejection = rejection.unwrap_or_else(|| Arc::new(BlockPolicy));
        let id = Uuid::new_v4();
        info!(
            pool_id = %id,
            core_size = options.core_size,
            max_size = options.max_size,
            keep_alive_secs = options.keep_alive.as_secs(),
            queue = %options.queue,
            rejection = ?rejection,
            "WorkerPool initialized"
        );

        let state = State {
            core_size: options.core_size,
            max_size: options.max_size,
            keep_alive: options.keep_alive,
            queue_kind: options.queue,
            allow_core_thread_timeout: options.allow_core_thread_timeout,
            lifecycle: Lifecycle::Running,
            backlog: VecDeque::new(),
            workers: 0,
            idle: 0,
            largest: 0,
            enqueued: 0,
            dequeued: 0,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                id,
                state: Mutex::new(state),
                work_ready: Condvar::new(),
                space_ready: Condvar::new(),
                terminated: Condvar::new(),
                factory,
                rejection,
                counters: PoolCounters::default(),
                next_job_id: AtomicU64::new(0),
            }),
        })
    }

    /// Unique identifier of this pool, used in log records.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Submit a task and get a handle to its result.
    ///
    /// Returns immediately unless the backlog is a handoff with no free worker,
    /// or the backlog is full and the saturation handler blocks.
    ///
    /// # Errors
    ///
    /// - `PoolError::Shutdown` if the pool no longer accepts work
    /// - `PoolError::Rejected` if the saturation handler refused the task
    /// - `PoolError::Spawn` if a needed worker thread could not be created
    pub fn submit<F, R>(&self, task: F) -> Result<TaskHandle<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let id = self.inner.next_job_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = crossbeam_channel::bounded(1);
        let job = Job::new(id, move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task))
                .map_err(|payload| TaskError::Panicked(panic_message(&*payload)));
            let completed = outcome.is_ok();
            let _ = tx.send(outcome);
            completed
        });

        self.inner.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        self.inner.dispatch(job)?;
        debug!(pool_id = %self.inner.id, task_id = id, "Task submitted to worker pool");
        Ok(TaskHandle::new(id, rx))
    }

    /// Submit a task whose result nobody waits for. Panics are logged.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    pub fn execute<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.inner.next_job_id.fetch_add(1, Ordering::Relaxed);
        let pool_id = self.inner.id;
        let job = Job::new(id, move || match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => true,
            Err(payload) => {
                warn!(pool_id = %pool_id, task_id = id, panic = %panic_message(&*payload), "Task panicked");
                false
            }
        });

        self.inner.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        self.inner.dispatch(job)
    }

    /// Start every missing core worker now. Returns how many were started.
    pub fn prestart_all_core_threads(&self) -> usize {
        let mut started = 0;
        loop {
            {
                let mut state = self.inner.state.lock();
                if !state.is_running() || state.workers >= state.core_size {
                    break;
                }
                state.reserve_worker();
            }
            if self.inner.spawn_worker(None).is_err() {
                break;
            }
            started += 1;
        }
        debug!(pool_id = %self.inner.id, started, "Core threads prestarted");
        started
    }

    /// Let core workers exit after the keep-alive period, like the ones above core size.
    pub fn allow_core_thread_timeout(&self, allow: bool) {
        self.inner.state.lock().allow_core_thread_timeout = allow;
        // Idle core workers re-evaluate their wait mode.
        self.inner.work_ready.notify_all();
    }

    /// Whether core workers may time out.
    #[must_use]
    pub fn allows_core_thread_timeout(&self) -> bool {
        self.inner.state.lock().allow_core_thread_timeout
    }

    /// Stop accepting work; queued tasks still run, then workers exit.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        if !state.is_running() {
            return;
        }
        state.lifecycle = Lifecycle::Shutdown;
        info!(pool_id = %self.inner.id, queued = state.backlog.len(), "Shutting down worker pool");
        if state.workers == 0 {
            self.inner.terminated.notify_all();
        }
        drop(state);
        self.inner.work_ready.notify_all();
        self.inner.space_ready.notify_all();
    }

    /// Stop accepting work and drop every queued task. Running tasks finish.
    ///
    /// Returns the number of queued tasks that were discarded.
    pub fn shutdown_now(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.lifecycle = Lifecycle::Stopped;
        let discarded: Vec<Job> = state.backlog.drain(..).collect();
        state.dequeued = state.enqueued;
        if state.workers == 0 {
            self.inner.terminated.notify_all();
        }
        drop(state);
        self.inner.work_ready.notify_all();
        self.inner.space_ready.notify_all();

        let count = discarded.len();
        drop(discarded);
        info!(pool_id = %self.inner.id, discarded = count, "Worker pool stopped");
        count
    }

    /// Whether `shutdown` or `shutdown_now` has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        !self.inner.state.lock().is_running()
    }

    /// Whether the pool is shut down and every worker has exited.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        let state = self.inner.state.lock();
        !state.is_running() && state.workers == 0
    }

    /// Block until terminated or until `timeout` elapses. Returns `true` if terminated.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while state.is_running() || state.workers > 0 {
            if self.inner.terminated.wait_until(&mut state, deadline).timed_out() {
                return !state.is_running() && state.workers == 0;
            }
        }
        true
    }

    /// Workers kept when idle.
    #[must_use]
    pub fn core_size(&self) -> usize {
        self.inner.state.lock().core_size
    }

    /// Upper bound on workers.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.inner.state.lock().max_size
    }

    /// Idle time before a non-core worker exits.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.inner.state.lock().keep_alive
    }

    /// Backlog shape.
    #[must_use]
    pub fn queue_kind(&self) -> WorkQueue {
        self.inner.state.lock().queue_kind
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let mut stats = {
            let state = self.inner.state.lock();
            PoolStats {
                pool_size: state.workers,
                idle_workers: state.idle,
                largest_pool_size: state.largest,
                queued_tasks: state.backlog.len(),
                ..PoolStats::default()
            }
        };
        self.inner.counters.snapshot(&mut stats);
        stats
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers drain the backlog and exit on their own; they are not joined here.
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.inner.id)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
