//! Saturation handlers consulted when a pool cannot admit a task.

use std::fmt;

use tracing::{debug, warn};

use crate::core::worker_pool::{Job, Saturation};
use crate::core::PoolError;

/// Decides what happens to a task the pool cannot admit.
///
/// Implementations are registered by name in the
/// [`StrategyRegistry`](crate::builders::StrategyRegistry) and selected through
/// the `thread-pool-rejection-policy` option.
pub trait RejectionPolicy: Send + Sync + fmt::Debug {
    /// Handle `job`, which the pool described by `pool` could not admit.
    ///
    /// # Errors
    ///
    /// Returning an error fails the submission with it.
    fn rejected(&self, job: Job, pool: &Saturation<'_>) -> Result<(), PoolError>;
}

/// Fails the submission.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortPolicy;

impl RejectionPolicy for AbortPolicy {
    fn rejected(&self, job: Job, _pool: &Saturation<'_>) -> Result<(), PoolError> {
        warn!(task_id = job.id(), "Task rejected: pool saturated");
        Err(PoolError::Rejected(format!("task {} rejected: pool saturated", job.id())))
    }
}

/// Runs the task on the submitting thread, unless the pool is shut down.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallerRunsPolicy;

impl RejectionPolicy for CallerRunsPolicy {
    fn rejected(&self, job: Job, pool: &Saturation<'_>) -> Result<(), PoolError> {
        if pool.is_shutdown() {
            debug!(task_id = job.id(), "Pool shut down, dropping task");
            return Ok(());
        }
        job.run();
        Ok(())
    }
}

/// Silently drops the task.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardPolicy;

impl RejectionPolicy for DiscardPolicy {
    fn rejected(&self, job: Job, _pool: &Saturation<'_>) -> Result<(), PoolError> {
        debug!(task_id = job.id(), "Task discarded: pool saturated");
        Ok(())
    }
}

/// Drops the oldest queued task and queues the new one in its place.
///
/// With nothing queued (a handoff pool whose workers are all busy and no other
/// submitter waiting) the submission fails instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardOldestPolicy;

impl RejectionPolicy for DiscardOldestPolicy {
    fn rejected(&self, job: Job, pool: &Saturation<'_>) -> Result<(), PoolError> {
        match pool.replace_oldest(job) {
            Ok(oldest) => {
                debug!(task_id = oldest.id(), "Oldest queued task discarded");
                Ok(())
            }
            Err(_) if pool.is_shutdown() => Ok(()),
            Err(job) => {
                warn!(task_id = job.id(), "Task rejected: nothing queued to discard");
                Err(PoolError::Rejected(format!(
                    "task {} rejected: pool saturated and nothing queued to discard",
                    job.id()
                )))
            }
        }
    }
}

/// Blocks the submitter until the pool can take the task. Used when no policy is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockPolicy;

impl RejectionPolicy for BlockPolicy {
    fn rejected(&self, job: Job, pool: &Saturation<'_>) -> Result<(), PoolError> {
        debug!(task_id = job.id(), queued = pool.queued(), "Pool saturated, submitter waiting");
        pool.wait_for_admission(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::threads::PlainThreadFactory;
    use crate::core::{PoolOptions, TaskError, WorkQueue, WorkerPool};
    use crossbeam_channel::{bounded, Receiver, Sender};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// One worker, backlog of one. The worker is parked on `gate` until released.
    fn saturated_pool(policy: Arc<dyn RejectionPolicy>) -> (WorkerPool, Sender<()>, Receiver<()>) {
        let options = PoolOptions::configured(1, 1, Duration::from_secs(30), WorkQueue::Bounded(1));
        let pool = WorkerPool::new(options, Arc::new(PlainThreadFactory::default()), Some(policy)).unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded::<()>(1);
        pool.execute(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
        started_rx.recv().unwrap();
        (pool, release_tx, started_rx)
    }

    #[test]
    fn test_abort_policy_rejects() {
        let (pool, release, _) = saturated_pool(Arc::new(AbortPolicy));
        let queued = pool.submit(|| 1).unwrap();
        assert!(matches!(pool.submit(|| 2), Err(PoolError::Rejected(_))));
        assert_eq!(pool.stats().rejected_tasks, 1);

        release.send(()).unwrap();
        assert_eq!(queued.join(), Ok(1));
    }

    #[test]
    fn test_caller_runs_policy_uses_submitting_thread() {
        let (pool, release, _) = saturated_pool(Arc::new(CallerRunsPolicy));
        let _queued = pool.submit(|| ()).unwrap();
        let caller = thread::current().id();
        let handle = pool.submit(move || thread::current().id() == caller).unwrap();
        assert_eq!(handle.join(), Ok(true));
        release.send(()).unwrap();
    }

    #[test]
    fn test_discard_policy_drops_task() {
        let (pool, release, _) = saturated_pool(Arc::new(DiscardPolicy));
        let _queued = pool.submit(|| ()).unwrap();
        let dropped = pool.submit(|| 3).unwrap();
        assert_eq!(dropped.join(), Err(TaskError::Discarded));
        release.send(()).unwrap();
    }

    #[test]
    fn test_discard_oldest_policy_replaces_head() {
        let (pool, release, _) = saturated_pool(Arc::new(DiscardOldestPolicy));
        let oldest = pool.submit(|| "old").unwrap();
        let newest = pool.submit(|| "new").unwrap();
        assert_eq!(oldest.join(), Err(TaskError::Discarded));

        release.send(()).unwrap();
        assert_eq!(newest.join(), Ok("new"));
    }

    #[test]
    fn test_discard_oldest_policy_rejects_when_nothing_queued() {
        let options = PoolOptions::configured(1, 1, Duration::from_secs(30), WorkQueue::Handoff);
        let pool = WorkerPool::new(
            options,
            Arc::new(PlainThreadFactory::default()),
            Some(Arc::new(DiscardOldestPolicy)),
        )
        .unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded::<()>(1);
        pool.execute(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
        started_rx.recv().unwrap();

        assert!(matches!(pool.submit(|| 1), Err(PoolError::Rejected(_))));
        assert_eq!(pool.stats().rejected_tasks, 1);

        release_tx.send(()).unwrap();
        while pool.stats().idle_workers == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pool.submit(|| 2).unwrap().join_timeout(Duration::from_secs(5)), Ok(2));
    }

    #[test]
    fn test_block_policy_waits_for_space() {
        let (pool, release, _) = saturated_pool(Arc::new(BlockPolicy));
        let pool = Arc::new(pool);
        let _queued = pool.submit(|| ()).unwrap();

        let submitter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.submit(|| "late").unwrap().join())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!submitter.is_finished());

        release.send(()).unwrap();
        assert_eq!(submitter.join().unwrap(), Ok("late"));
    }
}
