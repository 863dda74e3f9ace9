//! Units of work and the handles used to collect their results.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::{Mutex, MutexGuard};

use crate::core::TaskError;

type JobBody = Box<dyn FnOnce() -> bool + Send + 'static>;

/// A task as seen by the pool and its saturation handler.
///
/// Dropping a `Job` without running it discards the task; the submitter's
/// [`TaskHandle`] then reports [`TaskError::Discarded`].
pub struct Job {
    id: u64,
    body: JobBody,
}

impl Job {
    pub(crate) fn new(id: u64, body: impl FnOnce() -> bool + Send + 'static) -> Self {
        Self {
            id,
            body: Box::new(body),
        }
    }

    /// Pool-local sequence number assigned at submission.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Run the task on the current thread. Returns `false` if it panicked.
    pub fn run(self) -> bool {
        (self.body)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Result handle returned by [`WorkerPool::submit`](super::WorkerPool::submit).
#[derive(Debug)]
pub struct TaskHandle<R> {
    id: u64,
    rx: Receiver<Result<R, TaskError>>,
    /// Outcome already pulled off the channel by a non-blocking check.
    ready: Mutex<Option<Result<R, TaskError>>>,
}

impl<R> TaskHandle<R> {
    pub(crate) fn new(id: u64, rx: Receiver<Result<R, TaskError>>) -> Self {
        Self {
            id,
            rx,
            ready: Mutex::new(None),
        }
    }

    /// Sequence number of the underlying task.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Pull the outcome into `ready` if the channel already has one.
    fn poll(&self) -> MutexGuard<'_, Option<Result<R, TaskError>>> {
        let mut ready = self.ready.lock();
        if ready.is_none() {
            *ready = match self.rx.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err(TaskError::Discarded)),
            };
        }
        ready
    }

    /// Whether the outcome is available without blocking.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.poll().is_some()
    }

    /// Block until the task finishes.
    ///
    /// # Errors
    ///
    /// [`TaskError::Panicked`] if the task panicked, [`TaskError::Discarded`]
    /// if it was dropped before running.
    pub fn join(self) -> Result<R, TaskError> {
        match self.ready.into_inner() {
            Some(outcome) => outcome,
            None => self.rx.recv().unwrap_or(Err(TaskError::Discarded)),
        }
    }

    /// Block for at most `timeout`. The handle stays usable after a timeout.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join), plus [`TaskError::Timeout`].
    pub fn join_timeout(&self, timeout: Duration) -> Result<R, TaskError> {
        if let Some(outcome) = self.ready.lock().take() {
            return outcome;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(TaskError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Discarded),
        }
    }

    /// Take the outcome if it is already there.
    pub fn try_join(&self) -> Option<Result<R, TaskError>> {
        self.poll().take()
    }
}

#[cfg(feature = "tokio-runtime")]
impl<R: Send + 'static> TaskHandle<R> {
    /// Await the outcome from async code without blocking the runtime.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join).
    pub async fn join_async(self) -> Result<R, TaskError> {
        tokio::task::spawn_blocking(move || self.join())
            .await
            .unwrap_or_else(|e| Err(TaskError::Panicked(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_sender_reports_discarded() {
        let (tx, rx) = crossbeam_channel::bounded::<Result<u32, TaskError>>(1);
        let handle = TaskHandle::new(1, rx);
        assert!(handle.try_join().is_none());
        drop(tx);
        assert!(handle.is_finished());
        assert_eq!(handle.join(), Err(TaskError::Discarded));
    }

    #[test]
    fn test_is_finished_keeps_outcome_for_join() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = TaskHandle::new(2, rx);
        assert!(!handle.is_finished());
        tx.send(Ok(42_u32)).unwrap();
        drop(tx);

        assert!(handle.is_finished());
        assert!(handle.is_finished());
        assert_eq!(handle.join(), Ok(42));
    }

    #[test]
    fn test_try_join_after_is_finished_returns_value() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = TaskHandle::new(4, rx);
        tx.send(Err(TaskError::Panicked("boom".into()))).unwrap();
        assert!(handle.is_finished());
        assert_eq!(handle.try_join(), Some(Err::<u8, _>(TaskError::Panicked("boom".into()))));
    }

    #[test]
    fn test_join_timeout_keeps_handle() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = TaskHandle::new(7, rx);
        assert_eq!(handle.join_timeout(Duration::from_millis(10)), Err(TaskError::Timeout));
        tx.send(Ok("done")).unwrap();
        assert_eq!(handle.join_timeout(Duration::from_millis(10)), Ok("done"));
        assert_eq!(handle.id(), 7);
    }

    #[test]
    fn test_job_run_reports_success() {
        let job = Job::new(3, || true);
        assert_eq!(job.id(), 3);
        assert!(job.run());
    }
}
