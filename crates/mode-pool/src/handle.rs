//! Deferred results for jobs submitted to a [`TaskPool`](crate::TaskPool).
//!
//! Every call to `submit` creates a one-shot channel. The sending half travels
//! with the job into the queue; the receiving half is handed back to the
//! caller as a [`TaskHandle`]. The worker that runs the job sends exactly one
//! [`Outcome`]: the job's return value, or the failure captured while running
//! it.
//!
//! A handle can be consumed two ways:
//!
//! - [`TaskHandle::join`] blocks the calling thread. Use it from plain
//!   threads (the downsample engine collects results this way).
//! - `TaskHandle` implements [`Future`], so async code can `.await` it
//!   without blocking an executor thread.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot::{self, error::TryRecvError};

/// Failure recorded in a handle instead of a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The job panicked. Carries the panic message when it was a string.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The job was dropped without ever reporting a result.
    #[error("task was dropped before producing a result")]
    Lost,
}

/// What a worker reports back for one job.
pub(crate) type Outcome<T> = Result<T, TaskFailure>;

/// Eventual result of a submitted job.
///
/// Dropping a handle does not cancel the job; the result is discarded when
/// the job finishes.
#[derive(Debug)]
#[must_use = "a task handle does nothing unless joined or awaited"]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn channel() -> (oneshot::Sender<Outcome<T>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Block until the job has run and return its value or failure.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async runtime context; `.await` the
    /// handle there instead.
    pub fn join(self) -> Result<T, TaskFailure> {
        self.rx.blocking_recv().unwrap_or(Err(TaskFailure::Lost))
    }

    /// Take the result if the job has already finished.
    ///
    /// Returns `None` while the job is queued or running. Once a result has
    /// been taken, later calls report [`TaskFailure::Lost`].
    pub fn try_take(&mut self) -> Option<Result<T, TaskFailure>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(TaskFailure::Lost)),
        }
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskFailure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskFailure::Lost)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_returns_sent_value() {
        let (tx, handle) = TaskHandle::channel();
        tx.send(Ok(7u32)).unwrap();
        assert_eq!(handle.join(), Ok(7));
    }

    #[test]
    fn test_dropped_sender_is_lost() {
        let (tx, handle) = TaskHandle::<u32>::channel();
        drop(tx);
        assert_eq!(handle.join(), Err(TaskFailure::Lost));
    }

    #[test]
    fn test_try_take_before_and_after_send() {
        let (tx, mut handle) = TaskHandle::channel();
        assert!(handle.try_take().is_none());

        tx.send(Ok("done")).unwrap();
        assert_eq!(handle.try_take(), Some(Ok("done")));
        assert_eq!(handle.try_take(), Some(Err(TaskFailure::Lost)));
    }

    #[test]
    fn test_await_handle() {
        let (tx, handle) = TaskHandle::channel();
        tx.send(Err(TaskFailure::Panicked("boom".into()))).unwrap();

        let outcome: Result<(), TaskFailure> = tokio_test::block_on(handle);
        assert_eq!(outcome, Err(TaskFailure::Panicked("boom".into())));
    }
}
