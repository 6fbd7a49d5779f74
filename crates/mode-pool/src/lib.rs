//! Fixed-size worker thread pool for CPU-bound window jobs.
//!
//! The downsample engine fans one job out per window and then waits for all
//! of them. This crate provides the pool it runs on:
//!
//! - [`TaskPool`]: a fixed set of named OS threads consuming one FIFO queue
//! - [`TaskHandle`]: the deferred result of one submitted job
//!
//! # Key Design: Lock Only Around the Queue
//!
//! A single `parking_lot::Mutex` guards the queue and the shutdown flag, and a
//! single `Condvar` wakes workers both for new work and for shutdown. Workers
//! hold the lock only to pop a job; the job itself runs unlocked, so a slow
//! job never blocks `submit` or the other workers.
//!
//! # Failure Model
//!
//! A panicking job is caught on the worker, and the panic message is stored in
//! that job's handle as [`TaskFailure::Panicked`]. The worker keeps serving
//! the queue. The caller decides what a failed job means.
//!
//! # Shutdown
//!
//! [`TaskPool::shutdown`] closes the queue to new work, lets the workers drain
//! everything already queued, and joins them. It is idempotent and runs from
//! `Drop`, so no worker outlives its pool.
//!
//! # Example
//!
//! ```
//! use mode_pool::TaskPool;
//!
//! let pool = TaskPool::new(4)?;
//! let answer = pool.submit(|| 6 * 7)?;
//! let greeting = pool.submit(|| String::from("hello"))?;
//! pool.shutdown();
//!
//! assert_eq!(answer.join()?, 42);
//! assert_eq!(greeting.join()?, "hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod handle;

pub use handle::{TaskFailure, TaskHandle};

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use thiserror::Error;
use tracing::{debug, warn};

/// Type-erased unit of work as stored in the queue.
type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors returned by the pool itself (never by the jobs it runs).
#[derive(Error, Debug)]
pub enum PoolError {
    /// Work was submitted after shutdown had begun.
    #[error("task pool is shut down; no new work is accepted")]
    InvalidState,

    /// A pool was requested with zero workers.
    #[error("task pool needs at least one worker")]
    InvalidWorkerCount,

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct Queue {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

/// State shared between the pool handle and its workers.
struct Shared {
    queue: Mutex<Queue>,
    resume: Condvar,
}

impl Shared {
    fn close(&self) {
        self.queue.lock().shutdown = true;
        self.resume.notify_all();
    }
}

/// Fixed-size pool of worker threads draining a shared FIFO queue.
///
/// Jobs are dequeued in submission order. With more than one worker the
/// completion order is unspecified; keep the handles in the order you need
/// the results.
pub struct TaskPool {
    shared: Arc<Shared>,
    /// Join handles, drained by the first `shutdown()` while it holds the
    /// lock.
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_ids: Vec<ThreadId>,
    worker_count: usize,
}

impl TaskPool {
    /// Start a pool with `worker_count` threads.
    ///
    /// Callers usually pass the hardware parallelism, queried once.
    ///
    /// # Errors
    /// - [`PoolError::InvalidWorkerCount`] if `worker_count` is 0
    /// - [`PoolError::Spawn`] if a thread could not be started; the workers
    ///   that did start are shut down first
    pub fn new(worker_count: usize) -> Result<Self, PoolError> {
        if worker_count == 0 {
            return Err(PoolError::InvalidWorkerCount);
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            resume: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("mode-pool-{id}"))
                .spawn(move || worker_loop(id, &worker_shared));

            match spawned {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    shared.close();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(PoolError::Spawn(err));
                }
            }
        }

        debug!(workers = worker_count, "Task pool started");

        let worker_ids = workers.iter().map(|worker| worker.thread().id()).collect();
        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            worker_ids,
            worker_count,
        })
    }

    /// Queue a job and return the handle that will carry its result.
    ///
    /// Wakes one idle worker. Never blocks beyond the queue lock.
    ///
    /// # Errors
    /// [`PoolError::InvalidState`] once shutdown has begun; the job is not
    /// queued.
    pub fn submit<F, T>(&self, job: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, handle) = TaskHandle::channel();

        let wrapped: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job)).map_err(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(%message, "Task panicked; failure stored in its handle");
                TaskFailure::Panicked(message)
            });
            // The handle may have been dropped; the result is unwanted then.
            let _ = tx.send(outcome);
        });

        {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return Err(PoolError::InvalidState);
            }
            queue.jobs.push_back(wrapped);
        }
        self.shared.resume.notify_one();

        Ok(handle)
    }

    /// Stop accepting work, drain the queue and join every worker.
    ///
    /// Blocks until all queued and running jobs have finished, including
    /// when several threads call it at once: later callers wait for the
    /// first one to finish joining. Calling it again afterwards is a no-op.
    ///
    /// Called from inside one of this pool's own jobs, it only closes the
    /// queue and returns; the workers exit on their own once the queue is
    /// empty.
    pub fn shutdown(&self) {
        self.shared.close();

        if self.worker_ids.contains(&thread::current().id()) {
            return;
        }

        let mut workers = self.workers.lock();
        if workers.is_empty() {
            return;
        }

        for worker in workers.drain(..) {
            if worker.join().is_err() {
                warn!("Worker thread exited abnormally");
            }
        }

        debug!(workers = self.worker_count, "Task pool shut down");
    }

    /// Number of worker threads the pool was started with.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Jobs queued but not yet picked up by a worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.lock().shutdown
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, shared: &Shared) {
    debug!(worker = id, "Worker started");

    loop {
        let job = {
            let mut queue = shared.queue.lock();
            while !queue.shutdown && queue.jobs.is_empty() {
                shared.resume.wait(&mut queue);
            }
            // Empty here means shutdown with nothing left to drain.
            match queue.jobs.pop_front() {
                Some(job) => job,
                None => break,
            }
        };

        job();
    }

    debug!(worker = id, "Worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
