//! Custom error types for the library.
//!
//! `PyramidError` is the single error type returned by the grid, indexer,
//! aggregator and engine, and by the storage and configuration layers around
//! them. It is built with `thiserror` and converts from the underlying error
//! types with `#[from]`, so `?` works across every layer.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidArgument`**: a caller broke a contract: malformed shape, a
//!   level outside `1..=max_level`, a window that leaves the grid, zero
//!   workers, or a non power-of-two extent where a full pyramid was
//!   requested. Never recovered internally.
//! - **`InvalidState`**: work was submitted to a task pool that has begun
//!   shutting down.
//! - **`WorkerSpawn`**: the OS refused to start a worker thread.
//! - **`TaskFailed`**: a job panicked (or was lost) on a worker thread. The
//!   engine reports the first such failure of a level after every other job
//!   of that level has finished.
//! - **`Io`**, **`Csv`**, **`Parse`**: reading or writing grid files.
//! - **`Config`**, **`Configuration`**: loading or validating configuration.
//!
//! Nothing here is retried: all operations are deterministic, so repeating
//! one with the same input reproduces the same error.

use mode_pool::{PoolError, TaskFailure};
use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type AppResult<T> = std::result::Result<T, PyramidError>;

/// Primary error type for grid downsampling.
#[derive(Error, Debug)]
pub enum PyramidError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(PoolError),

    #[error("Failed to start worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Task failed: {0}")]
    TaskFailed(#[from] TaskFailure),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed grid file: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl PyramidError {
    /// Shorthand for building an [`PyramidError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// True for errors caused by the caller's input rather than by the
    /// environment (I/O, worker threads).
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::InvalidState(_)
        )
    }
}

impl From<PoolError> for PyramidError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Spawn(source) => Self::WorkerSpawn(source),
            PoolError::InvalidWorkerCount => Self::InvalidArgument(err.to_string()),
            PoolError::InvalidState => Self::InvalidState(err),
        }
    }
}

impl From<figment::Error> for PyramidError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
