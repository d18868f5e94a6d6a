//! Error taxonomy for the prefetching enqueuers.
//!
//! Per-item failures (`FetchError`) are kept separate from failures of the
//! enqueuer machinery itself (`EnqueuerError`). A `FetchError` is an explicit
//! `(kind, message)` pair rather than a trait object so it can travel through
//! worker channels as a plain tagged value and compare cleanly in tests.

use thiserror::Error;

/// Error raised by a `Sequence` or `Generator` while computing one item.
///
/// Per-item failures are contained: they are queued in the failed item's
/// place and surfaced to the consumer when that position is reached, without
/// disturbing other workers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    kind: String,
    message: String,
}

impl FetchError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Standard failure for an index outside `[0, len)`.
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::new(
            "index",
            format!("index {} is not present (sequence length {})", index, len),
        )
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failures surfaced by an enqueuer's public operations or its output stream.
#[derive(Debug, Error)]
pub enum EnqueuerError {
    /// `start()` was called with invalid arguments, or twice.
    #[error("invalid start: {0}")]
    Startup(String),

    /// `get()` was called before `start()`.
    #[error("the enqueuer has not been started")]
    NotStarted,

    /// A per-item failure, delivered at the failed item's position.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// An execution unit terminated unexpectedly. The pool is poisoned and
    /// this enqueuer instance is unusable beyond teardown.
    #[error("a worker terminated unexpectedly; the enqueuer is poisoned")]
    WorkerCrash,
}

impl EnqueuerError {
    pub(crate) fn startup(message: impl Into<String>) -> Self {
        Self::Startup(message.into())
    }
}
