//! Start/stop lifecycle shared by both enqueuer variants.
//!
//! `Created → Running → Stopped`, strictly forward: an enqueuer is bound to
//! one source instance and is not restartable (restart by constructing a new
//! one). `start`/`stop` take `&mut self`, so the borrow checker enforces the
//! single-caller teardown rule.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};
use tracing::debug;

use super::pool::{PoolShared, WorkerPool};
use super::stream::{ItemStream, Slot};
use crate::enqueuer::EnqueuerConfig;
use crate::error::EnqueuerError;

pub(crate) enum Lifecycle<Src, T> {
    /// Holds the canonical source until `start()` hands it to the pool.
    Created { source: Option<Src> },
    Running(Running<T>),
    Stopped,
}

pub(crate) struct Running<T> {
    pub(crate) output_rx: Receiver<Slot<T>>,
    pub(crate) pool: WorkerPool,
}

/// Lifecycle state plus the shared flags, common to both variants.
pub(crate) struct Core<Src, T> {
    pub(crate) config: EnqueuerConfig,
    pub(crate) shared: Arc<PoolShared>,
    pub(crate) lifecycle: Lifecycle<Src, T>,
}

impl<Src, T> Core<Src, T> {
    pub(crate) fn new(source: Src, config: EnqueuerConfig) -> Self {
        Self {
            config,
            shared: PoolShared::new(),
            lifecycle: Lifecycle::Created {
                source: Some(source),
            },
        }
    }

    /// Validates `start()` arguments and claims the source, failing fast on
    /// invalid parameters or a repeated start.
    pub(crate) fn take_source(
        &mut self,
        workers: usize,
        queue_capacity: usize,
    ) -> Result<Src, EnqueuerError> {
        if workers == 0 {
            return Err(EnqueuerError::startup("workers must be > 0"));
        }
        if queue_capacity == 0 {
            return Err(EnqueuerError::startup("queue capacity must be > 0"));
        }
        match &mut self.lifecycle {
            Lifecycle::Created { source } => source
                .take()
                .ok_or_else(|| EnqueuerError::startup("source already claimed")),
            Lifecycle::Running(_) => Err(EnqueuerError::startup("already started")),
            Lifecycle::Stopped => Err(EnqueuerError::startup(
                "stopped enqueuers are inert; construct a new one",
            )),
        }
    }

    pub(crate) fn install(&mut self, output_rx: Receiver<Slot<T>>, pool: WorkerPool) {
        self.lifecycle = Lifecycle::Running(Running { output_rx, pool });
    }

    /// Returns a pull-based stream over the Work Queue.
    ///
    /// Errors before `start()` and after a crash; after `stop()` the stream
    /// immediately observes end-of-stream instead of blocking.
    pub(crate) fn stream(&self) -> Result<ItemStream<T>, EnqueuerError> {
        match &self.lifecycle {
            Lifecycle::Created { .. } => Err(EnqueuerError::NotStarted),
            Lifecycle::Running(running) => {
                if self.shared.is_poisoned() {
                    return Err(EnqueuerError::WorkerCrash);
                }
                Ok(ItemStream::new(
                    running.output_rx.clone(),
                    Arc::clone(&self.shared),
                    self.config.poll_interval,
                ))
            }
            Lifecycle::Stopped => {
                // Inert stream: a pre-disconnected channel ends immediately.
                let (tx, rx) = bounded(1);
                drop(tx);
                Ok(ItemStream::new(
                    rx,
                    Arc::clone(&self.shared),
                    self.config.poll_interval,
                ))
            }
        }
    }

    /// Signals shutdown, waits up to `timeout` for units to yield (abandoning
    /// stragglers), and clears queued state. Idempotent; reports a crash that
    /// occurred at any point during the run.
    pub(crate) fn stop(&mut self, timeout: Duration) -> Result<(), EnqueuerError> {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(running) => {
                let poisoned = running.pool.shutdown_join(timeout);
                while running.output_rx.try_recv().is_ok() {}
                debug!(poisoned, "enqueuer stopped");
                if poisoned {
                    Err(EnqueuerError::WorkerCrash)
                } else {
                    Ok(())
                }
            }
            // Stopping before starting, or again: nothing left to tear down.
            Lifecycle::Created { .. } | Lifecycle::Stopped => Ok(()),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running(_))
            && !self.shared.is_shutdown()
            && !self.shared.is_poisoned()
    }
}
