//! Worker pool shared by both enqueuer variants.
//!
//! Manages worker lifecycle around a caller-supplied loop closure:
//! - Named threads (`enqueuer-worker-{id}`) for debuggability
//! - A shared shutdown flag checked cooperatively between items
//! - Panic poisoning: any worker that unwinds marks the whole pool poisoned,
//!   which the enqueuer surfaces as a hard `WorkerCrash` failure
//! - Timed teardown: `shutdown_join` waits up to a grace period, then
//!   abandons stragglers instead of blocking the consumer forever

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::EnqueuerError;

/// Cadence for polling `JoinHandle::is_finished` during timed teardown.
const JOIN_POLL_MS: u64 = 10;

/// State shared between the pool, its workers, and the output stream.
pub(crate) struct PoolShared {
    /// Cooperative stop signal, checked at loop boundaries.
    pub(crate) shutdown: AtomicBool,
    /// Set when any execution unit terminates by panicking.
    pub(crate) poisoned: AtomicBool,
}

impl PoolShared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            shutdown: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Relaxed)
    }
}

/// Marks the pool poisoned if the owning thread unwinds.
struct PanicGuard {
    shared: Arc<PoolShared>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.poisoned.store(true, Ordering::Relaxed);
            // Unblock everyone else; a poisoned pool cannot make progress.
            self.shared.shutdown.store(true, Ordering::Relaxed);
        }
    }
}

/// Fixed-size set of parallel execution units.
///
/// The worker function receives its worker id and runs until it returns;
/// channel endpoints are cloned into the closure by the caller. An extra
/// singleton thread (the ordered variant's coordinator) can be attached so
/// teardown covers it too.
pub(crate) struct WorkerPool {
    handles: Vec<thread::JoinHandle<()>>,
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    pub(crate) fn spawn<F>(
        num_workers: usize,
        shared: Arc<PoolShared>,
        worker_fn: F,
    ) -> Result<Self, EnqueuerError>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let worker_fn = Arc::new(worker_fn);
        let mut handles = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let worker_fn = Arc::clone(&worker_fn);
            let shared = Arc::clone(&shared);

            let handle = thread::Builder::new()
                .name(format!("enqueuer-worker-{}", worker_id))
                .spawn(move || {
                    let _guard = PanicGuard {
                        shared: Arc::clone(&shared),
                    };
                    worker_fn(worker_id);
                })
                .map_err(|e| {
                    EnqueuerError::startup(format!(
                        "failed to spawn worker thread {}: {}",
                        worker_id, e
                    ))
                })?;

            handles.push(handle);
        }

        debug!(num_workers, "spawned worker pool");
        Ok(Self { handles, shared })
    }

    /// Attaches an auxiliary singleton thread (e.g. the epoch coordinator)
    /// so that teardown and poisoning cover it like any worker.
    pub(crate) fn attach<F>(&mut self, name: &str, unit_fn: F) -> Result<(), EnqueuerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _guard = PanicGuard {
                    shared: Arc::clone(&shared),
                };
                unit_fn();
            })
            .map_err(|e| EnqueuerError::startup(format!("failed to spawn {}: {}", name, e)))?;
        self.handles.push(handle);
        Ok(())
    }

    /// Signals shutdown, waits up to `timeout` for units to yield, then
    /// abandons any that have not. Returns whether the pool ended poisoned.
    ///
    /// Abandoned threads still see the shutdown flag and exit at their next
    /// loop boundary; they just no longer block the consumer.
    pub(crate) fn shutdown_join(mut self, timeout: Duration) -> bool {
        self.shared.shutdown.store(true, Ordering::Relaxed);

        let deadline = Instant::now() + timeout;
        while !self.handles.is_empty() {
            self.handles.retain(|handle| !handle.is_finished());
            if self.handles.is_empty() {
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    remaining = self.handles.len(),
                    "abandoning execution units that did not yield within the stop timeout"
                );
                break;
            }
            thread::sleep(Duration::from_millis(JOIN_POLL_MS));
        }

        // `retain` above dropped the finished handles without joining; panics
        // are already recorded through the PanicGuard, so nothing is lost.
        self.handles.clear();
        self.shared.is_poisoned()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Never block in Drop: signal and let units exit at their own pace.
        self.shared.shutdown.store(true, Ordering::Relaxed);
    }
}
