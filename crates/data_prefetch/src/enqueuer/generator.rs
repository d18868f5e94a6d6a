//! Unordered prefetching over a sequential generator.
//!
//! The `GeneratorEnqueuer` has no coordinator and no reorder buffer: workers
//! push items straight into the bounded Work Queue in whatever order they
//! finish, so delivery order is an interleaving artifact and nothing more.
//!
//! # Substrates
//!
//! - Shared-memory: every worker advances the *same* underlying generator
//!   through a [`SharedGenerator`] wrapper, so each produced item is emitted
//!   exactly once. A worker that pulls `None` exits quietly; once all have,
//!   the stream ends.
//! - Isolated: each worker owns an independent clone of the generator and
//!   advances it from its starting state. With W workers a finite generator's
//!   items are therefore delivered (up to) W times each; this mirrors what
//!   real process isolation does to replicated sequential state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::bounded;
use tracing::trace;

use super::config::EnqueuerConfig;
use super::lifecycle::Core;
use super::pool::{PoolShared, WorkerPool};
use super::stream::{push_slot, ItemStream, Slot};
use crate::error::{EnqueuerError, FetchError};
use crate::source::{Generator, SharedGenerator};

/// Per-worker view of the generator, fixed at `start()`.
enum WorkerGenerator<G> {
    /// Shared-memory substrate: advancement serialized over one instance.
    Shared(SharedGenerator<G>),
    /// Isolated substrate: a private copy, advanced independently.
    Independent(G),
}

impl<G: Generator> WorkerGenerator<G> {
    fn next(&mut self) -> Option<Result<G::Item, FetchError>> {
        match self {
            WorkerGenerator::Shared(shared) => shared.next(),
            WorkerGenerator::Independent(gen) => gen.next(),
        }
    }
}

/// Prefetching enqueuer over a [`Generator`], with no ordering guarantee.
///
/// On the isolated substrate each worker runs its own clone of the
/// generator; `Clone` stands in for the state replication real process
/// isolation would perform.
pub struct GeneratorEnqueuer<G: Generator + Clone> {
    core: Core<G, G::Item>,
}

impl<G: Generator + Clone> GeneratorEnqueuer<G> {
    pub fn new(generator: G, config: EnqueuerConfig) -> Self {
        Self {
            core: Core::new(generator, config),
        }
    }

    /// Spins up `workers` execution units pulling from the generator into a
    /// Work Queue bounded at `queue_capacity`.
    ///
    /// Fails synchronously with [`EnqueuerError::Startup`] if either argument
    /// is zero or the enqueuer was already started.
    pub fn start(&mut self, workers: usize, queue_capacity: usize) -> Result<(), EnqueuerError> {
        let generator = self.core.take_source(workers, queue_capacity)?;
        let config = self.core.config.clone();
        let shared = Arc::clone(&self.core.shared);

        let (output_tx, output_rx) = bounded::<Slot<G::Item>>(queue_capacity);

        // Per-worker generator views are materialized up front, then handed
        // out by worker id. The Mutex exists only for the one-time handoff.
        let views: Vec<Option<WorkerGenerator<G>>> = if config.isolated_workers {
            (0..workers)
                .map(|_| Some(WorkerGenerator::Independent(generator.clone())))
                .collect()
        } else {
            let source = SharedGenerator::new(generator);
            (0..workers)
                .map(|_| Some(WorkerGenerator::Shared(source.clone())))
                .collect()
        };
        let views = Mutex::new(views);

        let poll_interval = config.poll_interval;
        let worker_shared = Arc::clone(&shared);
        let pool = WorkerPool::spawn(workers, Arc::clone(&shared), move |worker_id| {
            let view = {
                let mut slots = match views.lock() {
                    Ok(slots) => slots,
                    Err(poisoned) => poisoned.into_inner(),
                };
                slots[worker_id].take()
            };
            if let Some(generator) = view {
                run_worker(worker_id, generator, &output_tx, &worker_shared, poll_interval);
            }
        })?;

        self.core.install(output_rx, pool);
        Ok(())
    }

    /// Returns the lazy output stream. See [`ItemStream`] for its contract.
    pub fn get(&self) -> Result<ItemStream<G::Item>, EnqueuerError> {
        self.core.stream()
    }

    /// Tears the pool down: idempotent, waits up to `timeout`, abandons
    /// stragglers, clears queued state.
    pub fn stop(&mut self, timeout: Duration) -> Result<(), EnqueuerError> {
        self.core.stop(timeout)
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }
}

fn run_worker<G: Generator>(
    worker_id: usize,
    mut generator: WorkerGenerator<G>,
    output_tx: &crossbeam_channel::Sender<Slot<G::Item>>,
    shared: &PoolShared,
    poll_interval: Duration,
) {
    trace!(worker_id, "generator worker started");
    loop {
        if shared.is_shutdown() {
            break;
        }

        let slot = match generator.next() {
            Some(Ok(item)) => Slot::Item(item),
            // Failure identity is preserved on both substrates: the error
            // travels the queue like an item and the stream continues.
            Some(Err(err)) => Slot::Failed(err),
            // Exhaustion is the normal end of a finite generator.
            None => break,
        };

        if !push_slot(output_tx, slot, shared, poll_interval) {
            break;
        }
    }
    trace!(worker_id, "generator worker exiting");
    // Each thread holds the queue sender through its copy of the worker
    // closure; once the last worker exits, the stream observes
    // end-of-stream after draining.
}
