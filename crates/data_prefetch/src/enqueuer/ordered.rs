//! Ordered prefetching over a finite, randomly-indexable sequence.
//!
//! The `OrderedEnqueuer` delivers items to the consumer in exact dispatch
//! order (identity, or a per-epoch permutation when shuffling) no matter
//! which worker finishes first, and applies the sequence's epoch-end
//! mutation exactly once between epochs.
//!
//! # Ordering & epoch algorithm
//!
//! A dedicated coordinator thread owns the canonical sequence and runs the
//! epoch loop:
//!
//! 1. Build the epoch's dispatch order over `[0, N)` and, on the isolated
//!    substrate, publish a fresh immutable snapshot of the sequence.
//! 2. Feed `(pos, index)` work into a bounded task channel; workers pull the
//!    next unassigned position atomically, compute `item(index)` against
//!    their view of the sequence, and report the completion keyed by
//!    dispatch position.
//! 3. Completions land in a reorder buffer; the coordinator drains the
//!    contiguous prefix at `next_deliver` into the Work Queue, so the
//!    consumer sees positions `0, 1, 2, ...` regardless of completion order.
//! 4. Once position `N-1` has been delivered, the coordinator — and only the
//!    coordinator — invokes `on_epoch_end()` on the canonical instance, then
//!    starts epoch k+1. Position 0 of epoch k+1 is never dispatched before
//!    the hook's effect is visible, because the coordinator is strictly
//!    sequential.
//!
//! # Substrates
//!
//! - Shared-memory: workers read the canonical sequence through
//!   `Arc<RwLock<S>>`; the coordinator takes the write lock only at epoch
//!   boundaries.
//! - Isolated: workers never see the canonical instance. Each epoch's tasks
//!   carry an `Arc` of a cloned snapshot, and all mutation happens in the
//!   coordinator's own copy. A per-item failure cannot carry its identity
//!   across this boundary and degrades to end-of-stream.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use super::config::EnqueuerConfig;
use super::lifecycle::Core;
use super::pool::{PoolShared, WorkerPool};
use super::stream::{push_slot, ItemStream, Slot};
use crate::error::{EnqueuerError, FetchError};
use crate::source::Sequence;

/// One unit of dispatched work: the `pos`-th slot of the current epoch maps
/// to sequence index `index`. On the isolated substrate the epoch snapshot
/// rides along with the task.
struct Fetch<S> {
    pos: usize,
    index: usize,
    snapshot: Option<Arc<S>>,
}

/// A completed fetch, keyed by dispatch position for reordering.
struct Completion<T> {
    pos: usize,
    result: Result<T, FetchError>,
}

/// How a worker reads the sequence for the current epoch.
enum WorkerView<S> {
    /// Shared-memory substrate: the canonical instance behind a read lock.
    Canonical(Arc<RwLock<S>>),
    /// Isolated substrate: an immutable snapshot arrives with each task.
    PerTaskSnapshot,
}

/// The coordinator's exclusive handle on the canonical sequence.
enum Canonical<S> {
    /// Shared with workers; write-locked only at epoch boundaries.
    Shared(Arc<RwLock<S>>),
    /// Owned outright; workers get per-epoch clones.
    Owned(S),
}

impl<S: Sequence + Clone> Canonical<S> {
    fn len(&self) -> usize {
        match self {
            Canonical::Shared(lock) => read_lock(lock).len(),
            Canonical::Owned(seq) => seq.len(),
        }
    }

    /// Fresh per-epoch snapshot for isolated workers; `None` when workers
    /// share the canonical instance directly.
    fn snapshot(&self) -> Option<Arc<S>> {
        match self {
            Canonical::Shared(_) => None,
            Canonical::Owned(seq) => Some(Arc::new(seq.clone())),
        }
    }

    /// Single-writer epoch boundary: applies the mutation hook exactly once.
    fn end_epoch(&mut self) {
        match self {
            Canonical::Shared(lock) => {
                let mut guard = match lock.write() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                guard.on_epoch_end();
            }
            Canonical::Owned(seq) => seq.on_epoch_end(),
        }
    }
}

fn read_lock<S>(lock: &RwLock<S>) -> std::sync::RwLockReadGuard<'_, S> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Prefetching enqueuer that preserves strict delivery order over a
/// [`Sequence`] and cycles epochs until stopped.
///
/// `Clone` on the sequence plays the role serialization plays for real
/// process isolation: it is how per-epoch snapshots reach isolated workers.
pub struct OrderedEnqueuer<S: Sequence + Clone> {
    core: Core<S, S::Item>,
}

impl<S: Sequence + Clone> OrderedEnqueuer<S> {
    /// Binds the enqueuer to one canonical sequence instance.
    pub fn new(sequence: S, config: EnqueuerConfig) -> Self {
        Self {
            core: Core::new(sequence, config),
        }
    }

    /// Spins up `workers` execution units plus the epoch coordinator, with a
    /// Work Queue bounded at `queue_capacity`.
    ///
    /// Fails synchronously with [`EnqueuerError::Startup`] if either argument
    /// is zero or the enqueuer was already started.
    pub fn start(&mut self, workers: usize, queue_capacity: usize) -> Result<(), EnqueuerError> {
        let sequence = self.core.take_source(workers, queue_capacity)?;
        let config = self.core.config.clone();
        let shared = Arc::clone(&self.core.shared);
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());

        let (task_tx, task_rx) = bounded::<Fetch<S>>(queue_capacity);
        let (done_tx, done_rx) = bounded::<Completion<S::Item>>(queue_capacity);
        let (output_tx, output_rx) = bounded::<Slot<S::Item>>(queue_capacity);

        let (canonical, view) = if config.isolated_workers {
            (Canonical::Owned(sequence), WorkerView::PerTaskSnapshot)
        } else {
            let lock = Arc::new(RwLock::new(sequence));
            (Canonical::Shared(Arc::clone(&lock)), WorkerView::Canonical(lock))
        };

        let poll_interval = config.poll_interval;
        let worker_shared = Arc::clone(&shared);
        let mut pool = WorkerPool::spawn(workers, Arc::clone(&shared), move |worker_id| {
            let task_rx = task_rx.clone();
            let done_tx = done_tx.clone();
            let view = match &view {
                WorkerView::Canonical(lock) => WorkerView::Canonical(Arc::clone(lock)),
                WorkerView::PerTaskSnapshot => WorkerView::PerTaskSnapshot,
            };
            run_worker(worker_id, task_rx, done_tx, view, &worker_shared, poll_interval);
        })?;

        let coordinator_shared = Arc::clone(&shared);
        pool.attach("enqueuer-coordinator", move || {
            run_coordinator(
                canonical,
                task_tx,
                done_rx,
                output_tx,
                coordinator_shared,
                CoordinatorParams {
                    shuffle: config.shuffle,
                    isolated: config.isolated_workers,
                    seed,
                    poll_interval,
                },
            );
        })?;

        self.core.install(output_rx, pool);
        Ok(())
    }

    /// Returns the lazy output stream. See [`ItemStream`] for its contract.
    pub fn get(&self) -> Result<ItemStream<S::Item>, EnqueuerError> {
        self.core.stream()
    }

    /// Tears the pool down; see [`Core::stop`] semantics: idempotent, waits
    /// up to `timeout`, abandons stragglers, clears queued state.
    pub fn stop(&mut self, timeout: Duration) -> Result<(), EnqueuerError> {
        self.core.stop(timeout)
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }
}

fn run_worker<S: Sequence>(
    worker_id: usize,
    task_rx: Receiver<Fetch<S>>,
    done_tx: Sender<Completion<S::Item>>,
    view: WorkerView<S>,
    shared: &PoolShared,
    poll_interval: Duration,
) {
    trace!(worker_id, "ordered worker started");
    loop {
        if shared.is_shutdown() {
            break;
        }

        let fetch = match task_rx.recv_timeout(poll_interval) {
            Ok(fetch) => fetch,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let result = match (&fetch.snapshot, &view) {
            (Some(snapshot), _) => snapshot.item(fetch.index),
            (None, WorkerView::Canonical(lock)) => read_lock(lock).item(fetch.index),
            (None, WorkerView::PerTaskSnapshot) => Err(FetchError::new(
                "dispatch",
                "isolated task arrived without a snapshot",
            )),
        };

        let completion = Completion {
            pos: fetch.pos,
            result,
        };
        if !push_completion(&done_tx, completion, shared, poll_interval) {
            break;
        }
    }
    trace!(worker_id, "ordered worker exiting");
}

fn push_completion<T>(
    done_tx: &Sender<Completion<T>>,
    completion: Completion<T>,
    shared: &PoolShared,
    poll_interval: Duration,
) -> bool {
    let mut pending = completion;
    loop {
        if shared.is_shutdown() {
            return false;
        }
        match done_tx.send_timeout(pending, poll_interval) {
            Ok(()) => return true,
            Err(crossbeam_channel::SendTimeoutError::Timeout(c)) => pending = c,
            Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

struct CoordinatorParams {
    shuffle: bool,
    isolated: bool,
    seed: u64,
    poll_interval: Duration,
}

fn run_coordinator<S: Sequence + Clone>(
    mut canonical: Canonical<S>,
    task_tx: Sender<Fetch<S>>,
    done_rx: Receiver<Completion<S::Item>>,
    output_tx: Sender<Slot<S::Item>>,
    shared: Arc<PoolShared>,
    params: CoordinatorParams,
) {
    let mut epoch: u64 = 0;

    'run: loop {
        let n = canonical.len();
        if n == 0 {
            debug!("sequence is empty; ending stream");
            break;
        }

        let order = dispatch_order(n, params.shuffle, params.seed, epoch);
        let snapshot = canonical.snapshot();

        let mut next_dispatch = 0usize;
        let mut next_deliver = 0usize;
        let mut reorder: BTreeMap<usize, Result<S::Item, FetchError>> = BTreeMap::new();

        while next_deliver < n {
            if shared.is_shutdown() {
                break 'run;
            }

            // Keep the dispatch pipeline as full as the task channel allows.
            while next_dispatch < n {
                let fetch = Fetch {
                    pos: next_dispatch,
                    index: order[next_dispatch],
                    snapshot: snapshot.clone(),
                };
                match task_tx.try_send(fetch) {
                    Ok(()) => next_dispatch += 1,
                    Err(TrySendError::Full(_)) => break,
                    Err(TrySendError::Disconnected(_)) => break 'run,
                }
            }

            // Collect completions: one blocking wait so shutdown is still
            // noticed, then drain whatever else is ready.
            match done_rx.recv_timeout(params.poll_interval) {
                Ok(completion) => {
                    reorder.insert(completion.pos, completion.result);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break 'run,
            }
            while let Ok(completion) = done_rx.try_recv() {
                reorder.insert(completion.pos, completion.result);
            }

            // Deliver the contiguous prefix in dispatch order.
            while let Some(result) = reorder.remove(&next_deliver) {
                let slot = match result {
                    Ok(item) => Slot::Item(item),
                    Err(err) if params.isolated => {
                        // Error identity does not survive the isolated
                        // boundary; the consumer observes end-of-stream.
                        debug!(
                            pos = next_deliver,
                            kind = err.kind(),
                            "item failed on isolated substrate; ending stream"
                        );
                        break 'run;
                    }
                    Err(err) => Slot::Failed(err),
                };
                if !push_slot(&output_tx, slot, &shared, params.poll_interval) {
                    break 'run;
                }
                next_deliver += 1;
            }
        }

        if shared.is_shutdown() {
            break;
        }

        // Epoch complete: apply the mutation hook exactly once, then start
        // the next epoch with the refreshed state.
        canonical.end_epoch();
        epoch += 1;
        trace!(epoch, "epoch boundary applied");
    }
    // Dropping output_tx ends the stream once the queue drains.
}

fn dispatch_order(n: usize, shuffle: bool, seed: u64, epoch: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    if shuffle {
        // Fresh permutation each epoch, reproducible from the base seed.
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch));
        order.shuffle(&mut rng);
    }
    order
}
