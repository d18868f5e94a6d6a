//! Data source capabilities consumed by the enqueuers.
//!
//! Two contracts cover the two kinds of producers:
//! - `Sequence`: finite, randomly-indexable, with an epoch-boundary mutation
//!   hook. The `OrderedEnqueuer` owns the canonical instance and hands
//!   workers read-only views valid for one epoch.
//! - `Generator`: sequential-only, possibly infinite, not inherently safe for
//!   concurrent advancement. `SharedGenerator` makes one instance shareable
//!   by serializing calls to `next()`.

use crate::error::FetchError;
use std::sync::{Arc, Mutex};

/// A finite, randomly-indexable data source with mutable internal state.
///
/// The length is fixed for the duration of an epoch. `item(i)` must be valid
/// for `i` in `[0, len())` and is called concurrently from worker threads, so
/// it takes `&self`. State mutation is only supported at epoch boundaries,
/// through `on_epoch_end()`, which the coordinator invokes exactly once per
/// completed epoch on the canonical instance.
pub trait Sequence: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Number of items per epoch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Computes the item at `index`. May block (I/O, decoding).
    fn item(&self, index: usize) -> Result<Self::Item, FetchError>;

    /// Epoch-boundary mutation hook. Runs between epochs with exclusive
    /// access; its effect is visible to every item of the next epoch.
    fn on_epoch_end(&mut self) {}
}

/// A stateful, possibly-infinite data source exposing only sequential
/// advancement.
///
/// Mirrors `Iterator`: `None` signals exhaustion (the normal end of a finite
/// source, not an error), `Some(Err(_))` a genuine per-item failure.
pub trait Generator: Send + 'static {
    type Item: Send + 'static;

    fn next(&mut self) -> Option<Result<Self::Item, FetchError>>;
}

/// Makes a single generator instance safe for concurrent advancement by
/// serializing calls to `next()` behind a mutex.
///
/// Only *advancement* is serialized: each produced item is emitted exactly
/// once, but any CPU-bound work the workers do after pulling an item still
/// runs in parallel. Cloning shares the same underlying generator.
pub struct SharedGenerator<G> {
    inner: Arc<Mutex<G>>,
}

impl<G> SharedGenerator<G> {
    pub fn new(generator: G) -> Self {
        Self {
            inner: Arc::new(Mutex::new(generator)),
        }
    }
}

impl<G> Clone for SharedGenerator<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: Generator> Generator for SharedGenerator<G> {
    type Item = G::Item;

    fn next(&mut self) -> Option<Result<G::Item, FetchError>> {
        // A panic inside a previous `next()` poisons the mutex; the generator
        // state is still coherent enough to keep draining, so recover it.
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.next()
    }
}
