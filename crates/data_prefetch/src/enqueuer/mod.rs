//! Prefetching enqueuers.
//!
//! An enqueuer decouples a slow, possibly blocking item producer from a
//! single consumer by running a pool of parallel workers that compute items
//! ahead of demand into a bounded queue.
//!
//! # Architecture Overview
//!
//! ```text
//!            ┌────────────────────┐
//!            │ Sequence/Generator │  (caller-provided capability)
//!            └─────────┬──────────┘
//!                      │ items / item errors
//!                      ↓
//!              [ Worker Pool ]  ←──── EnqueuerConfig (substrate, shuffle, seed)
//!                      │
//!                      │ Slot { Item | Failed }
//!                      ↓
//!   (Ordered only) [ Epoch Coordinator ]   reorder buffer, on_epoch_end()
//!                      │
//!                      ↓
//!              [ Work Queue ]   bounded crossbeam channel, capacity = Q
//!                      │
//!                      ↓
//!               [ ItemStream ]  lazy pull-based consumer iterator
//! ```
//!
//! Two specializations exist:
//! - [`OrderedEnqueuer`] preserves strict delivery order over a finite,
//!   randomly-indexable [`Sequence`](crate::source::Sequence) and cycles
//!   epochs, applying the sequence's mutation hook exactly once per boundary.
//! - [`GeneratorEnqueuer`] wraps an arbitrary
//!   [`Generator`](crate::source::Generator) with no ordering guarantee.
//!
//! # Module Structure
//!
//! ```text
//! src/enqueuer/
//! ├── mod.rs          # Architecture docs + public re-exports
//! ├── config.rs       # EnqueuerConfig, builder
//! ├── pool.rs         # WorkerPool: spawn, shutdown flag, panic poisoning
//! ├── stream.rs       # Slot result type + ItemStream consumer iterator
//! ├── lifecycle.rs    # Created→Running→Stopped state machine (both variants)
//! ├── ordered.rs      # OrderedEnqueuer + epoch coordinator
//! └── generator.rs    # GeneratorEnqueuer
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! let config = EnqueuerConfig::builder().shuffle(true).seed(42).build();
//! let mut enqueuer = OrderedEnqueuer::new(my_sequence, config);
//! enqueuer.start(4, 16)?;
//! for item in enqueuer.get()?.take(100) {
//!     let item = item?;
//!     // ...
//! }
//! enqueuer.stop(Duration::from_secs(5))?;
//! ```
//!
//! # Concurrency notes
//!
//! - The bounded Work Queue is the only multi-writer resource; producers
//!   block when it is full (backpressure) and the consumer blocks while it is
//!   empty and the pool is running.
//! - Cancellation is cooperative: workers and the coordinator check a shared
//!   shutdown flag between items. `stop(timeout)` abandons threads that do
//!   not yield within the grace period.
//! - A worker panic poisons the pool; the next `get()`, stream pull, or
//!   `stop()` surfaces [`EnqueuerError::WorkerCrash`](crate::error::EnqueuerError).
//! - Distinct enqueuer instances share nothing and progress independently.

mod config;
mod generator;
mod lifecycle;
mod ordered;
mod pool;
mod stream;

pub use config::{EnqueuerConfig, EnqueuerConfigBuilder};
pub use generator::GeneratorEnqueuer;
pub use ordered::OrderedEnqueuer;
pub use stream::ItemStream;
