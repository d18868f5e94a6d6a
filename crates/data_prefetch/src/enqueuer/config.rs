//! Configuration for enqueuer behaviour.
//!
//! Worker count and queue capacity are passed to `start()` rather than
//! carried here; the config holds the per-instance choices that shape how
//! the pool executes.
//!
//! Example:
//! ```ignore
//! let config = EnqueuerConfig::builder()
//!     .isolated_workers(true)
//!     .shuffle(true)
//!     .seed(42)
//!     .build();
//! ```

use std::time::Duration;

/// Configuration for an enqueuer instance.
#[derive(Clone, Debug)]
pub struct EnqueuerConfig {
    /// Run workers on the isolated substrate: no shared memory with the
    /// canonical source. Ordered workers operate on per-epoch snapshots;
    /// generator workers each own an independent copy of the generator
    /// (items may repeat across workers). Default: false (shared-memory
    /// threads).
    pub isolated_workers: bool,
    /// Dispatch each epoch in a fresh random permutation instead of identity
    /// order (OrderedEnqueuer only). Delivery tracks dispatch order either
    /// way.
    pub shuffle: bool,
    /// Base seed for per-epoch permutations. Epoch k shuffles with
    /// `seed + k`, so a fixed seed reproduces the full epoch schedule.
    /// A random seed is drawn at `start()` when unset.
    pub seed: Option<u64>,
    /// How often blocked workers and the coordinator re-check the shutdown
    /// flag. Not an error timeout, just a polling cadence. Default: 100ms.
    pub poll_interval: Duration,
}

impl Default for EnqueuerConfig {
    fn default() -> Self {
        Self {
            isolated_workers: false,
            shuffle: false,
            seed: None,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl EnqueuerConfig {
    pub fn builder() -> EnqueuerConfigBuilder {
        EnqueuerConfigBuilder::default()
    }
}

/// Builder for EnqueuerConfig with method chaining.
#[derive(Default)]
pub struct EnqueuerConfigBuilder {
    config: EnqueuerConfig,
}

impl EnqueuerConfigBuilder {
    /// Choose the isolated (no-shared-memory) worker substrate.
    pub fn isolated_workers(mut self, isolated: bool) -> Self {
        self.config.isolated_workers = isolated;
        self
    }

    /// Shuffle the dispatch order each epoch (OrderedEnqueuer only).
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Fix the base seed for reproducible epoch permutations.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Set the shutdown-flag polling cadence.
    ///
    /// - Too low: more responsive shutdown, higher idle CPU usage.
    /// - Too high: slower shutdown response.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn build(self) -> EnqueuerConfig {
        self.config
    }
}
