use data_prefetch::{FetchError, Generator, Sequence};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Finite sequence over `1..=len`, scaled by 5 at each epoch boundary.
///
/// Epoch 0 yields `1, 2, ..., len`; epoch 1 yields `5, 10, ..., 5*len`; and
/// so on, which makes epoch-mutation visibility directly assertable.
#[derive(Clone)]
pub struct ScaledSequence {
    values: Vec<u64>,
    delay: Duration,
    fetch_count: Arc<AtomicUsize>,
}

impl ScaledSequence {
    pub fn new(len: usize) -> Self {
        Self {
            values: (1..=len as u64).collect(),
            delay: Duration::ZERO,
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep this long inside every `item()` call, to force workers to
    /// finish out of dispatch order.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared handle counting `item()` invocations across all clones.
    pub fn fetch_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetch_count)
    }
}

impl Sequence for ScaledSequence {
    type Item = u64;

    fn len(&self) -> usize {
        self.values.len()
    }

    fn item(&self, index: usize) -> Result<u64, FetchError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.values
            .get(index)
            .copied()
            .ok_or_else(|| FetchError::out_of_range(index, self.values.len()))
    }

    fn on_epoch_end(&mut self) {
        for value in &mut self.values {
            *value *= 5;
        }
    }
}

/// Sequence whose `item()` fails at one index and succeeds elsewhere.
#[derive(Clone)]
pub struct FaultSequence {
    len: usize,
    fail_at: usize,
}

impl FaultSequence {
    pub fn new(len: usize, fail_at: usize) -> Self {
        Self { len, fail_at }
    }
}

impl Sequence for FaultSequence {
    type Item = usize;

    fn len(&self) -> usize {
        self.len
    }

    fn item(&self, index: usize) -> Result<usize, FetchError> {
        if index == self.fail_at {
            Err(FetchError::new("fault", format!("injected at {}", index)))
        } else {
            Ok(index)
        }
    }
}

/// Sequence whose `item()` panics at one index, to exercise crash handling.
#[derive(Clone)]
pub struct PanicSequence {
    len: usize,
    panic_at: usize,
}

impl PanicSequence {
    pub fn new(len: usize, panic_at: usize) -> Self {
        Self { len, panic_at }
    }
}

impl Sequence for PanicSequence {
    type Item = usize;

    fn len(&self) -> usize {
        self.len
    }

    fn item(&self, index: usize) -> Result<usize, FetchError> {
        if index == self.panic_at {
            panic!("injected panic at {}", index);
        }
        Ok(index)
    }
}

/// Finite generator yielding `0..limit` once, counting advancement.
#[derive(Clone)]
pub struct FiniteGenerator {
    next: usize,
    limit: usize,
    pull_count: Arc<AtomicUsize>,
}

impl FiniteGenerator {
    pub fn new(limit: usize) -> Self {
        Self {
            next: 0,
            limit,
            pull_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counts successful pulls across this generator and all its clones.
    pub fn pull_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pull_count)
    }
}

impl Generator for FiniteGenerator {
    type Item = usize;

    fn next(&mut self) -> Option<Result<usize, FetchError>> {
        if self.next >= self.limit {
            return None;
        }
        let value = self.next;
        self.next += 1;
        self.pull_count.fetch_add(1, Ordering::SeqCst);
        Some(Ok(value))
    }
}

/// Infinite generator cycling through `0..period` forever.
#[derive(Clone)]
pub struct CycleGenerator {
    next: usize,
    period: usize,
}

impl CycleGenerator {
    pub fn new(period: usize) -> Self {
        Self { next: 0, period }
    }
}

impl Generator for CycleGenerator {
    type Item = usize;

    fn next(&mut self) -> Option<Result<usize, FetchError>> {
        let value = self.next % self.period;
        self.next += 1;
        Some(Ok(value))
    }
}

/// Finite generator that fails once, at `fail_at`, then keeps producing.
#[derive(Clone)]
pub struct FailingGenerator {
    next: usize,
    limit: usize,
    fail_at: usize,
}

impl FailingGenerator {
    pub fn new(limit: usize, fail_at: usize) -> Self {
        Self {
            next: 0,
            limit,
            fail_at,
        }
    }
}

impl Generator for FailingGenerator {
    type Item = usize;

    fn next(&mut self) -> Option<Result<usize, FetchError>> {
        if self.next >= self.limit {
            return None;
        }
        let value = self.next;
        self.next += 1;
        if value == self.fail_at {
            Some(Err(FetchError::new("fault", format!("injected at {}", value))))
        } else {
            Some(Ok(value))
        }
    }
}

/// Generator that panics after `panic_after` successful items.
#[derive(Clone)]
pub struct PanicGenerator {
    next: usize,
    panic_after: usize,
}

impl PanicGenerator {
    pub fn new(panic_after: usize) -> Self {
        Self {
            next: 0,
            panic_after,
        }
    }
}

impl Generator for PanicGenerator {
    type Item = usize;

    fn next(&mut self) -> Option<Result<usize, FetchError>> {
        if self.next >= self.panic_after {
            panic!("injected panic after {} items", self.panic_after);
        }
        let value = self.next;
        self.next += 1;
        Some(Ok(value))
    }
}
