//! Delivery and lifecycle tests for GeneratorEnqueuer.
//!
//! Tests cover:
//! - Exactly-once delivery through a shared generator
//! - Independent replay on the isolated substrate
//! - Finite exhaustion, error propagation, panics
//! - Stop quiescence over an infinite generator

mod common;
use common::{CycleGenerator, FailingGenerator, FiniteGenerator, PanicGenerator};
use data_prefetch::{EnqueuerConfig, EnqueuerError, GeneratorEnqueuer};

use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

fn fast_poll() -> EnqueuerConfig {
    EnqueuerConfig::builder()
        .poll_interval(Duration::from_millis(10))
        .build()
}

fn isolated_fast_poll() -> EnqueuerConfig {
    EnqueuerConfig::builder()
        .isolated_workers(true)
        .poll_interval(Duration::from_millis(10))
        .build()
}

fn value_counts(items: &[usize]) -> HashMap<usize, usize> {
    let mut counts = HashMap::new();
    for &item in items {
        *counts.entry(item).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// 1. Delivery
// ============================================================================

#[test]
fn test_shared_generator_delivers_each_item_exactly_once() -> Result<()> {
    let mut enqueuer = GeneratorEnqueuer::new(FiniteGenerator::new(100), fast_poll());
    enqueuer.start(4, 10)?;

    let items: Vec<usize> = enqueuer
        .get()?
        .collect::<Result<_, EnqueuerError>>()?;
    enqueuer.stop(STOP_TIMEOUT)?;

    // No ordering guarantee, but the multiset is exact: all workers advance
    // the same underlying generator.
    assert_eq!(items.len(), 100);
    let counts = value_counts(&items);
    assert!((0..100).all(|v| counts.get(&v) == Some(&1)));
    Ok(())
}

#[test]
fn test_isolated_workers_each_replay_the_generator() -> Result<()> {
    let mut enqueuer = GeneratorEnqueuer::new(FiniteGenerator::new(10), isolated_fast_poll());
    enqueuer.start(3, 10)?;

    let items: Vec<usize> = enqueuer
        .get()?
        .collect::<Result<_, EnqueuerError>>()?;
    enqueuer.stop(STOP_TIMEOUT)?;

    // Each worker owns a clone starting from the same state, so every value
    // arrives once per worker.
    assert_eq!(items.len(), 30);
    let counts = value_counts(&items);
    assert!((0..10).all(|v| counts.get(&v) == Some(&3)));
    Ok(())
}

#[test]
fn test_infinite_generator_streams_on_demand() -> Result<()> {
    let mut enqueuer = GeneratorEnqueuer::new(CycleGenerator::new(7), fast_poll());
    enqueuer.start(2, 4)?;

    let items: Vec<usize> = enqueuer
        .get()?
        .take(50)
        .collect::<Result<_, EnqueuerError>>()?;
    assert_eq!(items.len(), 50);
    assert!(items.iter().all(|&v| v < 7));

    enqueuer.stop(STOP_TIMEOUT)?;
    Ok(())
}

// ============================================================================
// 2. Failure Handling
// ============================================================================

#[test]
fn test_generator_error_is_delivered_and_the_stream_continues() -> Result<()> {
    // Single worker keeps delivery deterministic.
    let mut enqueuer = GeneratorEnqueuer::new(FailingGenerator::new(5, 2), fast_poll());
    enqueuer.start(1, 4)?;

    let results: Vec<_> = enqueuer.get()?.collect();
    enqueuer.stop(STOP_TIMEOUT)?;

    assert_eq!(results.len(), 5);
    assert_eq!(*results[0].as_ref().unwrap(), 0);
    assert_eq!(*results[1].as_ref().unwrap(), 1);
    match &results[2] {
        Err(EnqueuerError::Fetch(e)) => assert_eq!(e.kind(), "fault"),
        other => panic!("expected a fetch failure, got {:?}", other),
    }
    assert_eq!(*results[3].as_ref().unwrap(), 3);
    assert_eq!(*results[4].as_ref().unwrap(), 4);
    Ok(())
}

#[test]
fn test_generator_error_propagates_on_isolated_substrate() -> Result<()> {
    // Unlike the ordered variant, failure identity survives isolation here:
    // each worker's clone fails independently and both failures surface.
    let mut enqueuer =
        GeneratorEnqueuer::new(FailingGenerator::new(5, 2), isolated_fast_poll());
    enqueuer.start(2, 4)?;

    let results: Vec<_> = enqueuer.get()?.collect();
    enqueuer.stop(STOP_TIMEOUT)?;

    assert_eq!(results.len(), 10);
    let failures = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(failures, 2);

    let oks: Vec<usize> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    let counts = value_counts(&oks);
    assert!([0usize, 1, 3, 4].iter().all(|v| counts.get(v) == Some(&2)));
    Ok(())
}

#[test]
fn test_generator_panic_surfaces_as_worker_crash() {
    let mut enqueuer = GeneratorEnqueuer::new(PanicGenerator::new(3), fast_poll());
    enqueuer.start(1, 4).unwrap();

    let results: Vec<_> = enqueuer.get().unwrap().collect();
    assert!(
        matches!(results.last(), Some(Err(EnqueuerError::WorkerCrash))),
        "stream should end with WorkerCrash, got {:?}",
        results.last()
    );

    assert!(matches!(
        enqueuer.stop(STOP_TIMEOUT),
        Err(EnqueuerError::WorkerCrash)
    ));
}

// ============================================================================
// 3. Lifecycle
// ============================================================================

#[test]
fn test_get_before_start_errors() {
    let enqueuer = GeneratorEnqueuer::new(CycleGenerator::new(3), fast_poll());
    assert!(matches!(enqueuer.get(), Err(EnqueuerError::NotStarted)));
}

#[test]
fn test_stop_quiesces_an_infinite_generator() -> Result<()> {
    let generator = FiniteGenerator::new(usize::MAX);
    let pull_count = generator.pull_count();
    let mut enqueuer = GeneratorEnqueuer::new(generator, fast_poll());
    enqueuer.start(3, 8)?;

    let consumed: Vec<_> = enqueuer.get()?.take(20).collect();
    assert_eq!(consumed.len(), 20);

    enqueuer.stop(STOP_TIMEOUT)?;
    assert!(!enqueuer.is_running());

    // Workers are gone: the generator is not advanced again.
    let after_stop = pull_count.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(pull_count.load(Ordering::SeqCst), after_stop);

    let leftover: Vec<_> = enqueuer.get()?.collect();
    assert!(leftover.is_empty());
    Ok(())
}
