//! The consumer-facing output stream.
//!
//! `ItemStream` is the lazy, pull-based handle returned by `get()`. It pops
//! the bounded Work Queue, blocking (in poll-interval slices, so shutdown and
//! crashes are noticed) while the pool is running and the queue is empty, and
//! terminating as soon as every producer handle has been dropped and the
//! queue is drained.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use super::pool::PoolShared;
use crate::error::{EnqueuerError, FetchError};

/// Blocking push into the Work Queue with cooperative cancellation.
///
/// Retries in poll-interval slices so a full queue exerts backpressure
/// without ever wedging shutdown. Returns false when the producer should
/// stop (shutdown signalled or the consumer side is gone).
pub(crate) fn push_slot<T>(
    sender: &Sender<Slot<T>>,
    slot: Slot<T>,
    shared: &PoolShared,
    poll_interval: Duration,
) -> bool {
    let mut pending = slot;
    loop {
        if shared.is_shutdown() {
            return false;
        }
        match sender.send_timeout(pending, poll_interval) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(slot)) => pending = slot,
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

/// Tagged per-item result pushed through the Work Queue.
///
/// All cross-worker communication uses this explicit variant instead of
/// transparent error marshalling, so failure identity survives the channel.
#[derive(Debug)]
pub(crate) enum Slot<T> {
    Item(T),
    Failed(FetchError),
}

/// Lazy stream of prefetched items.
///
/// Single-traversal: once it returns `None` it is finished for good; restart
/// by constructing a new enqueuer. A per-item failure is yielded as
/// `Err(EnqueuerError::Fetch)` in the failed item's place and the stream
/// continues. A worker crash is yielded once as `Err(WorkerCrash)` and ends
/// the stream.
pub struct ItemStream<T> {
    receiver: Receiver<Slot<T>>,
    shared: Arc<PoolShared>,
    poll_interval: Duration,
    crash_reported: bool,
    finished: bool,
}

impl<T> ItemStream<T> {
    pub(crate) fn new(
        receiver: Receiver<Slot<T>>,
        shared: Arc<PoolShared>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            receiver,
            shared,
            poll_interval,
            crash_reported: false,
            finished: false,
        }
    }

    fn report_crash(&mut self) -> Option<Result<T, EnqueuerError>> {
        self.crash_reported = true;
        self.finished = true;
        Some(Err(EnqueuerError::WorkerCrash))
    }
}

impl<T> Iterator for ItemStream<T> {
    type Item = Result<T, EnqueuerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            // Drain whatever is already queued before judging crash state, so
            // completed items are not lost behind a late panic.
            match self.receiver.try_recv() {
                Ok(Slot::Item(item)) => return Some(Ok(item)),
                Ok(Slot::Failed(err)) => return Some(Err(err.into())),
                Err(_) => {}
            }

            if self.shared.is_poisoned() && !self.crash_reported {
                return self.report_crash();
            }

            match self.receiver.recv_timeout(self.poll_interval) {
                Ok(Slot::Item(item)) => return Some(Ok(item)),
                Ok(Slot::Failed(err)) => return Some(Err(err.into())),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    if self.shared.is_poisoned() && !self.crash_reported {
                        return self.report_crash();
                    }
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}
