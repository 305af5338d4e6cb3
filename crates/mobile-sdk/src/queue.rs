//! Deferred action queue — operations submitted before identification
//! completes, replayed in FIFO order once it succeeds.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

struct QueueState<A> {
    pending: Vec<A>,
    draining: bool,
}

/// FIFO replay list. Actions enqueued while a drain is running are picked up
/// by a later cycle of that same drain, after the current batch finishes.
pub struct DeferredActionQueue<A> {
    state: Mutex<QueueState<A>>,
}

impl<A> DeferredActionQueue<A> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: Vec::new(),
                draining: false,
            }),
        }
    }

    pub fn enqueue(&self, action: A) {
        let mut state = self.state.lock();
        state.pending.push(action);
        debug!(pending = state.pending.len(), "deferred action queued");
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `action` unless `ready` is set and no drain is running, in which
    /// case it is handed back for immediate execution. The check and the
    /// enqueue happen under one lock.
    pub fn defer_unless_ready(&self, action: A, ready: bool) -> Option<A> {
        let mut state = self.state.lock();
        if ready && !state.draining {
            return Some(action);
        }
        state.pending.push(action);
        debug!(pending = state.pending.len(), "deferred action queued");
        None
    }

    /// Claim the queue for draining. Returns `None` if a drain is already
    /// in progress; that drain will pick up anything enqueued meanwhile.
    pub fn start_drain(&self) -> Option<Drain<'_, A>> {
        let mut state = self.state.lock();
        if state.draining {
            return None;
        }
        state.draining = true;
        Some(Drain {
            queue: self,
            finished: false,
        })
    }

    /// Run every pending action in order. Shorthand for
    /// [`start_drain`](Self::start_drain) followed by [`Drain::run`].
    pub fn drain(&self, run: impl FnMut(A)) -> usize {
        self.start_drain().map(|drain| drain.run(run)).unwrap_or(0)
    }
}

/// An in-progress drain. While it exists, new actions are queued rather
/// than run directly.
pub struct Drain<'q, A> {
    queue: &'q DeferredActionQueue<A>,
    finished: bool,
}

impl<A> Drain<'_, A> {
    /// Swap out the pending batch and run each action in order, repeating
    /// until nothing new was enqueued. The lock is not held while `run`
    /// executes. An action that panics is logged and the rest of the batch
    /// still runs. Returns the total number of actions run.
    pub fn run(mut self, mut run: impl FnMut(A)) -> usize {
        let mut total = 0;
        let mut cycle = 0;
        loop {
            let batch = {
                let mut state = self.queue.state.lock();
                let batch = std::mem::take(&mut state.pending);
                if batch.is_empty() {
                    state.draining = false;
                    self.finished = true;
                    break;
                }
                batch
            };

            cycle += 1;
            debug!(cycle, actions = batch.len(), "draining deferred actions");
            for action in batch {
                if catch_unwind(AssertUnwindSafe(|| run(action))).is_err() {
                    warn!(cycle, "deferred action panicked");
                }
                total += 1;
            }
        }
        total
    }
}

impl<A> Drop for Drain<'_, A> {
    fn drop(&mut self) {
        // Release the claim if `run` never completed (not called, or unwound).
        if !self.finished {
            self.queue.state.lock().draining = false;
        }
    }
}

impl<A> Default for DeferredActionQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}
