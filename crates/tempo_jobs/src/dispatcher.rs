//! Main-thread dispatcher
//!
//! Worker threads never run user callbacks themselves. Completion and stop
//! callbacks are queued here under a lock and drained by
//! `JobScheduler::update` on the thread that owns the scheduler.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::job::MainCallback;
use crate::shared::panic_message;

#[derive(Default)]
pub(crate) struct Dispatcher {
    queue: Mutex<VecDeque<MainCallback>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&self, callbacks: impl IntoIterator<Item = MainCallback>) {
        self.queue.lock().extend(callbacks);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run every queued callback; returns how many ran
    ///
    /// The queue is swapped out before running, so callbacks that queue
    /// more work are picked up by the next drain. Panicking callbacks are
    /// reported to `on_panic` and do not stop the drain.
    pub fn drain(&self, on_panic: impl Fn(&str)) -> usize {
        let batch = std::mem::take(&mut *self.queue.lock());
        let count = batch.len();
        for callback in batch {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
                on_panic(&panic_message(payload.as_ref()));
            }
        }
        count
    }
}
