//! Background workers
//!
//! One thread per priority tier drains that tier's background queue. A
//! worker pops under the queue lock, steps the job with the lock released,
//! and parks on `work_ready` when its queue is empty or holds only
//! sleeping jobs.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{JobError, Result};
use crate::flags::AsyncPriority;
use crate::shared::{Lane, Shared, StepOutcome};

/// Longest a worker parks before re-checking its queue
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// A running worker thread
pub(crate) struct Worker {
    pub tier: AsyncPriority,
    thread: JoinHandle<()>,
    exited: Receiver<()>,
}

impl Worker {
    pub fn spawn(shared: Arc<Shared>, tier: AsyncPriority) -> Result<Self> {
        let (exit_tx, exited) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(format!("tempo-jobs-{}", tier.name()))
            .spawn(move || run(&shared, tier, exit_tx))
            .map_err(|e| JobError::WorkerSpawn(e.to_string()))?;

        tracing::debug!("Spawned {} priority job worker", tier.name());
        Ok(Self {
            tier,
            thread,
            exited,
        })
    }

    /// Wait until `deadline` for the worker to exit, then join it
    ///
    /// Returns false if the worker is still busy and was detached.
    pub fn join_until(self, deadline: Instant) -> bool {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.exited.recv_timeout(remaining) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    tracing::warn!("{} priority job worker panicked", self.tier.name());
                }
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "{} priority job worker did not stop in time, detaching it",
                    self.tier.name()
                );
                false
            }
        }
    }
}

fn run(shared: &Arc<Shared>, tier: AsyncPriority, exit_tx: Sender<()>) {
    // Consecutive pops that found a sleeping job
    let mut sleepers = 0usize;
    let mut earliest: Option<Instant> = None;

    loop {
        let id = {
            let mut state = shared.state.lock();
            if shared.shutting_down.load(Ordering::Acquire) {
                break;
            }
            let queued = state.queued(Lane::Background, tier);
            if queued > 0 && sleepers >= queued {
                // Full pass without a runnable job
                let wait = earliest
                    .map_or(IDLE_WAIT, |until| until.saturating_duration_since(Instant::now()))
                    .min(IDLE_WAIT);
                shared.work_ready.wait_for(&mut state, wait);
                sleepers = 0;
                earliest = None;
                continue;
            }
            match state.pop(Lane::Background, tier) {
                Some(id) => id,
                None => {
                    shared.work_ready.wait_for(&mut state, IDLE_WAIT);
                    continue;
                }
            }
        };

        match shared.run_step(id, false) {
            StepOutcome::Sleeping(until) => {
                sleepers += 1;
                earliest = Some(earliest.map_or(until, |e| e.min(until)));
            }
            StepOutcome::Stale => {}
            StepOutcome::Pending | StepOutcome::Finished => {
                sleepers = 0;
                earliest = None;
            }
        }
    }

    tracing::trace!("{} priority job worker exiting", tier.name());
    let _ = exit_tx.send(());
}
