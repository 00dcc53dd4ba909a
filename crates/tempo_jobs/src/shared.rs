//! State shared between the scheduler, its workers and async handles
//!
//! Everything lives behind one queue-level lock. A job's step is checked
//! out of its slot while it runs, so the lock is never held across user
//! code and cancellation can land mid-step (it is observed when the step
//! returns).

use parking_lot::{Condvar, Mutex};
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::dispatcher::Dispatcher;
use crate::flags::{AsyncFlags, AsyncPriority, TIER_COUNT};
use crate::handle::AsyncHandle;
use crate::job::{JobContext, JobId, JobStep, JobUnit, JobYield, MainCallback};

/// Panic reporting hook
pub type PanicHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Which queue family a job waits in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lane {
    Background,
    MainThread,
}

impl Lane {
    fn of(flags: AsyncFlags) -> Self {
        if flags.is_main_thread_only() {
            Lane::MainThread
        } else {
            Lane::Background
        }
    }
}

pub(crate) struct State {
    pub units: SlotMap<JobId, JobUnit>,
    background: [VecDeque<JobId>; TIER_COUNT],
    main_thread: [VecDeque<JobId>; TIER_COUNT],
}

impl State {
    fn queue(&mut self, lane: Lane, tier: AsyncPriority) -> &mut VecDeque<JobId> {
        match lane {
            Lane::Background => &mut self.background[tier.index()],
            Lane::MainThread => &mut self.main_thread[tier.index()],
        }
    }

    pub fn queued(&self, lane: Lane, tier: AsyncPriority) -> usize {
        match lane {
            Lane::Background => self.background[tier.index()].len(),
            Lane::MainThread => self.main_thread[tier.index()].len(),
        }
    }

    pub fn pop(&mut self, lane: Lane, tier: AsyncPriority) -> Option<JobId> {
        self.queue(lane, tier).pop_front()
    }

    fn enqueue(&mut self, id: JobId) {
        if let Some(unit) = self.units.get(id) {
            let (lane, tier) = (Lane::of(unit.flags), unit.flags.priority());
            self.queue(lane, tier).push_back(id);
        }
    }

    /// Remove a job and hand back its callbacks for the given outcome
    fn dispose(&mut self, id: JobId, completed: bool) -> SmallVec<[MainCallback; 1]> {
        let Some(unit) = self.units.remove(id) else {
            return SmallVec::new();
        };
        if let Some(parent) = unit.parent.and_then(|p| self.units.get_mut(p)) {
            parent.children.retain(|child| *child != id);
        }
        if completed {
            unit.on_complete
        } else {
            unit.on_stop
        }
    }

    /// Cancel a job and, transitively, every child it scheduled
    ///
    /// Jobs that are mid-step are only flagged and disposed when their
    /// step returns; the rest are removed at once. Their stale queue
    /// entries are skipped when popped.
    fn cancel_tree(&mut self, root: JobId, callbacks: &mut Vec<MainCallback>) -> bool {
        if !self.units.contains_key(root) {
            return false;
        }
        let mut pending: SmallVec<[JobId; 8]> = SmallVec::new();
        pending.push(root);

        while let Some(id) = pending.pop() {
            let Some(unit) = self.units.get_mut(id) else {
                continue;
            };
            pending.extend(unit.children.iter().copied());
            if unit.cancelled {
                continue;
            }
            unit.cancelled = true;
            if !unit.executing {
                callbacks.extend(self.dispose(id, false));
            }
        }
        true
    }
}

/// Result of trying to step one popped job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// The id no longer names a live job
    Stale,
    /// The job is asleep; requeued untouched
    Sleeping(Instant),
    /// One step ran and the job was requeued
    Pending,
    /// The job finished, was cancelled or panicked
    Finished,
}

pub(crate) struct Shared {
    pub state: Mutex<State>,
    /// Signalled when work is queued or shutdown starts
    pub work_ready: Condvar,
    pub dispatcher: Dispatcher,
    pub shutting_down: AtomicBool,
    pub panic_hook: Option<PanicHook>,
}

impl Shared {
    pub fn new(capacity: usize, panic_hook: Option<PanicHook>) -> Self {
        Self {
            state: Mutex::new(State {
                units: SlotMap::with_capacity_and_key(capacity),
                background: Default::default(),
                main_thread: Default::default(),
            }),
            work_ready: Condvar::new(),
            dispatcher: Dispatcher::new(),
            shutting_down: AtomicBool::new(false),
            panic_hook,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Register a job and queue it in its tier
    ///
    /// A child whose parent is gone or cancelled is never registered; its
    /// handle reports not-running from the start.
    pub fn insert(self: &Arc<Self>, job: Box<dyn JobStep>, flags: AsyncFlags, parent: Option<JobId>) -> AsyncHandle {
        let mut state = self.state.lock();
        if let Some(parent) = parent {
            match state.units.get(parent) {
                Some(unit) if !unit.cancelled => {}
                _ => {
                    tracing::debug!("Dropping child job of cancelled parent {:?}", parent);
                    return AsyncHandle::new(Arc::downgrade(self), JobId::default());
                }
            }
        }

        let id = state.units.insert(JobUnit::new(job, flags, parent));
        if let Some(unit) = parent.and_then(|p| state.units.get_mut(p)) {
            unit.children.push(id);
        }
        state.enqueue(id);
        drop(state);

        tracing::trace!("Queued job {:?} ({:?})", id, flags);
        self.work_ready.notify_all();
        AsyncHandle::new(Arc::downgrade(self), id)
    }

    pub fn is_running(&self, id: JobId) -> bool {
        self.state
            .lock()
            .units
            .get(id)
            .is_some_and(|unit| !unit.cancelled)
    }

    pub fn is_cancelled(&self, id: JobId) -> bool {
        self.state
            .lock()
            .units
            .get(id)
            .map_or(true, |unit| unit.cancelled)
    }

    pub fn cancel(&self, id: JobId) -> bool {
        let mut callbacks = Vec::new();
        let found = self.state.lock().cancel_tree(id, &mut callbacks);
        if !callbacks.is_empty() {
            self.dispatcher.extend(callbacks);
        }
        found
    }

    /// Cancel every registered job
    pub fn cancel_all(&self) -> usize {
        let mut callbacks = Vec::new();
        let mut state = self.state.lock();
        let ids: Vec<JobId> = state.units.keys().collect();
        let count = ids.len();
        for id in ids {
            state.cancel_tree(id, &mut callbacks);
        }
        drop(state);
        self.dispatcher.extend(callbacks);
        count
    }

    /// Run one step of `id`
    ///
    /// The lock is held only to check the job out and back in.
    pub fn run_step(self: &Arc<Self>, id: JobId, main_thread: bool) -> StepOutcome {
        let now = Instant::now();
        let mut step = {
            let mut state = self.state.lock();
            let Some(unit) = state.units.get_mut(id) else {
                return StepOutcome::Stale;
            };
            if unit.cancelled {
                return StepOutcome::Stale;
            }
            if let Some(until) = unit.sleep_until {
                if until > now {
                    state.enqueue(id);
                    return StepOutcome::Sleeping(until);
                }
            }
            unit.sleep_until = None;
            let Some(step) = unit.step.take() else {
                return StepOutcome::Stale;
            };
            unit.executing = true;
            step
        };

        let mut cx = JobContext::new(self, id, main_thread);
        let result = catch_unwind(AssertUnwindSafe(|| step.step(&mut cx)));

        let mut state = self.state.lock();
        let Some(unit) = state.units.get_mut(id) else {
            return StepOutcome::Finished;
        };
        unit.executing = false;
        unit.step = Some(step);

        let (completed, message) = match result {
            Ok(_) if unit.cancelled => (false, None),
            Ok(JobYield::Continue) => {
                state.enqueue(id);
                return StepOutcome::Pending;
            }
            Ok(JobYield::Sleep(duration)) => {
                unit.sleep_until = Some(Instant::now() + duration);
                state.enqueue(id);
                return StepOutcome::Pending;
            }
            Ok(JobYield::Done) => (true, None),
            Err(payload) => (false, Some(panic_message(payload.as_ref()))),
        };

        let callbacks = state.dispose(id, completed);
        drop(state);
        self.dispatcher.extend(callbacks);

        if let Some(message) = message {
            tracing::error!("Job {:?} panicked: {}", id, message);
            self.report_panic(&message);
        } else {
            tracing::trace!(
                "Job {:?} {}",
                id,
                if completed { "completed" } else { "stopped" }
            );
        }
        StepOutcome::Finished
    }

    pub fn report_panic(&self, message: &str) {
        if let Some(hook) = &self.panic_hook {
            hook(message);
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
