//! Routine combinators
//!
//! Building blocks for composing routines without writing state machines
//! by hand: ordered sequences, timed delays, one-shot actions, and
//! concurrent groups that run children as chained fibers.

use smallvec::SmallVec;
use std::collections::VecDeque;

use crate::fiber::FiberHandle;
use crate::routine::{Routine, RoutineContext, Yield};

/// Wait for a number of scaled seconds
pub fn wait(seconds: f32) -> Wait {
    Wait {
        seconds,
        started: false,
    }
}

/// A timed wait as a routine
#[derive(Clone, Copy, Debug)]
pub struct Wait {
    seconds: f32,
    started: bool,
}

impl Routine for Wait {
    fn resume(&mut self, _cx: &mut RoutineContext<'_>) -> Yield {
        if self.started {
            return Yield::Done;
        }
        self.started = true;
        Yield::Wait(self.seconds)
    }
}

/// Run a closure once and finish
pub fn action<F: FnOnce() + 'static>(f: F) -> Action<F> {
    Action { f: Some(f) }
}

/// A one-shot closure as a routine
pub struct Action<F> {
    f: Option<F>,
}

impl<F: FnOnce()> Routine for Action<F> {
    fn resume(&mut self, _cx: &mut RoutineContext<'_>) -> Yield {
        if let Some(f) = self.f.take() {
            f();
        }
        Yield::Done
    }
}

/// Block until a predicate holds
pub fn wait_until<F: FnMut() -> bool + 'static>(predicate: F) -> WaitUntil<F> {
    WaitUntil { predicate }
}

/// A polled predicate as a routine
pub struct WaitUntil<F> {
    predicate: F,
}

impl<F: FnMut() -> bool> Routine for WaitUntil<F> {
    fn resume(&mut self, _cx: &mut RoutineContext<'_>) -> Yield {
        if (self.predicate)() {
            Yield::Done
        } else {
            Yield::Next
        }
    }
}

/// Run a closure after a delay
pub fn delay<F: FnOnce() + 'static>(seconds: f32, f: F) -> Sequence {
    Sequence::new().wait(seconds).then(action(f))
}

/// Routines run one after another
///
/// Each child is pushed onto the fiber's stack in turn, so nested waits
/// and calls inside a child behave exactly as if it were started alone.
#[derive(Default)]
pub struct Sequence {
    steps: VecDeque<Box<dyn Routine>>,
    name: Option<String>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a routine
    pub fn then(mut self, routine: impl Routine + 'static) -> Self {
        self.steps.push_back(Box::new(routine));
        self
    }

    /// Builder: append a timed wait
    pub fn wait(self, seconds: f32) -> Self {
        self.then(wait(seconds))
    }

    /// Builder: append a one-shot closure
    pub fn call(self, f: impl FnOnce() + 'static) -> Self {
        self.then(action(f))
    }

    /// Builder: append a predicate wait
    pub fn wait_until(self, predicate: impl FnMut() -> bool + 'static) -> Self {
        self.then(wait_until(predicate))
    }

    /// Builder: name the sequence for diagnostics
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Routine for Sequence {
    fn resume(&mut self, _cx: &mut RoutineContext<'_>) -> Yield {
        match self.steps.pop_front() {
            Some(step) => Yield::Call(step),
            None => Yield::Done,
        }
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JoinMode {
    All,
    Any,
}

/// Routines run concurrently as chained fibers
///
/// A combined routine finishes when all children have finished; a race
/// finishes as soon as one child does and stops the others.
pub struct Combine {
    pending: Vec<Box<dyn Routine>>,
    children: SmallVec<[FiberHandle; 4]>,
    mode: JoinMode,
}

impl Combine {
    /// Finish once every child has finished
    pub fn all() -> Self {
        Self {
            pending: Vec::new(),
            children: SmallVec::new(),
            mode: JoinMode::All,
        }
    }

    /// Finish once any child has finished
    pub fn race() -> Self {
        Self {
            mode: JoinMode::Any,
            ..Self::all()
        }
    }

    /// Builder: add a child routine
    pub fn with(mut self, routine: impl Routine + 'static) -> Self {
        self.pending.push(Box::new(routine));
        self
    }

    fn stop_children(&mut self, cx: &mut RoutineContext<'_>) {
        for child in self.children.drain(..) {
            cx.scheduler().stop(child);
        }
    }
}

impl Routine for Combine {
    fn resume(&mut self, cx: &mut RoutineContext<'_>) -> Yield {
        for routine in self.pending.drain(..) {
            let child = cx.chain(routine);
            self.children.push(child);
        }

        let mut finished = 0;
        for child in self.children.iter().copied() {
            if !cx.run_chained(child) {
                finished += 1;
            }
        }

        let done = match self.mode {
            JoinMode::All => finished == self.children.len(),
            JoinMode::Any => finished > 0 || self.children.is_empty(),
        };
        if done {
            self.stop_children(cx);
            Yield::Done
        } else {
            Yield::Next
        }
    }

    fn on_cancel(&mut self, cx: &mut RoutineContext<'_>) {
        self.stop_children(cx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{Scheduler, SchedulerConfig};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig::default())
    }

    #[test]
    fn test_sequence_runs_steps_in_order() {
        let mut scheduler = scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));

        let (a, b) = (log.clone(), log.clone());
        let handle = scheduler.start(
            Sequence::new()
                .call(move || a.borrow_mut().push("first"))
                .wait(1.0)
                .call(move || b.borrow_mut().push("second")),
        );

        assert_eq!(*log.borrow(), vec!["first"]);
        scheduler.update_with_delta(crate::Phase::Update, 0.5).unwrap();
        assert_eq!(*log.borrow(), vec!["first"]);
        scheduler.update_with_delta(crate::Phase::Update, 0.6).unwrap();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert!(!scheduler.is_running(handle));
    }

    #[test]
    fn test_delay_fires_once_after_wait() {
        let mut scheduler = scheduler();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        scheduler.start(delay(0.25, move || counter.set(counter.get() + 1)));

        scheduler.update_with_delta(crate::Phase::Update, 0.2).unwrap();
        assert_eq!(fired.get(), 0);
        scheduler.update_with_delta(crate::Phase::Update, 0.1).unwrap();
        assert_eq!(fired.get(), 1);
        scheduler.update_with_delta(crate::Phase::Update, 0.1).unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_combine_waits_for_all_children() {
        let mut scheduler = scheduler();
        let handle = scheduler.start(Combine::all().with(wait(1.0)).with(wait(2.0)));
        assert!(scheduler.is_running(handle));
        assert_eq!(scheduler.stats().chained, 2);

        scheduler.update_with_delta(crate::Phase::Update, 1.5).unwrap();
        assert!(scheduler.is_running(handle));
        assert_eq!(scheduler.stats().chained, 1);

        scheduler.update_with_delta(crate::Phase::Update, 1.0).unwrap();
        assert!(!scheduler.is_running(handle));
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_race_stops_losers() {
        let mut scheduler = scheduler();
        let stopped = Rc::new(Cell::new(false));
        let flag = stopped.clone();

        let handle = scheduler.start(Combine::race().with(wait(1.0)).with(wait(5.0)));
        // The slow child is the second chained fiber
        let slow = scheduler
            .snapshot()
            .into_iter()
            .filter(|s| s.chained)
            .max_by(|a, b| a.wait_remaining.total_cmp(&b.wait_remaining))
            .map(|s| s.handle)
            .unwrap();
        scheduler.on_stop(slow, move || flag.set(true));

        scheduler.update_with_delta(crate::Phase::Update, 1.1).unwrap();
        assert!(!scheduler.is_running(handle));
        assert!(stopped.get());
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_stopping_combine_stops_children() {
        let mut scheduler = scheduler();
        let handle = scheduler.start(Combine::all().with(wait(1.0)).with(wait(2.0)));
        assert_eq!(scheduler.active_count(), 3);

        scheduler.stop(handle);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_wait_until_polls_each_tick() {
        let mut scheduler = scheduler();
        let ready = Rc::new(Cell::new(false));
        let flag = ready.clone();
        let handle = scheduler.start(wait_until(move || flag.get()));

        scheduler.update_with_delta(crate::Phase::Update, 0.1).unwrap();
        assert!(scheduler.is_running(handle));
        ready.set(true);
        scheduler.update_with_delta(crate::Phase::Update, 0.1).unwrap();
        assert!(!scheduler.is_running(handle));
    }
}
