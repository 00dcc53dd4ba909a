//! Routines
//!
//! A routine is a resumable sequence of steps. Each call to
//! [`Routine::resume`] runs one step and returns a [`Yield`] telling the
//! owning fiber what to do next: wait, call a nested routine, block on
//! another fiber, and so on.
//!
//! Nested routines are pushed onto the fiber's explicit stack instead of
//! recursing, so any depth of nesting can be suspended between frames.

use std::fmt;

use crate::fiber::{FiberHandle, FiberOptions};
use crate::phase::YieldPhase;
use crate::scheduler::Scheduler;

/// A resumable sequence of steps driven by a fiber
pub trait Routine {
    /// Run one step
    fn resume(&mut self, cx: &mut RoutineContext<'_>) -> Yield;

    /// Called when the fiber is stopped while this routine is still on its stack
    ///
    /// Routines are cancelled top of stack first.
    fn on_cancel(&mut self, _cx: &mut RoutineContext<'_>) {}

    /// Display name used when the fiber is not explicitly named
    fn name(&self) -> Option<&str> {
        None
    }
}

impl<R: Routine + ?Sized> Routine for Box<R> {
    fn resume(&mut self, cx: &mut RoutineContext<'_>) -> Yield {
        (**self).resume(cx)
    }

    fn on_cancel(&mut self, cx: &mut RoutineContext<'_>) {
        (**self).on_cancel(cx)
    }

    fn name(&self) -> Option<&str> {
        (**self).name()
    }
}

/// What a routine step asks its fiber to do next
pub enum Yield {
    /// Resume again next tick
    Next,
    /// Resume after this many (scaled) seconds
    Wait(f32),
    /// Resume once the given fiber is no longer running
    WaitFor(FiberHandle),
    /// Resume once the predicate returns true (polled once per tick)
    WaitUntil(Box<dyn FnMut() -> bool>),
    /// Push a nested routine; this routine resumes after it finishes
    Call(Box<dyn Routine>),
    /// Resume at the next `Scheduler::yield_update` for this point
    WaitForPhase(YieldPhase),
    /// Apply a control command
    Command(Command),
    /// This routine is finished
    Done,
}

impl Yield {
    /// Call a nested routine
    pub fn call(routine: impl Routine + 'static) -> Self {
        Yield::Call(Box::new(routine))
    }

    /// Block until the predicate returns true
    pub fn wait_until(predicate: impl FnMut() -> bool + 'static) -> Self {
        Yield::WaitUntil(Box::new(predicate))
    }
}

impl From<f32> for Yield {
    fn from(seconds: f32) -> Self {
        Yield::Wait(seconds)
    }
}

impl From<FiberHandle> for Yield {
    fn from(handle: FiberHandle) -> Self {
        Yield::WaitFor(handle)
    }
}

impl From<Command> for Yield {
    fn from(command: Command) -> Self {
        Yield::Command(command)
    }
}

impl fmt::Debug for Yield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Yield::Next => write!(f, "Next"),
            Yield::Wait(secs) => write!(f, "Wait({secs})"),
            Yield::WaitFor(handle) => write!(f, "WaitFor({handle:?})"),
            Yield::WaitUntil(_) => write!(f, "WaitUntil(..)"),
            Yield::Call(routine) => write!(f, "Call({:?})", routine.name()),
            Yield::WaitForPhase(phase) => write!(f, "WaitForPhase({phase:?})"),
            Yield::Command(command) => write!(f, "Command({command:?})"),
            Yield::Done => write!(f, "Done"),
        }
    }
}

/// Control commands a routine can issue to its own fiber
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Pause the fiber; it stays paused until resumed through the scheduler
    Pause,
    /// Stop the fiber as if it were cancelled
    Stop,
    /// Resume again immediately, within the same tick
    Continue,
}

/// One entry of a fiber's explicit call stack
pub(crate) enum Frame {
    Routine(Box<dyn Routine>),
    WaitFor(FiberHandle),
    WaitUntil(Box<dyn FnMut() -> bool>),
}

impl Frame {
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Frame::Routine(_))
    }
}

/// Access handed to a routine while it runs
pub struct RoutineContext<'a> {
    scheduler: &'a mut Scheduler,
    handle: FiberHandle,
    delta: f32,
}

impl<'a> RoutineContext<'a> {
    pub(crate) fn new(scheduler: &'a mut Scheduler, handle: FiberHandle, delta: f32) -> Self {
        Self {
            scheduler,
            handle,
            delta,
        }
    }

    /// Scaled seconds this fiber advanced by this tick
    ///
    /// Only the first routine step of a tick receives the delta; routines
    /// resumed after it within the same tick (after a call, a finished
    /// child or `Command::Continue`) see zero.
    pub fn delta_time(&self) -> f32 {
        self.delta
    }

    /// Handle of the fiber running this routine
    pub fn handle(&self) -> FiberHandle {
        self.handle
    }

    /// Scaled seconds this fiber has been running
    pub fn elapsed(&self) -> f32 {
        self.scheduler.elapsed(self.handle).unwrap_or(0.0)
    }

    /// The scheduler running this fiber
    ///
    /// Updates requested through it while a tick is in progress are refused.
    pub fn scheduler(&mut self) -> &mut Scheduler {
        self.scheduler
    }

    /// Start an independent fiber
    pub fn start(&mut self, routine: impl Routine + 'static) -> FiberHandle {
        self.scheduler.start(routine)
    }

    /// Start an independent fiber with options
    pub fn start_with(&mut self, routine: impl Routine + 'static, options: FiberOptions) -> FiberHandle {
        self.scheduler.start_with(routine, options)
    }

    /// Create a chained fiber driven by this routine
    ///
    /// Chained fibers are not listed in any phase; they only advance when
    /// [`RoutineContext::run_chained`] is called, using this fiber's delta.
    pub fn chain(&mut self, routine: Box<dyn Routine>) -> FiberHandle {
        self.scheduler.chain(self.handle, routine)
    }

    /// Advance a chained fiber by this tick's delta
    ///
    /// Returns false once the chained fiber has finished or was stopped.
    pub fn run_chained(&mut self, handle: FiberHandle) -> bool {
        self.scheduler.run_fiber(handle, self.delta)
    }
}

/// A routine backed by a closure
pub struct FnRoutine<F> {
    f: F,
}

impl<F> Routine for FnRoutine<F>
where
    F: FnMut(&mut RoutineContext<'_>) -> Yield,
{
    fn resume(&mut self, cx: &mut RoutineContext<'_>) -> Yield {
        (self.f)(cx)
    }
}

/// Build a routine from a closure that runs one step per call
///
/// ```
/// use tempo_core::{routine, Scheduler, SchedulerConfig, Yield};
///
/// let mut scheduler = Scheduler::new(SchedulerConfig::default());
/// let mut step = 0;
/// let handle = scheduler.start(routine(move |_cx| {
///     step += 1;
///     if step == 1 { Yield::Wait(0.5) } else { Yield::Done }
/// }));
/// assert!(scheduler.is_running(handle));
/// ```
pub fn routine<F>(f: F) -> FnRoutine<F>
where
    F: FnMut(&mut RoutineContext<'_>) -> Yield,
{
    FnRoutine { f }
}
