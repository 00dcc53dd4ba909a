//! Frame scheduler
//!
//! Owns the fiber table and drives it once per phase tick. The host calls
//! [`Scheduler::update`] for each phase of its frame loop (or
//! [`Scheduler::update_with_delta`] to substitute its own delta), and
//! [`Scheduler::manual_update`] for fibers in [`Phase::Manual`].
//!
//! Each tick snapshots the global time scale, commits queued group changes,
//! then resumes every fiber of the phase in ascending priority. Fibers are
//! strictly cooperative and run on the calling thread.

use smallvec::SmallVec;
use std::any::Any;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::error::{Result, SchedulerError};
use crate::fiber::{Callback, Fiber, FiberFlags, FiberHandle, FiberOptions};
use crate::group::{GroupMask, GroupState};
use crate::phase::{Phase, YieldPhase, PHASE_COUNT, YIELD_PHASE_COUNT};
use crate::routine::{Command, Frame, Routine, RoutineContext, Yield};
use crate::stats::{FiberSnapshot, SchedulerStats};
use crate::table::{FiberTable, DEFAULT_CAPACITY};

/// Source of per-phase frame delta times
pub trait FrameClock {
    /// Seconds elapsed since the previous tick of `phase`
    fn delta_time(&mut self, phase: Phase) -> f32;
}

/// Wall-clock frame timing
#[derive(Debug)]
pub struct SystemClock {
    last: [Option<Instant>; PHASE_COUNT],
    fixed_step: Option<f32>,
    max_delta: f32,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            last: [None; PHASE_COUNT],
            fixed_step: None,
            max_delta: 0.25,
        }
    }

    /// Report a constant step for `Phase::FixedUpdate`
    pub fn with_fixed_step(mut self, step: f32) -> Self {
        self.fixed_step = Some(step);
        self
    }

    /// Clamp long frames (e.g. after a debugger break) to this many seconds
    pub fn with_max_delta(mut self, max_delta: f32) -> Self {
        self.max_delta = max_delta;
        self
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for SystemClock {
    fn delta_time(&mut self, phase: Phase) -> f32 {
        if phase == Phase::FixedUpdate {
            if let Some(step) = self.fixed_step {
                return step;
            }
        }

        let now = Instant::now();
        let slot = &mut self.last[phase.index()];
        let delta = slot.map_or(0.0, |last| (now - last).as_secs_f32());
        *slot = Some(now);
        delta.min(self.max_delta)
    }
}

/// A clock that reports the same delta for every tick
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub f32);

impl FrameClock for FixedClock {
    fn delta_time(&mut self, _phase: Phase) -> f32 {
        self.0
    }
}

/// Scheduler configuration
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Initial number of fiber slots
    pub initial_capacity: usize,
    /// Phase used when a fiber is started without one
    pub default_phase: Phase,
    /// Run a fiber's first step as soon as it is started
    pub immediate_start: bool,
    /// Convert panics inside routine steps into fiber termination
    pub catch_panics: bool,
    /// Upper bound on steps a fiber may take within one tick
    pub max_steps_per_tick: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            default_phase: Phase::Update,
            immediate_start: true,
            catch_panics: true,
            max_steps_per_tick: 256,
        }
    }
}

impl SchedulerConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_default_phase(mut self, phase: Phase) -> Self {
        self.default_phase = phase;
        self
    }

    pub fn with_immediate_start(mut self, immediate: bool) -> Self {
        self.immediate_start = immediate;
        self
    }

    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }

    pub fn with_max_steps_per_tick(mut self, steps: usize) -> Self {
        self.max_steps_per_tick = steps.max(1);
        self
    }
}

/// How a fiber's execution ended this tick
#[derive(Debug, PartialEq)]
enum Outcome {
    Pending,
    Completed,
    Stopped,
    Panicked(String),
}

type PanicHook = Box<dyn FnMut(FiberHandle, &str)>;

/// The cooperative fiber scheduler
pub struct Scheduler {
    config: SchedulerConfig,
    table: FiberTable,
    groups: GroupState,
    clock: Box<dyn FrameClock>,
    time_scale: f32,
    paused: bool,
    updating: bool,
    yield_waiters: [Vec<FiberHandle>; YIELD_PHASE_COUNT],
    scratch: Vec<FiberHandle>,
    frame: u64,
    last_tick: [Duration; PHASE_COUNT],
    shutdown_requested: bool,
    shut_down: bool,
    panic_hook: Option<PanicHook>,
}

impl Scheduler {
    /// Create a scheduler driven by the wall clock
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock::new()))
    }

    /// Create a scheduler driven by a custom frame clock
    pub fn with_clock(config: SchedulerConfig, clock: Box<dyn FrameClock>) -> Self {
        tracing::debug!(
            "Creating scheduler with {} fiber slots",
            config.initial_capacity
        );
        Self {
            table: FiberTable::with_capacity(config.initial_capacity),
            config,
            groups: GroupState::new(),
            clock,
            time_scale: 1.0,
            paused: false,
            updating: false,
            yield_waiters: Default::default(),
            scratch: Vec::new(),
            frame: 0,
            last_tick: [Duration::ZERO; PHASE_COUNT],
            shutdown_requested: false,
            shut_down: false,
            panic_hook: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // ========================================================================
    // Starting fibers
    // ========================================================================

    /// Start a routine in the default phase
    pub fn start(&mut self, routine: impl Routine + 'static) -> FiberHandle {
        self.start_with(routine, FiberOptions::default())
    }

    /// Start a routine with explicit options
    ///
    /// Returns a null handle once the scheduler is shut down.
    pub fn start_with(&mut self, routine: impl Routine + 'static, options: FiberOptions) -> FiberHandle {
        if self.shut_down || self.shutdown_requested {
            tracing::warn!("Ignoring fiber start after scheduler shutdown");
            return FiberHandle::default();
        }

        let phase = options.phase.unwrap_or(self.config.default_phase);
        let fiber = Fiber::new(Box::new(routine), options, phase, false);
        let handle = self.table.allocate(fiber);
        tracing::debug!(
            "Started fiber {:?} ({:?}) in {:?}",
            handle,
            self.name(handle),
            phase
        );

        if self.config.immediate_start {
            self.run_fiber(handle, 0.0);
        }
        handle
    }

    /// Allocate a chained fiber that only advances when its parent runs it
    pub(crate) fn chain(&mut self, parent: FiberHandle, routine: Box<dyn Routine>) -> FiberHandle {
        if self.shut_down {
            return FiberHandle::default();
        }
        let phase = self
            .table
            .get(parent)
            .map_or(self.config.default_phase, |p| p.phase);
        let fiber = Fiber::new(routine, FiberOptions::default(), phase, true);
        self.table.allocate(fiber)
    }

    // ========================================================================
    // Handle operations
    // ========================================================================

    /// Whether the fiber is live and has not been asked to stop
    pub fn is_running(&self, handle: FiberHandle) -> bool {
        self.table
            .get(handle)
            .is_some_and(|f| !f.flags.contains(FiberFlags::STOPPING))
    }

    pub fn is_paused(&self, handle: FiberHandle) -> bool {
        self.table
            .get(handle)
            .is_some_and(|f| f.flags.contains(FiberFlags::PAUSED))
    }

    pub fn pause(&mut self, handle: FiberHandle) -> bool {
        self.set_flag(handle, FiberFlags::PAUSED, true)
    }

    pub fn resume(&mut self, handle: FiberHandle) -> bool {
        self.set_flag(handle, FiberFlags::PAUSED, false)
    }

    /// Stop a fiber, firing its on-stop callbacks
    ///
    /// A fiber stopped while it is executing finishes its current step first.
    pub fn stop(&mut self, handle: FiberHandle) -> bool {
        if !self.table.contains(handle) {
            return false;
        }
        self.dispose(handle, Outcome::Stopped);
        true
    }

    pub fn priority(&self, handle: FiberHandle) -> Option<i32> {
        self.table.get(handle).map(|f| f.priority)
    }

    /// Change a fiber's priority; ordering updates from the next tick
    pub fn set_priority(&mut self, handle: FiberHandle, priority: i32) -> bool {
        self.table.set_priority(handle, priority)
    }

    pub fn phase(&self, handle: FiberHandle) -> Option<Phase> {
        self.table.get(handle).map(|f| f.phase)
    }

    pub fn set_phase(&mut self, handle: FiberHandle, phase: Phase) -> bool {
        self.table.set_phase(handle, phase)
    }

    pub fn fiber_time_scale(&self, handle: FiberHandle) -> Option<f32> {
        self.table.get(handle).map(|f| f.time_scale)
    }

    pub fn set_fiber_time_scale(&mut self, handle: FiberHandle, scale: f32) -> bool {
        match self.table.get_mut(handle) {
            Some(fiber) => {
                fiber.time_scale = scale;
                true
            }
            None => false,
        }
    }

    pub fn group(&self, handle: FiberHandle) -> Option<GroupMask> {
        self.table.get(handle).map(|f| f.group)
    }

    pub fn set_group(&mut self, handle: FiberHandle, group: GroupMask) -> bool {
        match self.table.get_mut(handle) {
            Some(fiber) => {
                fiber.group = group;
                true
            }
            None => false,
        }
    }

    pub fn name(&self, handle: FiberHandle) -> Option<&str> {
        self.table.get(handle).and_then(|f| f.name.as_deref())
    }

    pub fn set_name(&mut self, handle: FiberHandle, name: impl Into<String>) -> bool {
        match self.table.get_mut(handle) {
            Some(fiber) => {
                fiber.name = Some(name.into());
                true
            }
            None => false,
        }
    }

    /// Scaled seconds the fiber has been running
    pub fn elapsed(&self, handle: FiberHandle) -> Option<f32> {
        self.table.get(handle).map(|f| f.elapsed)
    }

    /// Register a callback for natural completion
    ///
    /// Returns false (and drops the callback) if the handle is stale.
    pub fn on_complete(&mut self, handle: FiberHandle, callback: impl FnOnce() + 'static) -> bool {
        match self.table.get_mut(handle) {
            Some(fiber) => {
                fiber.on_complete.push(Box::new(callback));
                true
            }
            None => false,
        }
    }

    /// Register a callback for cancellation
    pub fn on_stop(&mut self, handle: FiberHandle, callback: impl FnOnce() + 'static) -> bool {
        match self.table.get_mut(handle) {
            Some(fiber) => {
                fiber.on_stop.push(Box::new(callback));
                true
            }
            None => false,
        }
    }

    fn set_flag(&mut self, handle: FiberHandle, flag: FiberFlags, value: bool) -> bool {
        match self.table.get_mut(handle) {
            Some(fiber) => {
                fiber.flags.set(flag, value);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Global and group state
    // ========================================================================

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Set the global time scale; takes effect at the next tick
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn pause_all(&mut self) {
        self.paused = true;
    }

    pub fn resume_all(&mut self) {
        self.paused = false;
    }

    pub fn is_paused_all(&self) -> bool {
        self.paused
    }

    /// Queue a pause of every group in `mask`
    pub fn pause_group(&mut self, mask: GroupMask) {
        self.groups.queue_pause(mask);
    }

    /// Queue a resume of every group in `mask`
    pub fn resume_group(&mut self, mask: GroupMask) {
        self.groups.queue_resume(mask);
    }

    /// Queue a time scale change for one group
    pub fn set_group_time_scale(&mut self, index: usize, scale: f32) {
        self.groups.queue_time_scale(index, scale);
    }

    pub fn reset_group_time_scales(&mut self) {
        self.groups.queue_reset_time_scales();
    }

    /// Whether any group in `mask` is paused (committed state)
    pub fn is_group_paused(&self, mask: GroupMask) -> bool {
        self.groups.is_paused(mask)
    }

    /// Committed time scale of one group
    pub fn group_time_scale(&self, index: usize) -> f32 {
        self.groups.scale_of(index)
    }

    /// Stop every fiber
    pub fn stop_all(&mut self) {
        for handle in self.table.handles() {
            self.dispose(handle, Outcome::Stopped);
        }
    }

    /// Stop every fiber tagged with a group in `mask`
    pub fn stop_group(&mut self, mask: GroupMask) {
        let handles: Vec<_> = self
            .table
            .iter()
            .filter(|(_, f)| f.group.intersects(mask))
            .map(|(h, _)| h)
            .collect();
        for handle in handles {
            self.dispose(handle, Outcome::Stopped);
        }
    }

    /// Route panics caught inside routine steps to a hook
    pub fn set_panic_hook(&mut self, hook: impl FnMut(FiberHandle, &str) + 'static) {
        self.panic_hook = Some(Box::new(hook));
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Tick one phase using the frame clock
    pub fn update(&mut self, phase: Phase) -> Result<()> {
        if phase == Phase::Manual {
            return Err(SchedulerError::ManualPhase);
        }
        self.check_update()?;
        let delta = self.clock.delta_time(phase);
        self.update_with_delta(phase, delta)
    }

    /// Tick the manual phase with a caller-supplied delta
    pub fn manual_update(&mut self, delta: f32) -> Result<()> {
        self.update_with_delta(Phase::Manual, delta)
    }

    /// Tick one phase with a caller-supplied delta instead of the frame clock
    pub fn update_with_delta(&mut self, phase: Phase, delta: f32) -> Result<()> {
        self.check_update()?;
        self.updating = true;
        self.guard_unwind(|scheduler| scheduler.tick_phase(phase, delta));
        self.finish_update();
        Ok(())
    }

    fn tick_phase(&mut self, phase: Phase, delta: f32) {
        let started = Instant::now();

        if self.groups.has_pending() {
            tracing::trace!("Committing queued group changes before {:?}", phase);
        }
        self.groups.commit();
        if !self.paused {
            let scale = if phase.is_scaled() { self.time_scale } else { 1.0 };
            let delta = delta.max(0.0) * scale;

            let mut handles = std::mem::take(&mut self.scratch);
            self.table.snapshot_phase(phase, &mut handles);
            tracing::trace!(
                "Ticking {:?}: {} fibers, delta {:.4}s",
                phase,
                handles.len(),
                delta
            );
            for handle in handles.iter().copied() {
                self.run_fiber(handle, delta);
            }
            handles.clear();
            self.scratch = handles;
        }

        if phase == Phase::Update {
            self.frame += 1;
        }
        self.last_tick[phase.index()] = started.elapsed();
    }

    /// Resume fibers that yielded to `point`
    ///
    /// A paused waiter (directly or through its group) keeps waiting for
    /// the next time `point` is reached.
    pub fn yield_update(&mut self, point: YieldPhase) -> Result<()> {
        self.check_update()?;
        self.updating = true;
        self.guard_unwind(|scheduler| scheduler.tick_yield_point(point));
        self.finish_update();
        Ok(())
    }

    fn tick_yield_point(&mut self, point: YieldPhase) {
        self.groups.commit();
        if self.paused {
            return;
        }

        let waiters = std::mem::take(&mut self.yield_waiters[point.index()]);
        let mut kept = Vec::new();
        for handle in waiters {
            let Some(fiber) = self.table.get_mut(handle) else {
                continue;
            };
            if fiber.yield_phase != Some(point) {
                continue;
            }
            let held = fiber.flags.contains(FiberFlags::PAUSED) || self.groups.is_paused(fiber.group);
            if held && !fiber.flags.contains(FiberFlags::STOPPING) && fiber.host_alive() {
                kept.push(handle);
                continue;
            }
            fiber.yield_phase = None;
            self.run_fiber(handle, 0.0);
        }

        // Fibers that yielded to `point` during this pass wait behind the kept ones
        let waiting = &mut self.yield_waiters[point.index()];
        kept.append(waiting);
        *waiting = kept;
    }

    /// Run `tick`, clearing the updating flag if it unwinds
    ///
    /// Only reachable by panics the scheduler does not catch itself (with
    /// `catch_panics` off, or from a panic hook).
    fn guard_unwind(&mut self, tick: impl FnOnce(&mut Self)) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| tick(self))) {
            self.updating = false;
            resume_unwind(payload);
        }
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    fn check_update(&self) -> Result<()> {
        if self.shut_down {
            return Err(SchedulerError::ShutDown);
        }
        if self.updating {
            tracing::warn!("Refusing nested scheduler update");
            return Err(SchedulerError::AlreadyUpdating);
        }
        Ok(())
    }

    fn finish_update(&mut self) {
        self.updating = false;
        if self.shutdown_requested {
            self.shutdown();
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop every fiber and refuse further work
    ///
    /// Requested during an update, the shutdown happens when the update ends.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        if self.updating {
            tracing::debug!("Deferring scheduler shutdown until the current update ends");
            self.shutdown_requested = true;
            return;
        }

        let active = self.table.active_count();
        self.stop_all();
        self.shut_down = true;
        self.shutdown_requested = false;
        tracing::debug!("Scheduler shut down, stopped {} fibers", active);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Number of slots in the fiber table
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Number of live fibers, chained ones included
    pub fn active_count(&self) -> usize {
        self.table.active_count()
    }

    pub fn stats(&self) -> SchedulerStats {
        let mut per_phase = [0; PHASE_COUNT];
        for phase in Phase::ALL {
            per_phase[phase.index()] = self.table.phase_count(phase);
        }
        SchedulerStats {
            capacity: self.table.capacity(),
            active: self.table.active_count(),
            free: self.table.free_count(),
            chained: self.table.chained_count(),
            per_phase,
            frame: self.frame,
            last_tick: self.last_tick,
            time_scale: self.time_scale,
            paused_groups: self.groups.paused(),
        }
    }

    /// Per-fiber state of every live fiber
    pub fn snapshot(&self) -> Vec<FiberSnapshot> {
        self.table
            .iter()
            .map(|(handle, fiber)| Self::snapshot_fiber(handle, fiber))
            .collect()
    }

    pub fn snapshot_of(&self, handle: FiberHandle) -> Option<FiberSnapshot> {
        self.table
            .get(handle)
            .map(|fiber| Self::snapshot_fiber(handle, fiber))
    }

    fn snapshot_fiber(handle: FiberHandle, fiber: &Fiber) -> FiberSnapshot {
        FiberSnapshot {
            handle,
            name: fiber.name.clone(),
            phase: fiber.phase,
            priority: fiber.priority,
            group: fiber.group,
            paused: fiber.flags.contains(FiberFlags::PAUSED),
            stopping: fiber.flags.contains(FiberFlags::STOPPING),
            chained: fiber.is_chained(),
            waiting: fiber.wait > 0.0 || fiber.is_blocked() || fiber.yield_phase.is_some(),
            wait_remaining: fiber.wait.max(0.0),
            time_scale: fiber.time_scale,
            stack_depth: fiber.stack.len(),
            elapsed: fiber.elapsed,
        }
    }

    // ========================================================================
    // Fiber execution
    // ========================================================================

    /// Run one tick of a fiber; returns whether it is still running
    pub(crate) fn run_fiber(&mut self, handle: FiberHandle, delta: f32) -> bool {
        let Some(fiber) = self.table.get_mut(handle) else {
            return false;
        };
        if fiber.is_executing() {
            return true;
        }
        if fiber.flags.contains(FiberFlags::STOPPING) || !fiber.host_alive() {
            self.dispose(handle, Outcome::Stopped);
            return false;
        }
        if fiber.flags.contains(FiberFlags::PAUSED)
            || fiber.yield_phase.is_some()
            || self.groups.is_paused(fiber.group)
        {
            return true;
        }

        let delta = delta * fiber.local_time_scale() * self.groups.time_scale(fiber.group);
        fiber.elapsed += delta;

        if fiber.wait > 0.0 {
            fiber.wait -= delta;
            if fiber.wait > 0.0 {
                return true;
            }
            fiber.wait = 0.0;
        }

        self.step_fiber(handle, delta)
    }

    /// Resume the top of the fiber's stack until it yields for this tick
    fn step_fiber(&mut self, handle: FiberHandle, delta: f32) -> bool {
        let mut stack = match self.table.get_mut(handle) {
            Some(fiber) => {
                fiber.flags.insert(FiberFlags::EXECUTING);
                std::mem::take(&mut fiber.stack)
            }
            None => return false,
        };

        let mut outcome = Outcome::Pending;
        let mut steps = 0;
        // Only the first routine step of a tick sees the delta
        let mut step_delta = delta;
        loop {
            if steps >= self.config.max_steps_per_tick {
                tracing::warn!(
                    "Fiber {:?} exceeded {} steps in one tick, deferring",
                    handle,
                    steps
                );
                break;
            }
            steps += 1;

            let Some(top) = stack.last_mut() else {
                outcome = Outcome::Completed;
                break;
            };

            let yielded = match top {
                Frame::WaitFor(other) => {
                    let other = *other;
                    if self.is_running(other) {
                        break;
                    }
                    stack.pop();
                    continue;
                }
                Frame::WaitUntil(predicate) => {
                    if !predicate() {
                        break;
                    }
                    stack.pop();
                    continue;
                }
                Frame::Routine(routine) => {
                    let catch_panics = self.config.catch_panics;
                    let mut cx = RoutineContext::new(self, handle, step_delta);
                    step_delta = 0.0;
                    if catch_panics {
                        match catch_unwind(AssertUnwindSafe(|| routine.resume(&mut cx))) {
                            Ok(yielded) => yielded,
                            Err(payload) => {
                                outcome = Outcome::Panicked(panic_message(payload.as_ref()));
                                break;
                            }
                        }
                    } else {
                        routine.resume(&mut cx)
                    }
                }
            };

            match yielded {
                Yield::Next => break,
                Yield::Wait(seconds) => {
                    if let Some(fiber) = self.table.get_mut(handle) {
                        fiber.wait = seconds.max(0.0);
                    }
                    break;
                }
                Yield::WaitFor(other) => {
                    if other == handle {
                        break;
                    }
                    stack.push(Frame::WaitFor(other));
                }
                Yield::WaitUntil(predicate) => stack.push(Frame::WaitUntil(predicate)),
                Yield::Call(routine) => stack.push(Frame::Routine(routine)),
                Yield::WaitForPhase(point) => {
                    if let Some(fiber) = self.table.get_mut(handle) {
                        fiber.yield_phase = Some(point);
                    }
                    self.yield_waiters[point.index()].push(handle);
                    break;
                }
                Yield::Command(Command::Pause) => {
                    self.set_flag(handle, FiberFlags::PAUSED, true);
                    break;
                }
                Yield::Command(Command::Stop) => {
                    outcome = Outcome::Stopped;
                    break;
                }
                Yield::Command(Command::Continue) => {}
                Yield::Done => {
                    stack.pop();
                }
            }
        }

        let Some(fiber) = self.table.get_mut(handle) else {
            return false;
        };
        fiber.stack = stack;
        fiber.flags.remove(FiberFlags::EXECUTING);
        if outcome == Outcome::Pending && fiber.flags.contains(FiberFlags::STOPPING) {
            outcome = Outcome::Stopped;
        }

        match outcome {
            Outcome::Pending => true,
            Outcome::Panicked(message) => {
                tracing::error!("Fiber {:?} panicked: {}", handle, message);
                self.report_panic(handle, &message);
                self.dispose(handle, Outcome::Stopped);
                false
            }
            outcome => {
                self.dispose(handle, outcome);
                false
            }
        }
    }

    /// Cancel a fiber's routines, recycle its slot and fire its callbacks
    ///
    /// A fiber that is executing is only flagged; it is disposed once its
    /// current step returns.
    fn dispose(&mut self, handle: FiberHandle, outcome: Outcome) {
        let Some(fiber) = self.table.get_mut(handle) else {
            return;
        };
        if fiber.is_executing() {
            fiber.flags.insert(FiberFlags::STOPPING);
            return;
        }
        fiber.flags.insert(FiberFlags::EXECUTING | FiberFlags::STOPPING);
        let mut stack = std::mem::take(&mut fiber.stack);

        let completed = outcome == Outcome::Completed;
        if !completed {
            while let Some(frame) = stack.pop() {
                if let Frame::Routine(mut routine) = frame {
                    let mut cx = RoutineContext::new(self, handle, 0.0);
                    if catch_unwind(AssertUnwindSafe(|| routine.on_cancel(&mut cx))).is_err() {
                        tracing::error!("Fiber {:?} panicked while cancelling", handle);
                    }
                }
            }
        }
        drop(stack);

        let Some(fiber) = self.table.recycle(handle) else {
            return;
        };
        if let Some(point) = fiber.yield_phase {
            self.yield_waiters[point.index()].retain(|waiter| *waiter != handle);
        }
        tracing::debug!(
            "Fiber {:?} ({:?}) {}",
            handle,
            fiber.name,
            if completed { "completed" } else { "stopped" }
        );

        let callbacks: SmallVec<[Callback; 1]> = if completed {
            fiber.on_complete
        } else {
            fiber.on_stop
        };
        for callback in callbacks {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
                let message = panic_message(payload.as_ref());
                tracing::error!("Callback of fiber {:?} panicked: {}", handle, message);
                self.report_panic(handle, &message);
            }
        }
    }

    fn report_panic(&mut self, handle: FiberHandle, message: &str) {
        if let Some(hook) = self.panic_hook.as_mut() {
            hook(handle, message);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
