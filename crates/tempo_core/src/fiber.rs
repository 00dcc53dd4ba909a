//! Fibers
//!
//! A fiber is one running cooperative task: an explicit stack of routines
//! plus the timing, control and classification state the scheduler needs
//! to decide when and how to resume it.
//!
//! Fibers live in the [`FiberTable`](crate::table::FiberTable) and are
//! addressed by [`FiberHandle`], an index plus generation. Once a fiber is
//! recycled its handle goes stale and every operation on it is a no-op.

use bitflags::bitflags;
use slotmap::new_key_type;
use smallvec::SmallVec;
use std::cell::Cell;
use std::rc::Rc;

use crate::group::GroupMask;
use crate::phase::{Phase, YieldPhase};
use crate::routine::{Frame, Routine};

new_key_type! {
    /// Generation-guarded handle to a fiber
    pub struct FiberHandle;
}

/// Callback fired when a fiber finishes or is stopped
pub type Callback = Box<dyn FnOnce()>;

bitflags! {
    /// Control flags of a fiber
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct FiberFlags: u8 {
        /// Paused; skipped without advancing
        const PAUSED = 1 << 0;
        /// Stop requested; disposed on its next run
        const STOPPING = 1 << 1;
        /// Driven by a parent routine instead of a phase list
        const CHAINED = 1 << 2;
        /// Ignores the host's time scale
        const IGNORE_HOST_SCALE = 1 << 3;
        /// Currently executing a step (its stack is checked out)
        const EXECUTING = 1 << 4;
    }
}

/// The entity a fiber belongs to
///
/// A fiber whose host is no longer alive terminates on its next tick.
pub trait Host {
    /// Whether the owning entity is still valid
    fn is_alive(&self) -> bool;

    /// Ambient time scale of the owning entity
    fn time_scale(&self) -> f32 {
        1.0
    }
}

#[derive(Debug)]
struct HostState {
    alive: Cell<bool>,
    time_scale: Cell<f32>,
}

/// A shareable host-liveness signal
///
/// Clones share the same state, so the host side can keep one copy and
/// invalidate it when the owning entity goes away.
#[derive(Clone, Debug)]
pub struct HostToken(Rc<HostState>);

impl HostToken {
    pub fn new() -> Self {
        Self(Rc::new(HostState {
            alive: Cell::new(true),
            time_scale: Cell::new(1.0),
        }))
    }

    /// Mark the owning entity as gone
    pub fn invalidate(&self) {
        self.0.alive.set(false);
    }

    pub fn set_time_scale(&self, scale: f32) {
        self.0.time_scale.set(scale);
    }
}

impl Default for HostToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for HostToken {
    fn is_alive(&self) -> bool {
        self.0.alive.get()
    }

    fn time_scale(&self) -> f32 {
        self.0.time_scale.get()
    }
}

/// Options applied when a fiber is started
#[derive(Clone)]
pub struct FiberOptions {
    pub(crate) phase: Option<Phase>,
    pub(crate) priority: i32,
    pub(crate) group: GroupMask,
    pub(crate) name: Option<String>,
    pub(crate) time_scale: f32,
    pub(crate) host: Option<Rc<dyn Host>>,
    pub(crate) ignore_host_scale: bool,
    pub(crate) paused: bool,
}

impl Default for FiberOptions {
    fn default() -> Self {
        Self {
            phase: None,
            priority: 0,
            group: GroupMask::NONE,
            name: None,
            time_scale: 1.0,
            host: None,
            ignore_host_scale: false,
            paused: false,
        }
    }
}

impl FiberOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the update phase (defaults to the scheduler's default phase)
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Builder: set the priority (lower runs first)
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set the group mask
    pub fn with_group(mut self, group: GroupMask) -> Self {
        self.group = group;
        self
    }

    /// Builder: set a display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set the per-fiber time scale
    pub fn with_time_scale(mut self, scale: f32) -> Self {
        self.time_scale = scale;
        self
    }

    /// Builder: attach the owning host
    pub fn with_host(mut self, host: impl Host + 'static) -> Self {
        self.host = Some(Rc::new(host));
        self
    }

    /// Builder: ignore the host's time scale
    pub fn ignoring_host_scale(mut self) -> Self {
        self.ignore_host_scale = true;
        self
    }

    /// Builder: start paused
    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }
}

/// One fiber slot in the table
pub(crate) struct Fiber {
    pub phase: Phase,
    pub priority: i32,
    /// Start order, breaks priority ties
    pub order: u64,
    pub group: GroupMask,
    pub name: Option<String>,
    pub flags: FiberFlags,
    pub time_scale: f32,
    /// Remaining seconds of a timed wait
    pub wait: f32,
    pub elapsed: f32,
    pub yield_phase: Option<YieldPhase>,
    pub host: Option<Rc<dyn Host>>,
    pub stack: SmallVec<[Frame; 4]>,
    pub on_complete: SmallVec<[Callback; 1]>,
    pub on_stop: SmallVec<[Callback; 1]>,
}

impl Fiber {
    pub fn new(root: Box<dyn Routine>, options: FiberOptions, phase: Phase, chained: bool) -> Self {
        let mut flags = FiberFlags::empty();
        flags.set(FiberFlags::CHAINED, chained);
        flags.set(FiberFlags::PAUSED, options.paused);
        flags.set(FiberFlags::IGNORE_HOST_SCALE, options.ignore_host_scale);

        let name = options.name.or_else(|| root.name().map(str::to_owned));
        let mut stack = SmallVec::new();
        stack.push(Frame::Routine(root));

        Self {
            phase,
            priority: options.priority,
            order: 0,
            group: options.group,
            name,
            flags,
            time_scale: options.time_scale,
            wait: 0.0,
            elapsed: 0.0,
            yield_phase: None,
            host: options.host,
            stack,
            on_complete: SmallVec::new(),
            on_stop: SmallVec::new(),
        }
    }

    #[inline]
    pub fn is_chained(&self) -> bool {
        self.flags.contains(FiberFlags::CHAINED)
    }

    #[inline]
    pub fn is_executing(&self) -> bool {
        self.flags.contains(FiberFlags::EXECUTING)
    }

    pub fn host_alive(&self) -> bool {
        self.host.as_ref().map_or(true, |host| host.is_alive())
    }

    /// Own scale times host scale (unless ignored)
    pub fn local_time_scale(&self) -> f32 {
        let host_scale = match &self.host {
            Some(host) if !self.flags.contains(FiberFlags::IGNORE_HOST_SCALE) => host.time_scale(),
            _ => 1.0,
        };
        self.time_scale * host_scale
    }

    /// Whether the top of the stack is a blocking pseudo-routine
    pub fn is_blocked(&self) -> bool {
        self.stack.last().is_some_and(Frame::is_blocking)
    }
}
