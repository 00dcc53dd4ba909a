//! Diagnostics snapshots
//!
//! Read-only views of the scheduler for debugger and profiling tools.

use std::time::Duration;

use crate::fiber::FiberHandle;
use crate::group::GroupMask;
use crate::phase::{Phase, PHASE_COUNT};

/// Aggregate scheduler counters
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SchedulerStats {
    /// Slots in the fiber table
    pub capacity: usize,
    /// Live fibers, chained ones included
    pub active: usize,
    /// Free slots
    pub free: usize,
    /// Live chained fibers
    pub chained: usize,
    /// Live fibers per phase, indexed by [`Phase::index`]
    pub per_phase: [usize; PHASE_COUNT],
    /// Number of `Phase::Update` ticks so far
    pub frame: u64,
    /// Wall time spent in the most recent tick of each phase
    pub last_tick: [Duration; PHASE_COUNT],
    /// Global time scale
    pub time_scale: f32,
    /// Groups currently paused
    pub paused_groups: GroupMask,
}

impl SchedulerStats {
    /// Live fibers in one phase
    pub fn in_phase(&self, phase: Phase) -> usize {
        self.per_phase[phase.index()]
    }
}

/// State of one fiber at the time of the snapshot
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FiberSnapshot {
    pub handle: FiberHandle,
    pub name: Option<String>,
    pub phase: Phase,
    pub priority: i32,
    pub group: GroupMask,
    pub paused: bool,
    pub stopping: bool,
    pub chained: bool,
    /// Waiting on a timer, another fiber, a predicate or a yield phase
    pub waiting: bool,
    /// Remaining seconds of a timed wait
    pub wait_remaining: f32,
    pub time_scale: f32,
    /// Depth of the explicit routine stack (zero while executing)
    pub stack_depth: usize,
    /// Scaled seconds the fiber has been running
    pub elapsed: f32,
}
