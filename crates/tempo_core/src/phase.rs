//! Update phases
//!
//! Every fiber belongs to exactly one phase. The host's frame loop ticks
//! each phase once per frame (the manual phase only when asked).

/// Number of update phases
pub const PHASE_COUNT: usize = 6;

/// Number of yield phases
pub const YIELD_PHASE_COUNT: usize = 3;

/// The per-frame tick list a fiber is registered to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Regular per-frame update
    #[default]
    Update,
    /// Runs after every regular update of the frame
    LateUpdate,
    /// Fixed-timestep update
    FixedUpdate,
    /// Per-frame update that ignores the global time scale
    Realtime,
    /// Host-defined update point
    Custom,
    /// Only runs through `Scheduler::manual_update`
    Manual,
}

impl Phase {
    /// All phases in declaration order
    pub const ALL: [Phase; PHASE_COUNT] = [
        Phase::Update,
        Phase::LateUpdate,
        Phase::FixedUpdate,
        Phase::Realtime,
        Phase::Custom,
        Phase::Manual,
    ];

    /// Index of this phase into per-phase arrays
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the global time scale applies to this phase
    #[inline]
    pub fn is_scaled(self) -> bool {
        !matches!(self, Phase::Realtime)
    }
}

/// A point in the frame a fiber can yield to, outside of its own phase
///
/// A fiber that yields `Yield::WaitForPhase` is skipped by its own phase
/// until the host calls `Scheduler::yield_update` for that point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum YieldPhase {
    LateUpdate,
    FixedUpdate,
    EndOfFrame,
}

impl YieldPhase {
    pub const ALL: [YieldPhase; YIELD_PHASE_COUNT] = [
        YieldPhase::LateUpdate,
        YieldPhase::FixedUpdate,
        YieldPhase::EndOfFrame,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}
