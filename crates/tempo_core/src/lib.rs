//! Tempo Core Runtime
//!
//! Cooperative fibers for frame-driven applications:
//!
//! - **Routines**: resumable step sequences with an explicit call stack
//! - **Fibers**: pooled, generation-guarded tasks with pause, stop, time
//!   scaling, groups and host-liveness checks
//! - **Scheduler**: per-phase ticking in priority order, group pause and
//!   time scale, manual and yield-point updates
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tempo_core::{Phase, Scheduler, SchedulerConfig, Sequence};
//!
//! let mut scheduler = Scheduler::new(SchedulerConfig::default());
//! let done = Rc::new(Cell::new(false));
//! let flag = done.clone();
//!
//! let handle = scheduler.start(Sequence::new().wait(2.0).call(move || flag.set(true)));
//!
//! scheduler.update_with_delta(Phase::Update, 1.9).unwrap();
//! assert!(scheduler.is_running(handle));
//!
//! scheduler.update_with_delta(Phase::Update, 0.2).unwrap();
//! assert!(!scheduler.is_running(handle));
//! assert!(done.get());
//! ```

pub mod combinators;
pub mod error;
pub mod fiber;
pub mod group;
pub mod phase;
pub mod routine;
pub mod scheduler;
pub mod stats;
mod table;

pub use combinators::{action, delay, wait, wait_until, Combine, Sequence};
pub use error::{Result, SchedulerError};
pub use fiber::{Callback, FiberHandle, FiberOptions, Host, HostToken};
pub use group::{GroupMask, MAX_GROUPS};
pub use phase::{Phase, YieldPhase, PHASE_COUNT};
pub use routine::{routine, Command, FnRoutine, Routine, RoutineContext, Yield};
pub use scheduler::{FixedClock, FrameClock, Scheduler, SchedulerConfig, SystemClock};
pub use stats::{FiberSnapshot, SchedulerStats};
pub use table::DEFAULT_CAPACITY;
