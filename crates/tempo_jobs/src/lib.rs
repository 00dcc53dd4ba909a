//! Tempo Async Work Scheduler
//!
//! Prioritized background jobs for frame-driven applications:
//!
//! - **Tiers**: high, normal and low priority queues sharing a per-frame
//!   time budget by weight
//! - **Stepped jobs**: long work split into steps that may sleep and can be
//!   cancelled between steps, transitively over nested children
//! - **Workers**: one thread per tier when threading is available, with a
//!   deterministic single-threaded mode
//! - **Dispatcher**: completion and stop callbacks always run on the thread
//!   that calls [`JobScheduler::update`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tempo_jobs::{AsyncFlags, JobConfig, JobScheduler, Threading};
//!
//! let mut jobs = JobScheduler::new(
//!     JobConfig::default().with_threading(Threading::SingleThreaded),
//! )
//! .unwrap();
//!
//! let done = Arc::new(AtomicBool::new(false));
//! let flag = done.clone();
//! let handle = jobs.schedule(|| {}, AsyncFlags::HIGH_PRIORITY).unwrap();
//! handle.on_complete(move || flag.store(true, Ordering::SeqCst));
//!
//! jobs.update(Duration::from_millis(2)).unwrap();
//! assert!(!handle.is_running());
//! assert!(done.load(Ordering::SeqCst));
//! ```

mod dispatcher;
pub mod error;
pub mod flags;
pub mod handle;
pub mod job;
pub mod scheduler;
mod shared;
mod worker;

pub use error::{JobError, Result};
pub use flags::{AsyncFlags, AsyncPriority, TIER_COUNT};
pub use handle::AsyncHandle;
pub use job::{step_fn, JobContext, JobId, JobStep, JobYield, MainCallback, StepFn};
pub use scheduler::{JobConfig, JobScheduler, JobStats, Threading};
pub use shared::PanicHook;
