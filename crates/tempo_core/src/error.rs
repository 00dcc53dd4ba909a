//! Scheduler error types

use thiserror::Error;

/// Errors reported by the frame scheduler
///
/// Stale fiber handles are never an error: operations on them are no-ops.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// An update was requested while another update is still running
    #[error("Scheduler is already updating")]
    AlreadyUpdating,

    /// The scheduler has been shut down
    #[error("Scheduler has been shut down")]
    ShutDown,

    /// The manual phase has no frame clock and must be driven by `manual_update`
    #[error("The manual phase is only driven by manual_update")]
    ManualPhase,
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;
