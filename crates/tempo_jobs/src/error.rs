//! Job scheduler error types

use thiserror::Error;

/// Errors reported by the job scheduler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The scheduler has been shut down
    #[error("Job scheduler has been shut down")]
    ShutDown,

    /// A worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

/// Result type for job scheduler operations
pub type Result<T> = std::result::Result<T, JobError>;
