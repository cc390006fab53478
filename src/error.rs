use crate::job::JobStatus;
use thiserror::Error;

/// Structural errors raised synchronously by the job and session stores
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScribeError {
    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("session {0} not found")]
    SessionNotFound(String),

    /// Chunk submitted after the session was committed
    #[error("session {0} is closed to further audio")]
    SessionClosed(String),

    /// Duplicate commit; carries the job produced by the first commit
    #[error("session {session_id} already committed as job {job_id}")]
    AlreadyCommitted { session_id: String, job_id: String },

    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("session {session_id} exceeds its {limit} limit")]
    ChunkLimitExceeded {
        session_id: String,
        limit: &'static str,
    },

    #[error("processing dispatcher is shut down")]
    DispatcherClosed,
}

pub type Result<T> = std::result::Result<T, ScribeError>;

/// Failure reported by a processing executor.
///
/// Never returned to the submitter: it is recorded on the job as its error
/// message and only observable by polling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ProcessingFailure {
    pub reason: String,
}

impl ProcessingFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
