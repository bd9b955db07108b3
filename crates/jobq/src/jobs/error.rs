use crate::jobs::model::{PRIORITY_MAX, PRIORITY_MIN};

/// Failure taxonomy for queue operations.
///
/// `Conflict` means a guarded transition matched zero rows because the job's
/// status no longer satisfies the precondition; callers re-read and decide
/// whether to retry or move on. The runner treats conflicts during
/// reconciliation as benign.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("priority must be between {PRIORITY_MIN} and {PRIORITY_MAX}, got {0}")]
    InvalidPriority(i64),

    #[error("no job with id {0}")]
    NotFound(i64),

    #[error("job {id} is {actual}, expected {expected}")]
    Conflict {
        id: i64,
        actual: String,
        expected: &'static str,
    },

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),
}

impl QueueError {
    /// Conflicts are expected under concurrent mutation and usually benign.
    pub fn is_conflict(&self) -> bool {
        matches!(self, QueueError::Conflict { .. })
    }
}
