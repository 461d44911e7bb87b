use crate::domain::{JobId, JobState, TransitionRejection};

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("conflict on job {id}: expected state {expected}")]
    Conflict { id: JobId, expected: JobState },
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt job record: {0}")]
    Corrupt(String),
}

impl JobStoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, JobStoreError::Unavailable(_))
    }

    pub fn from_rejection(
        rejection: TransitionRejection,
        id: JobId,
        expected: JobState,
        next: JobState,
    ) -> Self {
        match rejection {
            TransitionRejection::InvalidEdge => JobStoreError::InvalidTransition {
                from: expected,
                to: next,
            },
            TransitionRejection::StateMismatch
            | TransitionRejection::OwnerMismatch
            | TransitionRejection::AttemptsExhausted => JobStoreError::Conflict { id, expected },
        }
    }
}
