use chrono::{DateTime, Utc};

use super::{InputRef, JobId, JobState, ModelName, WorkerId};

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub input_ref: InputRef,
    /// Engine default when absent.
    pub model: Option<ModelName>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub result: Option<String>,
    pub error: Option<String>,
    pub claimed_by: Option<WorkerId>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(input_ref: InputRef, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            state: JobState::Pending,
            input_ref,
            model: None,
            attempt_count: 0,
            max_attempts: max_attempts.max(1),
            result: None,
            error: None,
            claimed_by: None,
            claimed_at: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_model(mut self, model: Option<ModelName>) -> Self {
        self.model = model;
        self
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    /// Where an interrupted attempt leads: a retryable failure, a timeout, or a
    /// claim that outlived its liveness timeout. Retry policy is a function of
    /// stored fields only.
    pub fn state_after_interrupted_attempt(&self) -> JobState {
        if self.cancel_requested {
            JobState::Cancelled
        } else if self.attempts_exhausted() {
            JobState::Failed
        } else {
            JobState::Pending
        }
    }

    /// The claim time for running jobs, the last update otherwise.
    pub fn liveness_clock(&self) -> DateTime<Utc> {
        match self.state {
            JobState::Running => self.claimed_at.unwrap_or(self.updated_at),
            _ => self.updated_at,
        }
    }

    /// Strictly older than `cutoff`; a clock equal to it is still live.
    pub fn is_stale_at(&self, cutoff: DateTime<Utc>) -> bool {
        self.liveness_clock() < cutoff
    }

    pub fn is_claimed_by(&self, worker: &WorkerId) -> bool {
        self.claimed_by.as_ref() == Some(worker)
    }

    /// Checks the guards of a compare-and-set against this stored job, without
    /// mutating it.
    pub fn check_transition(
        &self,
        expected: JobState,
        next: JobState,
        fields: &TransitionFields,
    ) -> Result<(), TransitionRejection> {
        if !expected.can_transition_to(next) {
            return Err(TransitionRejection::InvalidEdge);
        }
        if self.state != expected {
            return Err(TransitionRejection::StateMismatch);
        }
        if let Some(owner) = &fields.require_owner {
            if !self.is_claimed_by(owner) {
                return Err(TransitionRejection::OwnerMismatch);
            }
        }
        if fields.increment_attempts && self.attempts_exhausted() {
            return Err(TransitionRejection::AttemptsExhausted);
        }
        Ok(())
    }

    /// Applies an already checked transition.
    pub fn apply(&mut self, next: JobState, fields: &TransitionFields, now: DateTime<Utc>) {
        self.state = next;
        if fields.increment_attempts {
            self.attempt_count += 1;
        }
        match &fields.claim {
            ClaimUpdate::Keep => {}
            ClaimUpdate::Set(worker) => {
                self.claimed_by = Some(worker.clone());
                self.claimed_at = Some(now);
            }
            ClaimUpdate::Clear => {
                self.claimed_by = None;
                self.claimed_at = None;
            }
        }
        if let Some(result) = &fields.result {
            self.result = Some(result.clone());
        }
        if let Some(error) = &fields.error {
            self.error = Some(error.clone());
        }
        if fields.request_cancel {
            self.cancel_requested = true;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ClaimUpdate {
    #[default]
    Keep,
    Set(WorkerId),
    Clear,
}

/// Field changes carried by a compare-and-set transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionFields {
    /// Only apply when the stored claim belongs to this worker.
    pub require_owner: Option<WorkerId>,
    pub increment_attempts: bool,
    pub claim: ClaimUpdate,
    pub result: Option<String>,
    pub error: Option<String>,
    pub request_cancel: bool,
}

impl TransitionFields {
    pub fn claim(worker: &WorkerId) -> Self {
        Self {
            increment_attempts: true,
            claim: ClaimUpdate::Set(worker.clone()),
            ..Self::default()
        }
    }

    pub fn complete(worker: &WorkerId, result: String) -> Self {
        Self {
            require_owner: Some(worker.clone()),
            claim: ClaimUpdate::Clear,
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn fail(worker: Option<&WorkerId>, error: String) -> Self {
        Self {
            require_owner: worker.cloned(),
            claim: ClaimUpdate::Clear,
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn release(worker: Option<&WorkerId>) -> Self {
        Self {
            require_owner: worker.cloned(),
            claim: ClaimUpdate::Clear,
            ..Self::default()
        }
    }

    pub fn request_cancel() -> Self {
        Self {
            request_cancel: true,
            ..Self::default()
        }
    }

    pub fn touch() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejection {
    InvalidEdge,
    StateMismatch,
    OwnerMismatch,
    AttemptsExhausted,
}
