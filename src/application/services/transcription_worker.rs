use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::{
    JobStore, JobStoreError, QueueBroker, QueueMessage, ResultCache, StagingStore,
    StagingStoreError, TranscriptionEngine, TranscriptionError,
};
use crate::domain::{Job, JobState, ModelName, TransitionFields, WorkerId};

use super::RetryPolicy;

const CONSUME_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Shared collaborators of every worker in a pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub job_store: Arc<dyn JobStore>,
    pub broker: Arc<dyn QueueBroker>,
    pub staging_store: Arc<dyn StagingStore>,
    pub transcription_engine: Arc<dyn TranscriptionEngine>,
    pub result_cache: Option<Arc<dyn ResultCache>>,
    pub attempt_timeout: Duration,
    /// Pause before a requeued delivery goes back to the broker, multiplied by
    /// the attempts used so far.
    pub requeue_backoff: Duration,
    pub retry: RetryPolicy,
}

/// What a worker did with one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Requeued,
    Failed,
    Cancelled,
    /// Duplicate or lost claim race; acknowledged without side effects.
    Skipped,
    /// Store unreachable before any mutation; message handed back to the broker.
    Deferred,
}

enum Settle {
    Ack,
    Nack,
}

pub struct TranscriptionWorker {
    id: WorkerId,
    ctx: WorkerContext,
}

impl TranscriptionWorker {
    pub fn new(id: WorkerId, ctx: WorkerContext) -> Self {
        Self { id, ctx }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(worker_id = %self.id, "Transcription worker started");
        let mut messages = self.ctx.broker.consume();

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = messages.next() => next,
            };

            match next {
                Some(Ok(message)) => {
                    let span = tracing::info_span!(
                        "transcription_job",
                        job_id = %message.job_id,
                        worker_id = %self.id,
                    );
                    let outcome = self.handle(&message).instrument(span).await;
                    tracing::debug!(job_id = %message.job_id, outcome = ?outcome, "Delivery handled");
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Failed to receive from queue");
                    tokio::time::sleep(CONSUME_ERROR_BACKOFF).await;
                }
                None => break,
            }
        }
        tracing::info!(worker_id = %self.id, "Transcription worker stopped");
    }

    /// Processes one delivery to completion. Never fails: every error ends in a
    /// settled message and, where the job was touched, a recorded transition.
    pub async fn handle(&self, message: &QueueMessage) -> Outcome {
        let job = match self.ctx.job_store.get(message.job_id).await {
            Ok(job) => job,
            Err(JobStoreError::NotFound(_)) => {
                tracing::warn!("Delivery references unknown job, dropping");
                self.settle(message, Settle::Ack).await;
                return Outcome::Skipped;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Job lookup failed, returning message");
                self.settle(message, Settle::Nack).await;
                return Outcome::Deferred;
            }
        };

        if job.state != JobState::Pending {
            tracing::debug!(state = %job.state, "Job is not pending, discarding delivery");
            self.settle(message, Settle::Ack).await;
            return Outcome::Skipped;
        }

        if job.attempts_exhausted() {
            let outcome = self
                .commit(
                    &job,
                    JobState::Pending,
                    JobState::Failed,
                    TransitionFields::fail(None, "attempts exhausted".to_string()),
                )
                .await;
            self.settle(message, Settle::Ack).await;
            return outcome.unwrap_or(Outcome::Skipped);
        }

        let claimed = match self
            .ctx
            .job_store
            .transition(
                job.id,
                JobState::Pending,
                JobState::Running,
                TransitionFields::claim(&self.id),
            )
            .await
        {
            Ok(job) => job,
            Err(JobStoreError::Conflict { .. }) => {
                tracing::debug!("Lost claim race, discarding delivery");
                self.settle(message, Settle::Ack).await;
                return Outcome::Skipped;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Claim failed, returning message");
                self.settle(message, Settle::Nack).await;
                return Outcome::Deferred;
            }
        };

        tracing::info!(
            attempt = claimed.attempt_count,
            max_attempts = claimed.max_attempts,
            "Job claimed"
        );

        let (outcome, settle) = match self.attempt(&claimed).await {
            Ok(transcript) => (self.finish(&claimed, transcript).await, Settle::Ack),
            Err(e) if e.is_retryable() => {
                let outcome = self.interrupt(&claimed, &e).await;
                match outcome {
                    Outcome::Requeued => {
                        self.back_off(claimed.attempt_count).await;
                        (outcome, Settle::Nack)
                    }
                    _ => (outcome, Settle::Ack),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Non-retryable transcription failure");
                let outcome = self
                    .commit(
                        &claimed,
                        JobState::Running,
                        JobState::Failed,
                        TransitionFields::fail(Some(&self.id), e.to_string()),
                    )
                    .await
                    .unwrap_or(Outcome::Skipped);
                (outcome, Settle::Ack)
            }
        };

        self.settle(message, settle).await;
        outcome
    }

    async fn attempt(&self, job: &Job) -> Result<String, TranscriptionError> {
        let work = async {
            let data = self
                .ctx
                .staging_store
                .fetch(&job.input_ref)
                .await
                .map_err(map_staging_error)?;
            tracing::debug!(bytes = data.len(), "Audio fetched");
            let model = job.model.as_ref().map(ModelName::as_str);
            self.ctx.transcription_engine.transcribe(&data, model).await
        };

        match tokio::time::timeout(self.ctx.attempt_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(TranscriptionError::Timeout(
                self.ctx.attempt_timeout.as_secs(),
            )),
        }
    }

    async fn back_off(&self, attempts_used: u32) {
        let delay = self.ctx.requeue_backoff.saturating_mul(attempts_used);
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Delaying redelivery");
            tokio::time::sleep(delay).await;
        }
    }

    async fn finish(&self, claimed: &Job, transcript: String) -> Outcome {
        let current = self.refresh(claimed).await;

        if current.cancel_requested {
            tracing::info!("Cancel requested during transcription, dropping result");
            return self
                .commit(
                    claimed,
                    JobState::Running,
                    JobState::Cancelled,
                    TransitionFields::release(Some(&self.id)),
                )
                .await
                .unwrap_or(Outcome::Skipped);
        }

        let committed = self
            .commit(
                claimed,
                JobState::Running,
                JobState::Done,
                TransitionFields::complete(&self.id, transcript.clone()),
            )
            .await;

        if committed == Some(Outcome::Done) {
            if let Some(cache) = &self.ctx.result_cache {
                if let Err(e) = cache.put(claimed.id, &transcript).await {
                    tracing::warn!(error = %e, "Failed to populate result cache");
                }
            }
            tracing::info!(chars = transcript.len(), "Transcription completed");
        }

        committed.unwrap_or(Outcome::Skipped)
    }

    async fn interrupt(&self, claimed: &Job, error: &TranscriptionError) -> Outcome {
        let current = self.refresh(claimed).await;
        let next = current.state_after_interrupted_attempt();
        let fields = match next {
            JobState::Failed => TransitionFields::fail(Some(&self.id), error.to_string()),
            _ => TransitionFields::release(Some(&self.id)),
        };

        tracing::warn!(
            error = %error,
            attempt = current.attempt_count,
            max_attempts = current.max_attempts,
            next = %next,
            "Transient transcription failure"
        );

        self.commit(claimed, JobState::Running, next, fields)
            .await
            .unwrap_or(Outcome::Skipped)
    }

    /// Latest stored copy of a job this worker holds, or the claimed copy when the
    /// store cannot answer.
    async fn refresh(&self, claimed: &Job) -> Job {
        match self.ctx.job_store.get(claimed.id).await {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(error = %e, "Could not re-read job before commit");
                claimed.clone()
            }
        }
    }

    /// Applies a transition with retry on outages. `None` means the commit was lost:
    /// another actor moved the job, or the store stayed down and the reconciler
    /// will repair the claim.
    async fn commit(
        &self,
        job: &Job,
        expected: JobState,
        next: JobState,
        fields: TransitionFields,
    ) -> Option<Outcome> {
        let result = self
            .ctx
            .retry
            .run("commit_transition", || {
                self.ctx
                    .job_store
                    .transition(job.id, expected, next, fields.clone())
            })
            .await;

        match result {
            Ok(job) => Some(match job.state {
                JobState::Done => Outcome::Done,
                JobState::Pending => Outcome::Requeued,
                JobState::Failed => Outcome::Failed,
                JobState::Cancelled => Outcome::Cancelled,
                JobState::Running => Outcome::Skipped,
            }),
            Err(JobStoreError::Conflict { .. }) => {
                tracing::warn!(next = %next, "Claim lost before commit, discarding result");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, next = %next, "Commit failed, leaving job for reconciliation");
                None
            }
        }
    }

    async fn settle(&self, message: &QueueMessage, settle: Settle) {
        let result = match settle {
            Settle::Ack => self.ctx.broker.ack(message).await,
            Settle::Nack => self.ctx.broker.nack(message).await,
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to settle queue message");
        }
    }
}

fn map_staging_error(error: StagingStoreError) -> TranscriptionError {
    match error {
        StagingStoreError::NotFound(path) => TranscriptionError::InputNotFound(path),
        other => TranscriptionError::TranscriptionFailed(format!("staging store: {}", other)),
    }
}
