use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    BrokerError, JobListQuery, JobStore, JobStoreError, QueueBroker, ResultCache,
};
use crate::domain::{InputRef, Job, JobId, JobState, ModelName, TransitionFields};

use super::RetryPolicy;

const CANCEL_ATTEMPTS: usize = 3;
const MIN_RECONCILE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_attempts: u32,
    /// How long a running claim may go without a terminal transition.
    pub liveness_timeout: Duration,
    /// How long a pending job may sit untouched before it is published again.
    pub pending_grace: Duration,
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            liveness_timeout: Duration::from_secs(600),
            pending_grace: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub requeued: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub republished: usize,
    /// Broker deliveries nobody settled, handed back to the ready queue.
    pub orphans_requeued: usize,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Admits new jobs, cancels them, and repairs jobs abandoned by crashed workers.
pub struct Scheduler {
    job_store: Arc<dyn JobStore>,
    broker: Arc<dyn QueueBroker>,
    cache: Option<Arc<dyn ResultCache>>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        broker: Arc<dyn QueueBroker>,
        cache: Option<Arc<dyn ResultCache>>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            job_store,
            broker,
            cache,
            config,
        }
    }

    /// Creates the job and publishes it. A publish failure is not returned: the
    /// job stays pending and the reconciler publishes it later.
    #[tracing::instrument(skip(self, input_ref, model), fields(input_ref = %input_ref, model = ?model))]
    pub async fn enqueue(
        &self,
        input_ref: InputRef,
        model: Option<ModelName>,
    ) -> Result<JobId, SchedulerError> {
        let job = self
            .config
            .retry
            .run("create_job", || {
                self.job_store
                    .create(input_ref.clone(), model.clone(), self.config.max_attempts)
            })
            .await?;

        let published = self
            .config
            .retry
            .run("publish_job", || self.broker.publish(job.id))
            .await;

        match published {
            Ok(()) => tracing::info!(job_id = %job.id, "Transcription job enqueued"),
            Err(e) => tracing::warn!(
                job_id = %job.id,
                error = %e,
                "Job created but not published; left for reconciliation"
            ),
        }

        Ok(job.id)
    }

    /// Pending jobs are cancelled outright. Running jobs only get a cancel request
    /// that the worker honours before committing its result.
    #[tracing::instrument(skip(self), fields(job_id = %id))]
    pub async fn cancel(&self, id: JobId) -> Result<Job, SchedulerError> {
        let mut last_conflict = None;

        for _ in 0..CANCEL_ATTEMPTS {
            let job = self.get(id).await?;

            let attempt = match job.state {
                JobState::Pending => {
                    self.job_store
                        .transition(
                            id,
                            JobState::Pending,
                            JobState::Cancelled,
                            TransitionFields::release(None),
                        )
                        .await
                }
                JobState::Running => {
                    self.job_store
                        .transition(
                            id,
                            JobState::Running,
                            JobState::Running,
                            TransitionFields::request_cancel(),
                        )
                        .await
                }
                state => return Err(SchedulerError::NotCancellable { id, state }),
            };

            match attempt {
                Ok(job) => {
                    tracing::info!(state = %job.state, "Cancellation recorded");
                    return Ok(job);
                }
                Err(e @ JobStoreError::Conflict { .. }) => {
                    tracing::debug!(error = %e, "Job moved during cancel, re-reading");
                    last_conflict = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_conflict
            .map(SchedulerError::Store)
            .unwrap_or(SchedulerError::Store(JobStoreError::Conflict {
                id,
                expected: JobState::Pending,
            })))
    }

    pub async fn get(&self, id: JobId) -> Result<Job, SchedulerError> {
        let job = self
            .config
            .retry
            .run("get_job", || self.job_store.get(id))
            .await?;
        Ok(job)
    }

    pub async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, SchedulerError> {
        let jobs = self
            .config
            .retry
            .run("list_jobs", || self.job_store.list(query))
            .await?;
        Ok(jobs)
    }

    /// Transcript of a finished job, served from the cache when possible.
    /// `Ok(None)` means the job exists but has no transcript (yet).
    pub async fn transcript(&self, id: JobId) -> Result<Option<String>, SchedulerError> {
        if let Some(cache) = &self.cache {
            match cache.get(id).await {
                Ok(Some(result)) => return Ok(Some(result)),
                Ok(None) => {}
                Err(e) => tracing::warn!(job_id = %id, error = %e, "Result cache read failed"),
            }
        }

        let job = self.get(id).await?;
        if job.state != JobState::Done {
            return Ok(None);
        }

        if let (Some(cache), Some(result)) = (&self.cache, &job.result) {
            if let Err(e) = cache.put(id, result).await {
                tracing::warn!(job_id = %id, error = %e, "Result cache fill failed");
            }
        }

        Ok(job.result)
    }

    /// One sweep over abandoned claims and unpublished pending jobs. Attempt
    /// counts are never touched here: the claiming worker already counted.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, SchedulerError> {
        let mut report = ReconcileReport::default();

        let mut stale_running = self
            .job_store
            .list_stale(JobState::Running, self.config.liveness_timeout);
        while let Some(job) = stale_running.next().await {
            self.recover_running(job?, &mut report).await;
        }
        drop(stale_running);

        let mut stale_pending = self
            .job_store
            .list_stale(JobState::Pending, self.config.pending_grace);
        while let Some(job) = stale_pending.next().await {
            self.republish_pending(job?, &mut report).await;
        }
        drop(stale_pending);

        match self
            .broker
            .requeue_orphans(self.config.liveness_timeout)
            .await
        {
            Ok(moved) => report.orphans_requeued = moved,
            Err(e) => tracing::warn!(error = %e, "Orphaned delivery recovery failed"),
        }

        if !report.is_empty() {
            tracing::info!(
                requeued = report.requeued,
                failed = report.failed,
                cancelled = report.cancelled,
                republished = report.republished,
                orphans_requeued = report.orphans_requeued,
                "Reconciliation sweep repaired jobs"
            );
        }

        Ok(report)
    }

    async fn recover_running(&self, job: Job, report: &mut ReconcileReport) {
        let next = job.state_after_interrupted_attempt();
        let owner = job.claimed_by.as_ref();
        let fields = match next {
            JobState::Failed => TransitionFields::fail(
                owner,
                format!(
                    "claim expired after {} of {} attempts",
                    job.attempt_count, job.max_attempts
                ),
            ),
            _ => TransitionFields::release(owner),
        };

        match self
            .job_store
            .transition(job.id, JobState::Running, next, fields)
            .await
        {
            Ok(_) => {
                tracing::warn!(
                    job_id = %job.id,
                    claimed_by = ?job.claimed_by,
                    next = %next,
                    "Recovered job with expired claim"
                );
                match next {
                    JobState::Pending => {
                        report.requeued += 1;
                        self.publish_quietly(job.id).await;
                    }
                    JobState::Failed => report.failed += 1,
                    _ => report.cancelled += 1,
                }
            }
            Err(JobStoreError::Conflict { .. }) => {
                tracing::debug!(job_id = %job.id, "Stale job settled concurrently");
            }
            Err(e) => tracing::warn!(job_id = %job.id, error = %e, "Failed to recover stale job"),
        }
    }

    async fn republish_pending(&self, job: Job, report: &mut ReconcileReport) {
        let (next, fields) = if job.attempts_exhausted() {
            (
                JobState::Failed,
                TransitionFields::fail(None, "attempts exhausted".to_string()),
            )
        } else {
            (JobState::Pending, TransitionFields::touch())
        };

        match self
            .job_store
            .transition(job.id, JobState::Pending, next, fields)
            .await
        {
            Ok(_) if next == JobState::Pending => {
                report.republished += 1;
                self.publish_quietly(job.id).await;
            }
            Ok(_) => report.failed += 1,
            Err(JobStoreError::Conflict { .. }) => {
                tracing::debug!(job_id = %job.id, "Pending job claimed concurrently");
            }
            Err(e) => tracing::warn!(job_id = %job.id, error = %e, "Failed to touch pending job"),
        }
    }

    async fn publish_quietly(&self, id: JobId) {
        if let Err(e) = self.broker.publish(id).await {
            tracing::warn!(job_id = %id, error = %e, "Republish failed; next sweep retries");
        }
    }

    /// Runs `reconcile` every `interval` (at least one second) until `shutdown` fires.
    pub async fn run_reconciler(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        if interval < MIN_RECONCILE_INTERVAL {
            tracing::warn!(
                requested_ms = interval.as_millis() as u64,
                "Reconcile interval too short, using one second"
            );
        }
        let interval = interval.max(MIN_RECONCILE_INTERVAL);
        tracing::info!(interval_secs = interval.as_secs(), "Reconciler started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile().await {
                        tracing::error!(error = %e, "Reconciliation sweep failed");
                    }
                }
            }
        }
        tracing::info!("Reconciler stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("job store: {0}")]
    Store(#[from] JobStoreError),
    #[error("queue broker: {0}")]
    Broker(#[from] BrokerError),
    #[error("job {id} is {state} and cannot be cancelled")]
    NotCancellable { id: JobId, state: JobState },
}
