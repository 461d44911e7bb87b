use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::RwLock;

use crate::application::ports::{JobListQuery, JobStore, JobStoreError};
use crate::domain::{InputRef, Job, JobId, JobState, ModelName, TransitionFields};

/// Process-local job store. The write lock makes each compare-and-set atomic.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Rewrites the liveness clocks of a job, as if it had been claimed or
    /// touched `age` ago.
    pub async fn backdate(&self, id: JobId, age: Duration) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        let at = Utc::now() - chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());
        job.updated_at = at;
        if job.claimed_at.is_some() {
            job.claimed_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(
        &self,
        input_ref: InputRef,
        model: Option<ModelName>,
        max_attempts: u32,
    ) -> Result<Job, JobStoreError> {
        let job = Job::new(input_ref, max_attempts).with_model(model);
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Job, JobStoreError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(JobStoreError::NotFound(id))
    }

    async fn transition(
        &self,
        id: JobId,
        expected: JobState,
        next: JobState,
        fields: TransitionFields,
    ) -> Result<Job, JobStoreError> {
        if !expected.can_transition_to(next) {
            return Err(JobStoreError::InvalidTransition {
                from: expected,
                to: next,
            });
        }

        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;

        job.check_transition(expected, next, &fields)
            .map_err(|rejection| JobStoreError::from_rejection(rejection, id, expected, next))?;
        job.apply(next, &fields, Utc::now());

        Ok(job.clone())
    }

    async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.jobs.read().await;

        let after = match query.after {
            Some(id) => {
                let job = jobs.get(&id).ok_or(JobStoreError::NotFound(id))?;
                Some((job.created_at, id.as_uuid()))
            }
            None => None,
        };

        let mut page: Vec<&Job> = jobs
            .values()
            .filter(|job| query.state.is_none_or(|state| job.state == state))
            .filter(|job| after.is_none_or(|cursor| (job.created_at, job.id.as_uuid()) < cursor))
            .collect();
        page.sort_by_key(|job| std::cmp::Reverse((job.created_at, job.id.as_uuid())));

        Ok(page
            .into_iter()
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    fn list_stale(
        &self,
        state: JobState,
        older_than: Duration,
    ) -> BoxStream<'_, Result<Job, JobStoreError>> {
        futures::stream::once(async move {
            let cutoff = Utc::now()
                - chrono::Duration::from_std(older_than).unwrap_or_else(|_| chrono::Duration::zero());
            let jobs = self.jobs.read().await;

            let mut stale: Vec<Job> = jobs
                .values()
                .filter(|job| job.state == state && job.is_stale_at(cutoff))
                .cloned()
                .collect();
            stale.sort_by_key(|job| (job.liveness_clock(), job.id.as_uuid()));

            futures::stream::iter(stale.into_iter().map(Ok))
        })
        .flatten()
        .boxed()
    }
}
