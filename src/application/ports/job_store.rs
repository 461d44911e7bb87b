use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::{InputRef, Job, JobId, JobState, ModelName, TransitionFields};

use super::JobStoreError;

/// Durable record of every transcription job.
///
/// `transition` is the only mutation path. It is a compare-and-set on the
/// stored state (and, when requested, on the claim owner), which is what lets
/// independent workers and the reconciler share jobs without any other lock.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(
        &self,
        input_ref: InputRef,
        model: Option<ModelName>,
        max_attempts: u32,
    ) -> Result<Job, JobStoreError>;

    async fn get(&self, id: JobId) -> Result<Job, JobStoreError>;

    async fn transition(
        &self,
        id: JobId,
        expected: JobState,
        next: JobState,
        fields: TransitionFields,
    ) -> Result<Job, JobStoreError>;

    /// One page of jobs, newest first. `after` is the last id of the previous
    /// page; an id the store does not know is `NotFound`.
    async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, JobStoreError>;

    /// Jobs in `state` whose liveness clock is older than `older_than`: the claim
    /// time for running jobs, the last update for pending ones. Every call starts
    /// a fresh scan.
    fn list_stale(
        &self,
        state: JobState,
        older_than: Duration,
    ) -> BoxStream<'_, Result<Job, JobStoreError>>;
}

/// Keyset page request over all jobs, ordered by creation time descending.
#[derive(Debug, Clone, PartialEq)]
pub struct JobListQuery {
    pub state: Option<JobState>,
    pub after: Option<JobId>,
    pub limit: u32,
}

impl JobListQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    pub fn first_page(limit: u32) -> Self {
        Self {
            state: None,
            after: None,
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for JobListQuery {
    fn default() -> Self {
        Self::first_page(Self::DEFAULT_LIMIT)
    }
}
