use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{JobListQuery, JobStore, JobStoreError};
use crate::domain::{
    ClaimUpdate, InputRef, Job, JobId, JobState, ModelName, TransitionFields, WorkerId,
};

const JOB_COLUMNS: &str = "id, state, input_ref, model, attempt_count, max_attempts, result, error, \
     claimed_by, claimed_at, cancel_requested, created_at, updated_at";

const STALE_PAGE_SIZE: i64 = 100;

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: JobId) -> Result<bool, JobStoreError> {
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM transcription_jobs WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(found.is_some())
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    state: String,
    input_ref: String,
    model: Option<String>,
    attempt_count: i32,
    max_attempts: i32,
    result: Option<String>,
    error: Option<String>,
    claimed_by: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
    cancel_requested: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = JobStoreError;

    fn try_from(r: JobRow) -> Result<Self, Self::Error> {
        let state = r.state.parse::<JobState>().map_err(JobStoreError::Corrupt)?;
        let attempt_count = u32::try_from(r.attempt_count)
            .map_err(|e| JobStoreError::Corrupt(format!("attempt_count: {}", e)))?;
        let max_attempts = u32::try_from(r.max_attempts)
            .map_err(|e| JobStoreError::Corrupt(format!("max_attempts: {}", e)))?;
        let model = r
            .model
            .map(|m| m.parse::<ModelName>())
            .transpose()
            .map_err(|e| JobStoreError::Corrupt(format!("model: {}", e)))?;

        Ok(Job {
            id: JobId::from_uuid(r.id),
            state,
            input_ref: InputRef::from_raw(r.input_ref),
            model,
            attempt_count,
            max_attempts,
            result: r.result,
            error: r.error,
            claimed_by: r.claimed_by.map(WorkerId::from_raw),
            claimed_at: r.claimed_at,
            cancel_requested: r.cancel_requested,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn map_sqlx_error(e: sqlx::Error) -> JobStoreError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => JobStoreError::Unavailable(e.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            JobStoreError::Corrupt(e.to_string())
        }
        other => JobStoreError::QueryFailed(other.to_string()),
    }
}

fn claim_mode(claim: &ClaimUpdate) -> (&'static str, Option<&str>) {
    match claim {
        ClaimUpdate::Keep => ("keep", None),
        ClaimUpdate::Set(worker) => ("set", Some(worker.as_str())),
        ClaimUpdate::Clear => ("clear", None),
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    #[instrument(skip(self, input_ref))]
    async fn create(
        &self,
        input_ref: InputRef,
        model: Option<ModelName>,
        max_attempts: u32,
    ) -> Result<Job, JobStoreError> {
        let job = Job::new(input_ref, max_attempts).with_model(model);

        sqlx::query(
            r#"
            INSERT INTO transcription_jobs
                (id, state, input_ref, model, attempt_count, max_attempts, cancel_requested, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.state.as_str())
        .bind(job.input_ref.as_str())
        .bind(job.model.as_ref().map(ModelName::as_str))
        .bind(job.attempt_count as i32)
        .bind(job.max_attempts as i32)
        .bind(job.cancel_requested)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        tracing::debug!(job_id = %job.id, "Job record created");
        Ok(job)
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn get(&self, id: JobId) -> Result<Job, JobStoreError> {
        let sql = format!("SELECT {} FROM transcription_jobs WHERE id = $1", JOB_COLUMNS);

        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(r) => Job::try_from(r),
            None => Err(JobStoreError::NotFound(id)),
        }
    }

    #[instrument(skip(self, fields), fields(job_id = %id, expected = %expected, next = %next))]
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

        let (claim_mode, claim_worker) = claim_mode(&fields.claim);
        let sql = format!(
            r#"
            UPDATE transcription_jobs
            SET state = $3,
                attempt_count = attempt_count + CASE WHEN $4 THEN 1 ELSE 0 END,
                claimed_by = CASE $5 WHEN 'set' THEN $6 WHEN 'clear' THEN NULL ELSE claimed_by END,
                claimed_at = CASE $5 WHEN 'set' THEN $7 WHEN 'clear' THEN NULL ELSE claimed_at END,
                result = COALESCE($8, result),
                error = COALESCE($9, error),
                cancel_requested = cancel_requested OR $10,
                updated_at = $7
            WHERE id = $1
              AND state = $2
              AND ($11::TEXT IS NULL OR claimed_by = $11)
              AND (NOT $4 OR attempt_count < max_attempts)
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .bind(next.as_str())
            .bind(fields.increment_attempts)
            .bind(claim_mode)
            .bind(claim_worker)
            .bind(Utc::now())
            .bind(fields.result.as_deref())
            .bind(fields.error.as_deref())
            .bind(fields.request_cancel)
            .bind(fields.require_owner.as_ref().map(WorkerId::as_str))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(r) => Job::try_from(r),
            None if self.exists(id).await? => Err(JobStoreError::Conflict { id, expected }),
            None => Err(JobStoreError::NotFound(id)),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, JobStoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM transcription_jobs
            WHERE ($1::TEXT IS NULL OR state = $1)
              AND ($2::UUID IS NULL
                   OR (created_at, id) < (SELECT created_at, id FROM transcription_jobs WHERE id = $2))
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
            JOB_COLUMNS
        );

        let rows: Vec<JobRow> = sqlx::query_as(&sql)
            .bind(query.state.map(|state| state.as_str()))
            .bind(query.after.map(|id| id.as_uuid()))
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            if let Some(after) = query.after {
                if !self.exists(after).await? {
                    return Err(JobStoreError::NotFound(after));
                }
            }
        }

        rows.into_iter().map(Job::try_from).collect()
    }

    fn list_stale(
        &self,
        state: JobState,
        older_than: Duration,
    ) -> BoxStream<'_, Result<Job, JobStoreError>> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than).unwrap_or_else(|_| chrono::Duration::zero());

        let scan = StaleScan {
            pool: self.pool.clone(),
            state,
            cutoff,
            after: None,
            exhausted: false,
        };

        futures::stream::try_unfold(scan, |scan| scan.next_page())
            .map_ok(|jobs| futures::stream::iter(jobs.into_iter().map(Ok::<Job, JobStoreError>)))
            .try_flatten()
            .boxed()
    }
}

/// Keyset-paginated scan over stale jobs. Pages are fetched on demand, so rows
/// repaired while the scan runs simply drop out of later pages.
struct StaleScan {
    pool: PgPool,
    state: JobState,
    cutoff: DateTime<Utc>,
    after: Option<(DateTime<Utc>, Uuid)>,
    exhausted: bool,
}

impl StaleScan {
    fn clock_column(&self) -> &'static str {
        match self.state {
            JobState::Running => "claimed_at",
            _ => "updated_at",
        }
    }

    async fn next_page(mut self) -> Result<Option<(Vec<Job>, Self)>, JobStoreError> {
        if self.exhausted {
            return Ok(None);
        }

        let clock = self.clock_column();
        let sql = format!(
            r#"
            SELECT {columns}
            FROM transcription_jobs
            WHERE state = $1
              AND {clock} < $2
              AND ($3::TIMESTAMPTZ IS NULL OR ({clock}, id) > ($3, $4::UUID))
            ORDER BY {clock} ASC, id ASC
            LIMIT $5
            "#,
            columns = JOB_COLUMNS,
            clock = clock
        );

        let rows: Vec<JobRow> = sqlx::query_as(&sql)
            .bind(self.state.as_str())
            .bind(self.cutoff)
            .bind(self.after.map(|(at, _)| at))
            .bind(self.after.map(|(_, id)| id))
            .bind(STALE_PAGE_SIZE)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if rows.len() < STALE_PAGE_SIZE as usize {
            self.exhausted = true;
        }
        if rows.is_empty() {
            return Ok(None);
        }

        let jobs = rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(last) = jobs.last() {
            self.after = Some((last.liveness_clock(), last.id.as_uuid()));
        }

        Ok(Some((jobs, self)))
    }
}
