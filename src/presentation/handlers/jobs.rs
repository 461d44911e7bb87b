use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::ports::{JobListQuery, JobStoreError, StagingStoreError};
use crate::application::services::SchedulerError;
use crate::domain::{InputRef, Job, JobState, ModelName};
use crate::presentation::state::AppState;

use super::error::{error_response, parse_job_id, scheduler_error_response};

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub input_ref: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsParams {
    pub state: Option<String>,
    pub after: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    /// Cursor for the next page; absent on the last one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_after: Option<String>,
}

#[derive(Serialize)]
pub struct JobCreatedResponse {
    pub job_id: String,
}

#[derive(Serialize)]
pub struct JobResponse {
    pub id: String,
    pub state: String,
    pub input_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id.to_string(),
            state: job.state.as_str().to_string(),
            input_ref: job.input_ref.to_string(),
            model: job.model.map(|m| m.to_string()),
            attempt_count: job.attempt_count,
            max_attempts: job.max_attempts,
            result: job.result,
            error: job.error,
            cancel_requested: job.cancel_requested,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct TranscriptResponse {
    pub job_id: String,
    pub transcript: String,
}

#[tracing::instrument(skip(state, request))]
pub async fn create_job_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Response {
    let input_ref = request.input_ref.trim();
    if input_ref.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "input_ref must not be empty");
    }
    let model = match parse_model(request.model.as_deref()) {
        Ok(model) => model,
        Err(response) => return response,
    };

    match state
        .scheduler
        .enqueue(InputRef::from_raw(input_ref), model)
        .await
    {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(JobCreatedResponse {
                job_id: job_id.to_string(),
            }),
        )
            .into_response(),
        Err(e) => scheduler_error_response(&e),
    }
}

#[tracing::instrument(skip(state))]
pub async fn job_status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    let id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.scheduler.get(id).await {
        Ok(job) => (StatusCode::OK, Json(JobResponse::from(job))).into_response(),
        Err(e) => scheduler_error_response(&e),
    }
}

#[tracing::instrument(skip(state))]
pub async fn cancel_job_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    let id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.scheduler.cancel(id).await {
        Ok(job) => (StatusCode::OK, Json(JobResponse::from(job))).into_response(),
        Err(e) => scheduler_error_response(&e),
    }
}

#[tracing::instrument(skip(state))]
pub async fn transcript_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    let id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.scheduler.transcript(id).await {
        Ok(Some(transcript)) => (
            StatusCode::OK,
            Json(TranscriptResponse {
                job_id: id.to_string(),
                transcript,
            }),
        )
            .into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("No transcript available for job {}", id),
        ),
        Err(e) => scheduler_error_response(&e),
    }
}

/// Newest first. `after` is the id of the last job on the previous page.
#[tracing::instrument(skip(state))]
pub async fn list_jobs_handler(
    State(state): State<AppState>,
    Query(params): Query<ListJobsParams>,
) -> Response {
    let mut query = JobListQuery::first_page(params.limit.unwrap_or(JobListQuery::DEFAULT_LIMIT));

    if let Some(raw) = params.state.as_deref() {
        match raw.parse::<JobState>() {
            Ok(job_state) => query.state = Some(job_state),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        }
    }
    if let Some(raw) = params.after.as_deref() {
        match parse_job_id(raw) {
            Ok(id) => query.after = Some(id),
            Err(response) => return response,
        }
    }

    match state.scheduler.list(&query).await {
        Ok(jobs) => {
            let next_after = if jobs.len() == query.limit as usize {
                jobs.last().map(|job| job.id.to_string())
            } else {
                None
            };
            (
                StatusCode::OK,
                Json(JobListResponse {
                    jobs: jobs.into_iter().map(JobResponse::from).collect(),
                    next_after,
                }),
            )
                .into_response()
        }
        Err(SchedulerError::Store(JobStoreError::NotFound(id))) => error_response(
            StatusCode::BAD_REQUEST,
            format!("Unknown cursor: {}", id),
        ),
        Err(e) => scheduler_error_response(&e),
    }
}

/// Streams back the staged audio a job was submitted with.
#[tracing::instrument(skip(state))]
pub async fn download_audio_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    let id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let job = match state.scheduler.get(id).await {
        Ok(job) => job,
        Err(e) => return scheduler_error_response(&e),
    };

    match state.staging_store.fetch(&job.input_ref).await {
        Ok(data) => {
            let filename = job
                .input_ref
                .as_str()
                .rsplit('/')
                .next()
                .unwrap_or("audio")
                .replace('"', "");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", filename),
                    ),
                ],
                data,
            )
                .into_response()
        }
        Err(StagingStoreError::NotFound(_)) => error_response(
            StatusCode::NOT_FOUND,
            format!("Audio for job {} is no longer staged", id),
        ),
        Err(e) => {
            tracing::error!(error = %e, job_id = %id, "Failed to fetch staged audio");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch audio: {}", e),
            )
        }
    }
}

/// Blank means the engine default.
pub(super) fn parse_model(raw: Option<&str>) -> Result<Option<ModelName>, Response> {
    match raw.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m
            .parse::<ModelName>()
            .map(Some)
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Invalid model: {}", e))),
        None => Ok(None),
    }
}
