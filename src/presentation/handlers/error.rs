use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::ports::{BrokerError, JobStoreError};
use crate::application::services::SchedulerError;
use crate::domain::JobId;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

pub fn parse_job_id(raw: &str) -> Result<JobId, Response> {
    raw.parse::<JobId>()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, format!("Invalid job ID: {}", raw)))
}

/// Outages surface as 503 only once the retry budget is spent.
pub fn scheduler_error_response(e: &SchedulerError) -> Response {
    let status = match e {
        SchedulerError::NotCancellable { .. } => StatusCode::CONFLICT,
        SchedulerError::Store(JobStoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        SchedulerError::Store(JobStoreError::Conflict { .. }) => StatusCode::CONFLICT,
        SchedulerError::Store(JobStoreError::Unavailable(_))
        | SchedulerError::Broker(BrokerError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(error = %e, "Request failed");
    }

    error_response(status, e.to_string())
}
