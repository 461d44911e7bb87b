use std::io;

use axum::Json;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::InputRef;
use crate::presentation::state::AppState;

use super::error::{error_response, scheduler_error_response};
use super::jobs::parse_model;

const FILE_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub job_id: String,
    pub input_ref: String,
}

/// Streams the `file` part into the staging store, then enqueues a job for it.
/// `?model=` overrides the engine default for this job.
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_handler(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Response {
    let model = match parse_model(params.model.as_deref()) {
        Ok(model) => model,
        Err(response) => return response,
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                tracing::warn!("Upload request with no file");
                return error_response(StatusCode::BAD_REQUEST, "No file uploaded");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read multipart");
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read multipart: {}", e),
                );
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("audio").to_string();
        let input_ref = InputRef::for_upload(Uuid::new_v4(), &filename);
        tracing::debug!(filename = %filename, input_ref = %input_ref, "Staging upload");

        let stream = field.map_err(io::Error::other).boxed();
        let size = match state.staging_store.store(&input_ref, stream).await {
            Ok(size) => size,
            Err(e) => {
                tracing::error!(error = %e, "Failed to stage upload");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to store file: {}", e),
                );
            }
        };

        if size == 0 {
            discard(&state, &input_ref).await;
            return error_response(StatusCode::BAD_REQUEST, "Uploaded file is empty");
        }

        return match state.scheduler.enqueue(input_ref.clone(), model).await {
            Ok(job_id) => {
                tracing::info!(job_id = %job_id, bytes = size, "Upload accepted");
                (
                    StatusCode::ACCEPTED,
                    Json(UploadResponse {
                        job_id: job_id.to_string(),
                        input_ref: input_ref.to_string(),
                    }),
                )
                    .into_response()
            }
            Err(e) => {
                discard(&state, &input_ref).await;
                scheduler_error_response(&e)
            }
        };
    }
}

async fn discard(state: &AppState, input_ref: &InputRef) {
    if let Err(e) = state.staging_store.delete(input_ref).await {
        tracing::warn!(error = %e, input_ref = %input_ref, "Failed to discard staged upload");
    }
}
