use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    cancel_job_handler, create_job_handler, download_audio_handler, health_handler,
    job_status_handler, list_jobs_handler, transcript_handler, upload_handler,
};
use crate::presentation::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let upload_limit = state.settings.storage.max_upload_mb * 1024 * 1024;

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/jobs", post(create_job_handler).get(list_jobs_handler))
        .route("/api/v1/jobs/{job_id}", get(job_status_handler))
        .route("/api/v1/jobs/{job_id}/cancel", post(cancel_job_handler))
        .route("/api/v1/jobs/{job_id}/transcript", get(transcript_handler))
        .route("/api/v1/jobs/{job_id}/audio", get(download_audio_handler))
        .route(
            "/api/v1/uploads",
            post(upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
