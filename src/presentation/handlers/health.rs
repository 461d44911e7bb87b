use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::presentation::config::TranscriptionProviderSetting;
use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub scaffold: bool,
    pub backends: BackendsResponse,
}

/// Which adapter serves each port in this process.
#[derive(Serialize)]
pub struct BackendsResponse {
    pub job_store: &'static str,
    pub queue: &'static str,
    pub cache: &'static str,
    pub engine: &'static str,
}

/// Liveness plus the wiring the process started with. Backends are not
/// contacted.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let settings = &state.settings;

    let cache = if !settings.cache.enabled {
        "disabled"
    } else if settings.uses_redis_cache() {
        "redis"
    } else {
        "memory"
    };
    let engine = match settings.transcription.provider {
        TranscriptionProviderSetting::OpenAi if !settings.scaffold.enabled => "openai",
        _ => "mock",
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            scaffold: settings.scaffold.enabled,
            backends: BackendsResponse {
                job_store: if settings.uses_postgres() { "postgres" } else { "memory" },
                queue: if settings.uses_redis_queue() { "redis" } else { "memory" },
                cache,
                engine,
            },
        }),
    )
}
