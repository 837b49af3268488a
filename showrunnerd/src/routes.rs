//! Control surface routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use showrunner_engine::{EngineError, ShowRunner};
use showrunner_protocol::{ShowConfig, DEFAULT_MAX_DURATION_SECS};

const API_KEY_HEADER: &str = "x-api-key";

/// Shared daemon state handed to every route.
pub struct AppState {
    pub runner: ShowRunner,
    pub api_key: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/start-show", post(start_show))
        .route("/add-video", post(add_video))
        .route("/stop-show", post(stop_show))
        .route("/state", get(show_state))
        .with_state(state)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented == Some(state.api_key.as_str()) {
        return Ok(());
    }
    warn!("Request refused, bad or missing api key");
    Err((
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "invalid api key" })),
    )
        .into_response())
}

#[derive(Deserialize)]
struct StartShowRequest {
    show_id: String,

    #[serde(default = "default_max_duration")]
    max_duration_secs: u64,

    #[serde(default)]
    videos: Vec<String>,

    #[serde(default)]
    record: bool,
}

fn default_max_duration() -> u64 {
    DEFAULT_MAX_DURATION_SECS
}

#[derive(Deserialize)]
struct AddVideoRequest {
    reference: String,
}

async fn start_show(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<StartShowRequest>,
) -> Response {
    if let Err(refused) = authorize(&state, &headers) {
        return refused;
    }

    let config = ShowConfig {
        show_id: request.show_id,
        max_duration_secs: request.max_duration_secs,
        videos: request.videos,
        record: request.record,
    };

    match state.runner.start(config) {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "started": true }))).into_response(),
        Err(e @ EngineError::AlreadyActive) => {
            (StatusCode::CONFLICT, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn add_video(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AddVideoRequest>,
) -> Response {
    if let Err(refused) = authorize(&state, &headers) {
        return refused;
    }

    let accepted = state.runner.add_video(&request.reference);
    let status = if accepted {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    (status, Json(json!({ "accepted": accepted }))).into_response()
}

async fn stop_show(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(refused) = authorize(&state, &headers) {
        return refused;
    }

    state.runner.stop();
    (StatusCode::ACCEPTED, Json(json!({ "stopping": true }))).into_response()
}

async fn show_state(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(refused) = authorize(&state, &headers) {
        return refused;
    }

    Json(json!({
        "state": state.runner.state(),
        "queued": state.runner.queue_len(),
        "elapsed_secs": state.runner.elapsed().map(|elapsed| elapsed.as_secs()),
    }))
    .into_response()
}
