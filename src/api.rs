//! ACE HTTP API
//!
//! JSON endpoints over the manager. Every ACE response carries a `success`
//! flag; failures add an `error` string.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness with version and uptime
//! - `GET /ace/status` - Manager status
//! - `POST /ace/{chat_id}/enhance` - Enhanced system prompt for the next turn
//! - `POST /ace/{chat_id}/reflect` - Learn from a finished exchange
//! - `GET /ace/{chat_id}/stats` - Playbook statistics
//! - `GET /ace/{chat_id}/strategies?limit=N` - Most recent strategies
//! - `GET|PUT|DELETE /ace/{chat_id}/playbook` - Export, import, clear

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::ace::{AceError, AceManager, DEFAULT_STRATEGY_LIMIT};
use crate::llm::ChatMessage;
use crate::persistence::PlaybookSnapshotStore;

/// State shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<AceManager>,
    pub snapshots: Option<PlaybookSnapshotStore>,
    pub start_time: Instant,
    pub version: &'static str,
}

impl ApiState {
    pub fn new(manager: Arc<AceManager>) -> Self {
        Self {
            manager,
            snapshots: None,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Delete snapshots as playbooks are cleared
    pub fn with_snapshots(mut self, store: Option<PlaybookSnapshotStore>) -> Self {
        self.snapshots = store;
        self
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Success envelope
#[derive(Debug, Serialize)]
struct Success<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

fn success<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        data,
    })
}

/// Failure envelope with its HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({
                "success": false,
                "error": self.message,
            })),
        )
            .into_response()
    }
}

impl From<AceError> for ApiError {
    fn from(err: AceError) -> Self {
        let status = match err {
            AceError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            AceError::InvalidPlaybook(_) => StatusCode::BAD_REQUEST,
            AceError::LearningAborted(_) | AceError::NoRuntime => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    timestamp: String,
}

/// Request body for `enhance`
#[derive(Debug, Deserialize)]
pub struct EnhanceRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Request body for `reflect`
#[derive(Debug, Deserialize)]
pub struct ReflectRequest {
    pub message: String,
    pub response: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    /// false = queue and return 202 immediately
    #[serde(default = "default_wait")]
    pub wait: bool,
}

fn default_wait() -> bool {
    true
}

/// Query parameters for strategies
#[derive(Debug, Deserialize)]
pub struct StrategiesQuery {
    pub limit: Option<usize>,
}

/// Create the API router
pub fn api_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ace/status", get(status_handler))
        .route("/ace/{chat_id}/enhance", post(enhance_handler))
        .route("/ace/{chat_id}/reflect", post(reflect_handler))
        .route("/ace/{chat_id}/stats", get(stats_handler))
        .route("/ace/{chat_id}/strategies", get(strategies_handler))
        .route(
            "/ace/{chat_id}/playbook",
            get(get_playbook_handler)
                .put(put_playbook_handler)
                .delete(clear_playbook_handler),
        )
        .with_state(state)
}

async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: state.version,
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn status_handler(State(state): State<ApiState>) -> impl IntoResponse {
    success(state.manager.status())
}

async fn enhance_handler(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
    payload: Result<Json<EnhanceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let enhanced = state
        .manager
        .enhance_context(&chat_id, &req.message, &req.history)
        .await?;
    Ok(success(enhanced))
}

async fn reflect_handler(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
    payload: Result<Json<ReflectRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;

    if req.wait {
        let outcome = state
            .manager
            .reflect_and_learn(&chat_id, &req.message, &req.response, &req.history)
            .await?;
        return Ok(success(outcome).into_response());
    }

    // Outcome is logged by the worker; nobody awaits it here
    let _pending =
        state
            .manager
            .schedule_reflection(&chat_id, &req.message, &req.response, &req.history)?;

    Ok((
        StatusCode::ACCEPTED,
        success(serde_json::json!({ "queued": true })),
    )
        .into_response())
}

async fn stats_handler(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
) -> impl IntoResponse {
    success(serde_json::json!({ "stats": state.manager.get_stats(&chat_id) }))
}

async fn strategies_handler(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
    Query(query): Query<StrategiesQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_STRATEGY_LIMIT);
    let strategies = state.manager.get_strategies(&chat_id, limit);
    success(serde_json::json!({
        "count": strategies.len(),
        "strategies": strategies,
    }))
}

async fn get_playbook_handler(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let playbook = state.manager.save_playbook(&chat_id).ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            format!("No playbook for conversation {}", chat_id),
        )
    })?;
    Ok(success(serde_json::json!({ "playbook": playbook })))
}

async fn put_playbook_handler(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(blob) = payload?;
    state
        .manager
        .try_load_playbook(&chat_id, blob)
        .inspect_err(|e| warn!(chat_id = %chat_id, "Rejected playbook upload: {}", e))?;
    Ok(success(serde_json::json!({ "stats": state.manager.get_stats(&chat_id) })))
}

async fn clear_playbook_handler(
    State(state): State<ApiState>,
    Path(chat_id): Path<String>,
) -> impl IntoResponse {
    let cleared = state.manager.clear_playbook(&chat_id);
    if let Some(store) = &state.snapshots {
        // Shutdown pruning retries anything left behind here
        if let Err(e) = store.remove(&chat_id) {
            warn!(chat_id = %chat_id, "Failed to delete playbook snapshot: {}", e);
        }
    }
    success(serde_json::json!({ "cleared": cleared }))
}
