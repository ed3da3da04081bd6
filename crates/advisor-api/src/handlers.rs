//! Route handlers for the stateless `/api` surface.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use advisor_chat::{ChatReply, HealthReport, HistoryView, IssuedToken};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Chat
// =============================================================================

/// Request body for POST /api/chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: String,
}

/// POST /api/chat - run one query and wait for the answer.
///
/// Upstream failures still answer 200 with fallback text.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(body) = body?;
    let reply = state.gateway.chat(&body.query).await?;
    Ok(Json(reply))
}

// =============================================================================
// History
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// GET /api/history?limit=N
pub async fn history(
    State(state): State<AppState>,
    params: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryView>, ApiError> {
    let Query(params) = params?;
    Ok(Json(state.gateway.history(params.limit)))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryResponse {
    pub message: String,
    pub cleared_entries: usize,
    pub timestamp: DateTime<Utc>,
}

/// DELETE /api/history
pub async fn clear_history(State(state): State<AppState>) -> Json<ClearHistoryResponse> {
    let cleared = state.gateway.clear_history();
    Json(ClearHistoryResponse {
        message: "Chat history cleared successfully".to_string(),
        cleared_entries: cleared,
        timestamp: Utc::now(),
    })
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedToken> for LoginResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            username: issued.username,
            message: "Login successful".to_string(),
            expires_at: issued.expires_at,
        }
    }
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(body) = body?;
    state
        .tokens
        .login(&body.username, &body.password)
        .map(|issued| Json(issued.into()))
        .ok_or_else(|| ApiError::Unauthorized("Invalid username or password".to_string()))
}

// =============================================================================
// Inventory
// =============================================================================

/// GET /api/assets
pub async fn assets(State(state): State<AppState>) -> Json<Value> {
    Json(state.gateway.assets().await)
}

/// GET /api/outages
pub async fn outages(State(state): State<AppState>) -> Json<Value> {
    Json(state.gateway.outages().await)
}

// =============================================================================
// Health & status
// =============================================================================

/// GET /api/health - public liveness plus upstream reachability.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.gateway.health().await)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub application: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub active_tokens: usize,
    pub endpoints: Value,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        application: "Advisor Gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.gateway.active_sessions(),
        active_tokens: state.tokens.active_tokens(),
        endpoints: serde_json::json!({
            "websocket": "/ws",
            "chat": "POST /api/chat",
            "history": "GET /api/history",
            "clearHistory": "DELETE /api/history",
            "login": "POST /api/login",
            "assets": "GET /api/assets",
            "outages": "GET /api/outages",
            "health": "GET /api/health",
        }),
        timestamp: Utc::now(),
    })
}
