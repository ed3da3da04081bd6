//! Bearer token middleware for protected endpoints.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// A header that is present but not a bearer credential yields `Some("")`,
/// which the authenticator rejects.
pub fn bearer_token(req: &Request) -> Option<&str> {
    req.headers().get(AUTHORIZATION).map(|value| {
        value
            .to_str()
            .ok()
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)
            .unwrap_or_default()
    })
}

/// Middleware that validates Bearer token authentication.
///
/// Returns 401 with a JSON body if the header is missing or the token is
/// unknown or expired.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match state.gateway.authorize(bearer_token(&req)) {
        Ok(()) => next.run(req).await,
        Err(e) => {
            tracing::debug!(error = %e, path = %req.uri().path(), "Rejected request");
            ApiError::from(e).into_response()
        }
    }
}
