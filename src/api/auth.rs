//! Shared-secret authorization

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::api::server::AppState;
use crate::error::ApiError;

/// Reject requests whose `Authorization` header is not the configured password
pub async fn require_authorization(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if provided != Some(state.config.server.password.as_str()) {
        tracing::warn!(
            path = %request.uri().path(),
            "Rejected request with {} authorization",
            if provided.is_some() { "invalid" } else { "missing" }
        );
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}
