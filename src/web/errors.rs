use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::UpstreamError;

/// Shown instead of upstream error details in production
pub const GENERIC_UPSTREAM_MESSAGE: &str =
    "Azure could not be reached or refused the request. Please try again later.";

/// Error returned by the JSON API
#[derive(Debug)]
pub enum ApiError {
    Upstream(String),
}

impl ApiError {
    /// Wrap an upstream failure, hiding its details in production
    pub fn upstream(err: &UpstreamError, production: bool) -> Self {
        Self::Upstream(upstream_message(err, production))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Upstream(msg) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "Upstream service error",
                    "message": msg,
                    "code": "UPSTREAM_ERROR"
                })),
            )
                .into_response(),
        }
    }
}

/// Message safe to show a user for an upstream failure
pub fn upstream_message(err: &UpstreamError, production: bool) -> String {
    if production {
        return GENERIC_UPSTREAM_MESSAGE.to_string();
    }

    if err.is_auth_failure() {
        format!(
            "{} (run `az login` locally or grant the managed identity Reader access)",
            err
        )
    } else {
        err.to_string()
    }
}
