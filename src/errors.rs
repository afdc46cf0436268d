//! Error taxonomy for the HTTP surface.
//!
//! Every failure leaving the endpoint layer is an [`ApiError`], rendered as a
//! JSON body with a single human-readable `detail` string. Provider failures
//! keep their underlying message verbatim; nothing is retried here beyond the
//! fallback the orchestrator already performs.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::provider::ProviderError;

/// Errors surfaced by the generation endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The process is missing configuration it needs to serve the request
    /// (no API key, no provider client). Maps to 500.
    #[error("{0}")]
    Configuration(String),
    /// The caller sent an invalid request (blank prompt, unknown model,
    /// undecodable reference image). Maps to 400 and is never retried.
    #[error("{0}")]
    Validation(String),
    /// A failure from the generation provider, after the fallback policy has
    /// already run its course. Maps to 500.
    #[error("Image generation failed: {0}")]
    Provider(#[from] ProviderError),
    /// Anything else. Maps to 500 with the message surfaced verbatim.
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl ApiError {
    /// The HTTP status this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) | Self::Provider(_) | Self::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(%status, detail = %self, "request failed");
        } else {
            tracing::debug!(%status, detail = %self, "request rejected");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
