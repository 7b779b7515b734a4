//! Service-wide error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Every failure a handler or concept operation can surface.
///
/// Concept operations return these directly; infrastructure failures are
/// wrapped in [`ApiError::Internal`] via `anyhow::Context`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request payload itself is malformed or incomplete.
    #[error("{0}")]
    BadInput(String),

    /// The caller is known but not permitted to do this.
    #[error("{0}")]
    NotAllowed(String),

    #[error("{0}")]
    NotFound(String),

    /// A [`NotAllowed`](ApiError::NotAllowed) specialization for resource
    /// ownership checks, keeping the ids for the message.
    #[error("{user} is not the author of {resource} {id}!")]
    AuthorMismatch {
        user: String,
        resource: &'static str,
        id: String,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadInput(_) => StatusCode::BAD_REQUEST,
            Self::NotAllowed(_) | Self::AuthorMismatch { .. } => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if let Self::Internal(err) = &self {
            tracing::error!(error = ?err, "Internal server error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
