//! HTTP error mapping for the proxy routes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relaylm_core::BackendError;
use serde::Serialize;
use thiserror::Error;

use crate::models::ErrorResponse;

/// Errors surfaced by the chat and management routes.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing or invalid caller input.
    #[error("{0}")]
    MalformedInput(String),

    /// Backend failure, reported with the backend's own message.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Anything else, with a message ready for the caller.
    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Self::Backend(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{"error": "<message>"}`
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Errors surfaced by the catch-all passthrough, in OpenAI error format.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PassthroughError(#[from] pub ProxyError);

impl IntoResponse for PassthroughError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        (status, Json(ErrorResponse::invalid_request(self.0.to_string()))).into_response()
    }
}
