//! Model-server port.
//!
//! The proxy reaches the locally hosted model server only through this trait,
//! which keeps the translator and resolver testable without a network.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Lazy sequence of raw backend protocol lines (one JSON document per line).
///
/// Finite: it ends when the backend closes the connection. Not restartable.
pub type LineStream = BoxStream<'static, Result<String, BackendError>>;

/// Errors from a backend call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Connection to the backend could not be established or was lost.
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// The call exceeded its deadline.
    #[error("Backend request timed out: {0}")]
    Timeout(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text, as received.
        body: String,
    },

    /// The backend answered 2xx but the body could not be parsed.
    #[error("Malformed backend response: {0}")]
    MalformedBody(String),
}

impl BackendError {
    /// Returns true if the call failed because its deadline elapsed.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns true for connection-level failures (including timeouts).
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }

    /// Upstream HTTP status, when the backend answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// HTTP verbs the backend API is called with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl BackendMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Parse an upper-case HTTP method name.
    #[must_use]
    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for BackendMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call against the backend API.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub method: BackendMethod,
    /// Path relative to the backend base URL, e.g. `/api/generate`.
    pub path: String,
    /// JSON body, sent as `application/json`.
    pub body: Option<Value>,
    /// Per-call deadline; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Quiet calls skip the request/response activity events.
    pub quiet: bool,
}

impl BackendRequest {
    pub fn new(method: BackendMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            timeout: None,
            quiet: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(BackendMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(BackendMethod::Post, path)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn with_json<T: Serialize>(self, body: &T) -> Result<Self, serde_json::Error> {
        Ok(self.with_body(serde_json::to_value(body)?))
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}

/// Access to the model-serving backend.
///
/// Implementations publish a `request` activity event before dispatching a
/// non-quiet call and a `response` or `error` event once it completes.
#[async_trait]
pub trait BackendPort: Send + Sync + fmt::Debug {
    /// Base URL the backend is reached at.
    fn base_url(&self) -> &str;

    /// Issue a single-shot call and return the parsed JSON body.
    async fn call(&self, request: BackendRequest) -> Result<Value, BackendError>;

    /// Issue a streaming call and return its lines lazily.
    ///
    /// Fails only if the backend cannot be reached or answers non-2xx; errors
    /// after that point surface as items of the returned stream.
    async fn stream(&self, request: BackendRequest) -> Result<LineStream, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = BackendRequest::post("/api/generate")
            .with_json(&serde_json::json!({"model": "m"}))
            .unwrap()
            .with_timeout(Duration::from_secs(5))
            .quiet();

        assert_eq!(req.method, BackendMethod::Post);
        assert_eq!(req.path, "/api/generate");
        assert_eq!(req.body.unwrap()["model"], "m");
        assert_eq!(req.timeout, Some(Duration::from_secs(5)));
        assert!(req.quiet);
    }

    #[test]
    fn test_error_classification() {
        assert!(BackendError::Timeout("t".into()).is_timeout());
        assert!(BackendError::Timeout("t".into()).is_unreachable());
        assert!(!BackendError::Unreachable("u".into()).is_timeout());

        let status = BackendError::Status {
            status: 404,
            body: "model not found".into(),
        };
        assert_eq!(status.status(), Some(404));
        assert_eq!(status.to_string(), "Backend returned 404: model not found");
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(BackendMethod::parse("PUT"), Some(BackendMethod::Put));
        assert_eq!(BackendMethod::parse("PATCH"), None);
        assert_eq!(BackendMethod::Delete.to_string(), "DELETE");
    }
}
