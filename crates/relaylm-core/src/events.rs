//! Activity events pushed to live log observers.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag that the log viewer switches on:
//!
//! ```json
//! { "message": "Stream started", "type": "stream_start" }
//! ```

use serde::{Deserialize, Serialize};

/// Category of a [`LogEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Outbound call to the backend (method, URL, body).
    Request,
    /// Successful backend answer.
    Response,
    /// Failure talking to the backend or handling a caller request.
    Error,
    /// Recoverable anomaly, e.g. a model substitution.
    Warning,
    /// A streamed backend response has begun.
    StreamStart,
    /// One text fragment of a streamed backend response.
    StreamChunk,
    /// The streamed backend response has ended.
    StreamEnd,
}

impl LogKind {
    /// Wire name of the kind, as it appears in the `type` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::StreamStart => "stream_start",
            Self::StreamChunk => "stream_chunk",
            Self::StreamEnd => "stream_end",
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single activity log entry.
///
/// Events only exist in transit between a producer and the observers that
/// are subscribed at the moment of publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Human-readable text.
    pub message: String,
    /// Event category.
    #[serde(rename = "type")]
    pub kind: LogKind,
}

impl LogEvent {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    pub fn request(message: impl Into<String>) -> Self {
        Self::new(LogKind::Request, message)
    }

    pub fn response(message: impl Into<String>) -> Self {
        Self::new(LogKind::Response, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogKind::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogKind::Warning, message)
    }

    pub fn stream_start() -> Self {
        Self::new(LogKind::StreamStart, "Stream started")
    }

    pub fn stream_chunk(fragment: impl Into<String>) -> Self {
        Self::new(LogKind::StreamChunk, fragment)
    }

    pub fn stream_end() -> Self {
        Self::new(LogKind::StreamEnd, "Stream completed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(LogEvent::stream_start()).unwrap();
        assert_eq!(json["type"], "stream_start");
        assert_eq!(json["message"], "Stream started");
    }

    #[test]
    fn test_kind_wire_names_match_serde() {
        for kind in [
            LogKind::Request,
            LogKind::Response,
            LogKind::Error,
            LogKind::Warning,
            LogKind::StreamStart,
            LogKind::StreamChunk,
            LogKind::StreamEnd,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }

    #[test]
    fn test_event_deserializes() {
        let event: LogEvent =
            serde_json::from_str(r#"{"message":"hi","type":"warning"}"#).unwrap();
        assert_eq!(event, LogEvent::warning("hi"));
    }
}
