//! Server-Sent Events responses.
//!
//! Two flavours live here: the live activity log (`GET /logs/stream`), built
//! on axum's [`Sse`] with keep-alive pings, and raw `data:` framed bodies for
//! chat and passthrough streams, whose payloads are already encoded.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::state::ProxyState;

/// `GET /logs/stream`: push every [`relaylm_core::LogEvent`] as `data: <json>`.
///
/// Only events published after the observer connects are delivered. The
/// subscription is released when the client disconnects and axum drops the
/// stream.
pub async fn stream_logs(
    State(state): State<ProxyState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let subscription = state.broadcaster.subscribe();
    debug!(
        subscriber = ?subscription.id(),
        observers = state.broadcaster.subscriber_count(),
        "Log observer connected"
    );

    let stream = subscription.filter_map(|event| async move {
        match Event::default().json_data(&event) {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(e) => {
                warn!("Failed to serialize log event: {e}");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

/// Wrap pre-framed SSE bytes into a streaming `text/event-stream` response.
pub fn event_stream_response<S>(body: S) -> Response
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
{
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
