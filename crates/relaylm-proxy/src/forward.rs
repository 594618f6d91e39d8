//! Passthrough of unrecognised routes to the backend's native API.
//!
//! `/v1/<path>` and `/<path>` map onto `/api/<path>`. Streaming requests
//! (JSON body with `"stream": true`) get the backend's NDJSON lines re-emitted
//! as SSE events, terminated by `[DONE]`.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use relaylm_core::{BackendMethod, BackendRequest, LineStream};
use serde_json::Value;
use tracing::{debug, error};

use crate::cors::preflight_response;
use crate::error::{PassthroughError, ProxyError};
use crate::models::ErrorResponse;
use crate::sse::event_stream_response;
use crate::state::ProxyState;

/// Catch-all handler for `/v1/{*path}` and `/{*path}`.
pub async fn passthrough(
    State(state): State<ProxyState>,
    method: Method,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return preflight_response();
    }

    let Some(backend_method) = BackendMethod::parse(method.as_str()) else {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(ErrorResponse::invalid_request(format!(
                "Method {method} not allowed"
            ))),
        )
            .into_response();
    };

    match forward(&state, backend_method, &path, &headers, &body).await {
        Ok(response) => response,
        Err(e) => {
            error!(path = %path, "Passthrough failed: {e}");
            e.into_response()
        }
    }
}

async fn forward(
    state: &ProxyState,
    method: BackendMethod,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, PassthroughError> {
    let json_body = json_body(headers, body)?;
    let streaming = json_body
        .as_ref()
        .and_then(|b| b.get("stream"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let backend_path = format!("/api/{}", path.trim_start_matches('/'));
    debug!(method = %method, path = %backend_path, streaming, "Forwarding to backend");

    let mut request = BackendRequest::new(method, backend_path);
    if let Some(body) = json_body {
        request = request.with_body(body);
    }

    if streaming {
        let lines = state.backend.stream(request).await.map_err(ProxyError::from)?;
        return Ok(event_stream_response(reemit_lines(lines)));
    }

    let value = state.backend.call(request).await.map_err(ProxyError::from)?;
    Ok(Json(value).into_response())
}

/// The request body as JSON, when the caller declared it as such.
fn json_body(headers: &HeaderMap, body: &[u8]) -> Result<Option<Value>, ProxyError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json || body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ProxyError::MalformedInput(format!("Invalid JSON body: {e}")))
}

/// Each parseable line → `data: <json>\n\n`, then `data: [DONE]\n\n`.
///
/// Unparseable lines are skipped. A backend error cuts the body short, with
/// no `[DONE]`.
fn reemit_lines(
    lines: LineStream,
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    stream::unfold((lines, false), |(mut lines, finished)| async move {
        if finished {
            return None;
        }
        loop {
            match lines.next().await {
                Some(Ok(line)) => {
                    let Ok(json) = serde_json::from_str::<Value>(&line) else {
                        continue;
                    };
                    let event = Bytes::from(format!("data: {json}\n\n"));
                    return Some((Ok(event), (lines, false)));
                }
                Some(Err(e)) => return Some((Err(std::io::Error::other(e)), (lines, true))),
                None => {
                    let done = Bytes::from_static(b"data: [DONE]\n\n");
                    return Some((Ok(done), (lines, true)));
                }
            }
        }
    })
}
