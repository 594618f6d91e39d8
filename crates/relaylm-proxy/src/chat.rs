//! OpenAI chat completion route.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use relaylm_core::{BackendError, BackendRequest, LogEvent};
use tracing::{debug, error, info};

use crate::chat_stream::{sse_body, translate_stream};
use crate::error::ProxyError;
use crate::models::ChatCompletionRequest;
use crate::ollama_models::GenerateResponse;
use crate::sse::event_stream_response;
use crate::state::ProxyState;
use crate::translate::{CompletionMeta, completion_response, generation_request};

/// `POST /v1/chat/completions` and `POST /chat/completions`.
///
/// The response always echoes the model name the caller asked for, even
/// when the resolver routed the request to another model.
pub async fn chat_completions(State(state): State<ProxyState>, body: Bytes) -> Response {
    match complete(&state, &body).await {
        Ok(response) => response,
        Err(e) => {
            error!("Chat completion failed: {e}");
            e.into_response()
        }
    }
}

async fn complete(state: &ProxyState, body: &[u8]) -> Result<Response, ProxyError> {
    let request: ChatCompletionRequest = serde_json::from_slice(body).map_err(|e| {
        let message = format!("Invalid request body: {e}");
        state.broadcaster.publish(LogEvent::error(message.clone()));
        ProxyError::MalformedInput(message)
    })?;

    let requested = request
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.resolver.default_model().to_string());

    info!(
        model = %requested,
        streaming = %request.stream,
        messages = request.messages.len(),
        "Processing chat completion request"
    );

    let resolution = state.resolver.resolve(&requested).await;
    if resolution.substituted {
        let message = resolution.substitution_message(&state.config.log_page_url());
        state.broadcaster.publish(LogEvent::warning(message));
    }
    debug!(requested = %requested, routed = %resolution.model, "Resolved model");

    let generate = generation_request(&resolution.model, &request.messages, request.stream);
    let backend_request = BackendRequest::post("/api/generate")
        .with_json(&generate)
        .map_err(|e| ProxyError::Internal(e.to_string()))?;

    if request.stream {
        let lines = state.backend.stream(backend_request).await?;
        let frames = translate_stream(
            lines,
            CompletionMeta::new(requested),
            generate.prompt,
            state.broadcaster.clone(),
        );
        return Ok(event_stream_response(sse_body(frames)));
    }

    let value = state.backend.call(backend_request).await?;
    let backend: GenerateResponse = serde_json::from_value(value).map_err(|e| {
        let err = BackendError::MalformedBody(e.to_string());
        state
            .broadcaster
            .publish(LogEvent::error(format!("Error processing response: {err}")));
        err
    })?;
    Ok(Json(completion_response(&requested, &generate.prompt, &backend)).into_response())
}
