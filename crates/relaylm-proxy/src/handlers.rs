//! Model listing, model management and static page routes.
//!
//! The management routes (`/api/models*`, `/api/model/control`,
//! `/api/generate`) talk to the backend with quiet requests and publish their
//! own, more specific activity messages instead of the generic
//! request/response trail.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use bytes::Bytes;
use relaylm_core::{BackendError, BackendRequest, LogEvent};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ProxyError;
use crate::models::{
    CatalogEntry, CatalogResponse, CatalogStatusEntry, ControlResponse, DirectGenerateRequest,
    ModelControlRequest, ModelsResponse,
};
use crate::ollama_models::{GenerateRequest, OllamaShowResponse, OllamaTagsResponse};
use crate::state::ProxyState;
use crate::translate::unix_now;

/// Prompt used to get the backend to load a model into memory.
pub const WARM_UP_PROMPT: &str = "You are a helpful AI assistant.";

const LOGS_PAGE: &str = include_str!("../assets/logs.html");

impl ProxyState {
    /// Publish `message` as an `error` event and turn it into a 500.
    fn fail(&self, message: String) -> ProxyError {
        self.broadcaster.publish(LogEvent::error(message.clone()));
        ProxyError::Internal(message)
    }

    fn parse_body<'a, T>(&self, body: &'a [u8]) -> Result<T, ProxyError>
    where
        T: serde::Deserialize<'a>,
    {
        serde_json::from_slice(body).map_err(|e| {
            let message = format!("Invalid request body: {e}");
            self.broadcaster.publish(LogEvent::error(message.clone()));
            ProxyError::MalformedInput(message)
        })
    }
}

fn parse_tags(value: Value) -> Result<OllamaTagsResponse, BackendError> {
    serde_json::from_value(value).map_err(|e| BackendError::MalformedBody(e.to_string()))
}

/// `GET /v1/models` and `GET /models`: the backend catalog in OpenAI format.
pub async fn list_models(
    State(state): State<ProxyState>,
) -> Result<Json<ModelsResponse>, ProxyError> {
    debug!("GET /v1/models");
    let value = state.backend.call(BackendRequest::get("/api/tags")).await?;
    let tags = parse_tags(value)?;
    Ok(Json(ModelsResponse::from_names(tags.names(), unix_now())))
}

/// `GET /api/models`: raw catalog entries, without running status.
pub async fn catalog(
    State(state): State<ProxyState>,
) -> Result<Json<CatalogResponse<CatalogEntry>>, ProxyError> {
    let tags = state.resolver.catalog().await.map_err(|e| {
        state.fail(match e {
            BackendError::Status { status, body } => {
                format!("Failed to get models list: {status} - {body}")
            }
            other => format!("Error getting models: {other}"),
        })
    })?;

    let models = tags
        .models
        .into_iter()
        .map(|m| CatalogEntry {
            name: m.name,
            details: m.details,
        })
        .collect();
    Ok(Json(CatalogResponse { models }))
}

/// `POST /api/models/refresh`: catalog entries with a best-effort running flag.
///
/// The flag comes from the backend's currently-loaded-model probe. When the
/// probe fails, the last known status from the memo is reported instead.
pub async fn refresh_models(
    State(state): State<ProxyState>,
) -> Result<Json<CatalogResponse<CatalogStatusEntry>>, ProxyError> {
    let tags = state.resolver.catalog().await.map_err(|e| match e {
        BackendError::Status { .. } => ProxyError::Internal("Failed to get models list".into()),
        other => state.fail(format!("Error refreshing models: {other}")),
    })?;

    state
        .broadcaster
        .publish(LogEvent::request("Checking which model is currently loaded"));

    let probe = state
        .backend
        .call(
            BackendRequest::get("/api/show")
                .with_timeout(state.config.probe_timeout)
                .quiet(),
        )
        .await
        .and_then(|value| {
            serde_json::from_value::<OllamaShowResponse>(value)
                .map_err(|e| BackendError::MalformedBody(e.to_string()))
        });

    let current = match probe {
        Ok(show) => {
            let current = show.loaded_model().map(str::to_string);
            if let Some(name) = &current {
                state
                    .broadcaster
                    .publish(LogEvent::request(format!("Currently loaded model: {name}")));
            }
            Some(current)
        }
        Err(e) => {
            warn!(error = %e, "Error checking loaded model");
            None
        }
    };

    let models = tags
        .models
        .into_iter()
        .map(|m| {
            let running = match &current {
                Some(loaded) => loaded.as_deref() == Some(m.name.as_str()),
                None => state.model_status(&m.name).unwrap_or(false),
            };
            state.set_model_status(&m.name, running);
            CatalogStatusEntry {
                name: m.name,
                running,
                details: m.details,
            }
        })
        .collect();

    Ok(Json(CatalogResponse { models }))
}

/// `POST /api/model/control`: `{"model": ..., "action": "start"}`.
///
/// Starting a model issues a throwaway generation. A timeout is reported as
/// `202 pending` since the first load of a large model often outlasts it.
pub async fn control_model(State(state): State<ProxyState>, body: Bytes) -> Response {
    match control(&state, &body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn control(state: &ProxyState, body: &[u8]) -> Result<Response, ProxyError> {
    let request: ModelControlRequest = state.parse_body(body)?;
    if request.action.as_deref() != Some("start") {
        return Err(ProxyError::MalformedInput("Invalid action".into()));
    }
    let Some(model) = request.model.filter(|m| !m.is_empty()) else {
        return Err(ProxyError::MalformedInput("Missing model name".into()));
    };

    info!(model = %model, "Starting model");
    state
        .broadcaster
        .publish(LogEvent::request(format!("Starting model: {model}")));

    let warm_up = GenerateRequest {
        model: model.clone(),
        prompt: WARM_UP_PROMPT.to_string(),
        stream: false,
    };
    let request = BackendRequest::post("/api/generate")
        .with_json(&warm_up)
        .map_err(|e| ProxyError::Internal(e.to_string()))?
        .with_timeout(state.config.generate_timeout)
        .quiet();

    match state.backend.call(request).await {
        Ok(_) => {
            state.set_model_status(&model, true);
            let message = format!("Model {model} start request sent");
            state.broadcaster.publish(LogEvent::response(message.clone()));
            Ok(Json(ControlResponse::success(message)).into_response())
        }
        Err(BackendError::Timeout(_)) => {
            let message =
                format!("Timeout while starting model {model}. This is normal for the first load.");
            state.broadcaster.publish(LogEvent::error(message.clone()));
            Ok((StatusCode::ACCEPTED, Json(ControlResponse::pending(message))).into_response())
        }
        Err(BackendError::Status { status, body }) => {
            Err(state.fail(format!("Failed to start model: {status} - {body}")))
        }
        Err(e) => Err(state.fail(format!("Error controlling model: {e}"))),
    }
}

/// `POST /api/generate`: direct non-streaming generation.
pub async fn generate(
    State(state): State<ProxyState>,
    body: Bytes,
) -> Result<Json<Value>, ProxyError> {
    let request: DirectGenerateRequest = state.parse_body(&body)?;
    let (Some(model), Some(prompt)) = (
        request.model.filter(|m| !m.is_empty()),
        request.prompt.filter(|p| !p.is_empty()),
    ) else {
        return Err(ProxyError::MalformedInput(
            "Missing model name or prompt".into(),
        ));
    };

    state
        .broadcaster
        .publish(LogEvent::request(format!("Sending query to model {model}")));

    let request = BackendRequest::post("/api/generate")
        .with_json(&GenerateRequest {
            model,
            prompt,
            stream: false,
        })
        .map_err(|e| ProxyError::Internal(e.to_string()))?
        .with_timeout(state.config.generate_timeout)
        .quiet();

    match state.backend.call(request).await {
        Ok(value) => {
            debug!("Got response from model");
            Ok(Json(value))
        }
        Err(BackendError::Status { status, body }) => {
            Err(state.fail(format!("Error from Ollama: {status} - {body}")))
        }
        Err(e) => Err(state.fail(format!("Error generating response: {e}"))),
    }
}

/// `GET /`
pub async fn root() -> Redirect {
    Redirect::to("/logs")
}

/// `GET /logs`: live log viewer.
pub async fn logs_page() -> Html<&'static str> {
    Html(LOGS_PAGE)
}

/// `GET /favicon.ico`
pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}
