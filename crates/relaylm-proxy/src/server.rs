//! Axum HTTP server for the OpenAI-compatible proxy.
//!
//! This module provides the `serve()` function that runs the proxy server
//! on a pre-bound `TcpListener` until cancelled.

use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::chat::chat_completions;
use crate::cors::{cors_layer, preflight};
use crate::forward::passthrough;
use crate::handlers::{
    catalog, control_model, favicon, generate, list_models, logs_page, refresh_models, root,
};
use crate::sse::stream_logs;
use crate::state::ProxyState;

/// Build the full proxy router.
///
/// Explicit routes take precedence over the `/v1/{*path}` and `/{*path}`
/// passthroughs.
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(root).options(preflight))
        .route("/favicon.ico", get(favicon).options(preflight))
        .route("/health", get(health_check).options(preflight))
        .route("/logs", get(logs_page).options(preflight))
        .route("/logs/stream", get(stream_logs).options(preflight))
        // OpenAI dialect
        .route("/v1/chat/completions", post(chat_completions).options(preflight))
        .route("/chat/completions", post(chat_completions).options(preflight))
        .route("/v1/models", get(list_models).options(preflight))
        .route("/models", get(list_models).options(preflight))
        // Model management
        .route("/api/models", get(catalog).options(preflight))
        .route("/api/models/refresh", post(refresh_models).options(preflight))
        .route("/api/model/control", post(control_model).options(preflight))
        .route("/api/generate", post(generate).options(preflight))
        // Native API passthrough
        .route("/v1/{*path}", any(passthrough))
        .route("/{*path}", any(passthrough))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the proxy on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: ProxyState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(backend = %state.backend.base_url(), "Proxy server starting on {addr}");

    let app = router(state);

    info!("Proxy listening on {addr}");
    info!("Configure OpenAI clients to use: http://{addr}/v1");
    info!("Live logs at http://{addr}/logs");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Proxy server shut down");
    Ok(())
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok"
    }))
}
