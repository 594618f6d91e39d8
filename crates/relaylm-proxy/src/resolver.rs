//! Model name resolution against the backend catalog.
//!
//! Clients are often configured with a model name that the backend no
//! longer has. Rather than failing the request, the resolver substitutes the
//! first installed model, and falls back to a fixed default when the catalog
//! cannot be read at all.

use std::sync::Arc;
use std::time::Duration;

use relaylm_core::{BackendError, BackendPort, BackendRequest};
use tracing::{debug, warn};

use crate::ollama_models::OllamaTagsResponse;

/// Outcome of [`ModelResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Model name to send to the backend.
    pub model: String,
    /// Name the caller asked for.
    pub requested: String,
    /// The requested model was missing and a catalog entry replaced it.
    pub substituted: bool,
    /// The catalog was unavailable or empty and the default was used.
    pub fell_back: bool,
}

impl Resolution {
    /// Text of the warning surfaced when a substitution happened.
    pub fn substitution_message(&self, log_page_url: &str) -> String {
        format!(
            "Model '{}' not found. Using '{}' instead. View available models at {log_page_url}",
            self.requested, self.model
        )
    }
}

/// Resolves requested model names against the backend's `/api/tags`.
#[derive(Debug, Clone)]
pub struct ModelResolver {
    backend: Arc<dyn BackendPort>,
    default_model: String,
    timeout: Duration,
}

impl ModelResolver {
    pub fn new(
        backend: Arc<dyn BackendPort>,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            default_model: default_model.into(),
            timeout,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Fetch the current catalog in backend order.
    pub async fn catalog(&self) -> Result<OllamaTagsResponse, BackendError> {
        let value = self
            .backend
            .call(
                BackendRequest::get("/api/tags")
                    .with_timeout(self.timeout)
                    .quiet(),
            )
            .await?;
        serde_json::from_value(value).map_err(|e| BackendError::MalformedBody(e.to_string()))
    }

    /// Pick the model to use for `requested`. Never fails.
    pub async fn resolve(&self, requested: &str) -> Resolution {
        let names = match self.catalog().await {
            Ok(tags) => tags.names(),
            Err(e) => {
                warn!(error = %e, "Error getting models list; using default model");
                return self.fallback(requested);
            }
        };

        if names.iter().any(|name| name == requested) {
            debug!(model = %requested, "Requested model is available");
            return Resolution {
                model: requested.to_string(),
                requested: requested.to_string(),
                substituted: false,
                fell_back: false,
            };
        }

        match names.into_iter().next() {
            Some(first) => Resolution {
                model: first,
                requested: requested.to_string(),
                substituted: true,
                fell_back: false,
            },
            None => {
                warn!("No models available from Ollama; using default model");
                self.fallback(requested)
            }
        }
    }

    fn fallback(&self, requested: &str) -> Resolution {
        Resolution {
            model: self.default_model.clone(),
            requested: requested.to_string(),
            substituted: false,
            fell_back: true,
        }
    }
}
