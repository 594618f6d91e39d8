//! Ollama-native API data models.
//!
//! Only the fields the proxy reads or writes are modelled; everything else
//! the backend sends is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

/// Non-streaming `/api/generate` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    /// Generated text; missing means empty.
    #[serde(default)]
    pub response: String,
}

/// One NDJSON line of a streaming `/api/generate` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateStreamLine {
    /// Text fragment carried by this line, if any.
    #[serde(default)]
    pub response: Option<String>,
    /// Set on the backend's final line.
    #[serde(default)]
    pub done: bool,
}

/// `GET /api/tags` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaTagsResponse {
    #[serde(default)]
    pub models: Vec<OllamaTagModel>,
}

impl OllamaTagsResponse {
    /// Model names in the order the backend reported them.
    pub fn names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }
}

/// One installed model as listed by `/api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaTagModel {
    #[serde(default)]
    pub name: String,
    /// Family, format, parameter size, quantization... passed through verbatim.
    #[serde(default = "empty_object")]
    pub details: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// The subset of `GET /api/show` used to find the loaded model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaShowResponse {
    #[serde(default)]
    pub model: Option<OllamaShowModel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaShowModel {
    #[serde(default)]
    pub name: Option<String>,
}

impl OllamaShowResponse {
    /// Name of the currently loaded model, if the backend reported one.
    pub fn loaded_model(&self) -> Option<&str> {
        self.model.as_ref()?.name.as_deref()
    }
}
