//! In-memory backend for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use relaylm_core::{BackendError, BackendPort, BackendRequest, LineStream};
use serde_json::{Value, json};

/// Canned [`BackendPort`] that records every request it receives.
#[derive(Debug, Clone)]
pub(crate) struct FakeBackend {
    catalog: Result<Vec<String>, BackendError>,
    generate: Result<Value, BackendError>,
    lines: Vec<Result<String, BackendError>>,
    calls: Arc<Mutex<Vec<BackendRequest>>>,
}

impl FakeBackend {
    pub(crate) fn with_catalog(names: &[&str]) -> Self {
        Self {
            catalog: Ok(names.iter().map(ToString::to_string).collect()),
            generate: Ok(json!({"response": ""})),
            lines: Vec::new(),
            calls: Arc::default(),
        }
    }

    pub(crate) fn unreachable() -> Self {
        let err = BackendError::Unreachable("connection refused".into());
        Self {
            catalog: Err(err.clone()),
            generate: Err(err.clone()),
            lines: vec![Err(err)],
            calls: Arc::default(),
        }
    }

    #[must_use]
    pub(crate) fn generating(mut self, response: Value) -> Self {
        self.generate = Ok(response);
        self
    }

    #[must_use]
    pub(crate) fn failing_generate(mut self, err: BackendError) -> Self {
        self.generate = Err(err);
        self
    }

    #[must_use]
    pub(crate) fn streaming(mut self, lines: &[&str]) -> Self {
        self.lines = lines.iter().map(|l| Ok((*l).to_string())).collect();
        self
    }

    #[must_use]
    pub(crate) fn streaming_results(mut self, lines: Vec<Result<String, BackendError>>) -> Self {
        self.lines = lines;
        self
    }

    pub(crate) fn calls(&self) -> Arc<Mutex<Vec<BackendRequest>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, request: &BackendRequest) {
        self.calls.lock().unwrap().push(request.clone());
    }
}

#[async_trait]
impl BackendPort for FakeBackend {
    fn base_url(&self) -> &str {
        "http://fake-ollama"
    }

    async fn call(&self, request: BackendRequest) -> Result<Value, BackendError> {
        self.record(&request);
        match request.path.as_str() {
            "/api/tags" => self.catalog.clone().map(|names| {
                json!({ "models": names.iter().map(|n| json!({"name": n})).collect::<Vec<_>>() })
            }),
            _ => self.generate.clone(),
        }
    }

    async fn stream(&self, request: BackendRequest) -> Result<LineStream, BackendError> {
        self.record(&request);
        if let Err(e) = &self.generate {
            return Err(e.clone());
        }
        Ok(futures_util::stream::iter(self.lines.clone()).boxed())
    }
}
