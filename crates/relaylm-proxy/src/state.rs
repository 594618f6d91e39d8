//! Shared state for the proxy router.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use relaylm_core::{BackendPort, LogBroadcaster};

use crate::client::BackendClient;
use crate::config::ProxyConfig;
use crate::resolver::ModelResolver;

/// State handed to every handler. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProxyState {
    pub backend: Arc<dyn BackendPort>,
    pub broadcaster: LogBroadcaster,
    pub resolver: ModelResolver,
    pub config: Arc<ProxyConfig>,
    /// Advisory "is this model loaded" memo; never authoritative.
    model_status: Arc<RwLock<HashMap<String, bool>>>,
}

impl ProxyState {
    /// Build state around a reqwest [`BackendClient`] for `config.backend_url`.
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let broadcaster = LogBroadcaster::new(config.log_capacity);
        let client = BackendClient::new(&config, broadcaster.clone())?;
        Ok(Self::with_backend(config, Arc::new(client), broadcaster))
    }

    /// Build state around an arbitrary backend.
    pub fn with_backend(
        config: ProxyConfig,
        backend: Arc<dyn BackendPort>,
        broadcaster: LogBroadcaster,
    ) -> Self {
        let resolver = ModelResolver::new(
            Arc::clone(&backend),
            config.default_model.clone(),
            config.catalog_timeout,
        );
        Self {
            backend,
            broadcaster,
            resolver,
            config: Arc::new(config),
            model_status: Arc::default(),
        }
    }

    /// Last known running state of `model`, if any.
    pub fn model_status(&self, model: &str) -> Option<bool> {
        self.model_status
            .read()
            .ok()
            .and_then(|memo| memo.get(model).copied())
    }

    pub fn set_model_status(&self, model: &str, running: bool) {
        if let Ok(mut memo) = self.model_status.write() {
            memo.insert(model.to_string(), running);
        }
    }
}
