//! Proxy configuration.
//!
//! Only the backend base URL is read from the environment; everything else
//! has a fixed default that the binary may override from the command line.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use relaylm_core::DEFAULT_LOG_CAPACITY;

/// Environment variable holding the backend base URL.
pub const BACKEND_URL_ENV: &str = "OLLAMA_BASE_URL";

/// Backend address used when [`BACKEND_URL_ENV`] is unset.
pub const DEFAULT_BACKEND_URL: &str = "http://host.docker.internal:11434";

/// Model used when the caller names none or the catalog is unavailable.
pub const DEFAULT_MODEL: &str = "gemma3:12b-it-qat";

/// Port the proxy listens on.
pub const DEFAULT_PORT: u16 = 7005;

/// Runtime settings for the proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Base URL of the Ollama server, without trailing slash.
    pub backend_url: String,
    /// Interface to bind.
    pub host: IpAddr,
    /// Port to bind.
    pub port: u16,
    /// Fallback model name.
    pub default_model: String,
    /// Deadline for catalog fetches (`/api/tags`).
    pub catalog_timeout: Duration,
    /// Deadline for the currently-loaded-model probe (`/api/show`).
    pub probe_timeout: Duration,
    /// Deadline for warm-up and direct generate calls.
    pub generate_timeout: Duration,
    /// Per-observer log buffer size.
    pub log_capacity: usize,
}

impl ProxyConfig {
    /// Create config with default values.
    pub fn with_defaults() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            default_model: DEFAULT_MODEL.to_string(),
            catalog_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
            generate_timeout: Duration::from_secs(30),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    /// Defaults, with the backend URL taken from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults, with the backend URL taken from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config = Self::with_defaults();
        match lookup(BACKEND_URL_ENV) {
            Some(url) if !url.trim().is_empty() => config.with_backend_url(url),
            _ => config,
        }
    }

    /// Set the backend base URL.
    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into().trim().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    #[must_use]
    pub const fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_catalog_timeout(mut self, timeout: Duration) -> Self {
        self.catalog_timeout = timeout;
        self
    }

    /// Address to bind the listener to.
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// URL of the live log page, as advertised in activity events.
    pub fn log_page_url(&self) -> String {
        format!("http://localhost:{}/logs", self.port)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}
