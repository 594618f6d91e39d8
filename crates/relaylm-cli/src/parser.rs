//! Command-line arguments.

use std::net::IpAddr;

use clap::Parser;
use relaylm_proxy::ProxyConfig;

/// OpenAI-compatible proxy in front of an Ollama server.
#[derive(Debug, Parser)]
#[command(name = "relaylm")]
#[command(about = "OpenAI-compatible proxy for Ollama with a live activity log")]
#[command(version)]
pub struct Cli {
    /// Ollama base URL (overrides OLLAMA_BASE_URL)
    #[arg(long = "backend-url")]
    pub backend_url: Option<String>,

    /// Interface to listen on
    #[arg(long, env = "RELAYLM_HOST")]
    pub host: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long, env = "RELAYLM_PORT")]
    pub port: Option<u16>,

    /// Model used when a request names none or the catalog is unavailable
    #[arg(long = "default-model", env = "RELAYLM_DEFAULT_MODEL")]
    pub default_model: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Layer the command-line overrides on top of `config`.
    #[must_use]
    pub fn apply(&self, mut config: ProxyConfig) -> ProxyConfig {
        if let Some(url) = &self.backend_url {
            config = config.with_backend_url(url.clone());
        }
        if let Some(host) = self.host {
            config = config.with_host(host);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(model) = &self.default_model {
            config = config.with_default_model(model.clone());
        }
        config
    }
}
