//! CLI entry point - the composition root.

use anyhow::Context;
use clap::Parser;
use relaylm_cli::{Cli, init_tracing};
use relaylm_proxy::{ProxyConfig, ProxyState, serve};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.apply(ProxyConfig::from_env());
    let addr = config.socket_addr();
    info!(
        backend = %config.backend_url,
        default_model = %config.default_model,
        "Starting relaylm"
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let state = ProxyState::new(config).context("Failed to build backend client")?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shutdown.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
        }
    });

    serve(listener, state, cancel).await
}
