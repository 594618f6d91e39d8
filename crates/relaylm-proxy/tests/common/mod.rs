//! Shared helpers for relaylm-proxy integration tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

pub mod fake_ollama;

use std::time::Duration;

use relaylm_proxy::{ProxyConfig, ProxyState, serve};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// A proxy served on an ephemeral port.
pub struct TestProxy {
    pub base_url: String,
    pub state: ProxyState,
    cancel: CancellationToken,
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start a proxy in front of `backend_url`.
///
/// Warm-up and direct generate calls time out after one second so the
/// timeout paths stay fast.
pub async fn spawn_proxy(backend_url: &str) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind proxy listener");
    let port = listener.local_addr().expect("local addr").port();

    let config = ProxyConfig::with_defaults()
        .with_backend_url(backend_url)
        .with_port(port)
        .with_generate_timeout(Duration::from_secs(1))
        .with_default_model("fallback:latest");
    let state = ProxyState::new(config).expect("Failed to build proxy state");

    let cancel = CancellationToken::new();
    tokio::spawn(serve(listener, state.clone(), cancel.clone()));

    TestProxy {
        base_url: format!("http://127.0.0.1:{port}"),
        state,
        cancel,
    }
}

/// Base URL with nothing listening behind it.
pub async fn dead_backend_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Split an SSE body into its `data:` payloads.
pub fn sse_payloads(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter_map(|event| event.trim().strip_prefix("data: "))
        .map(ToString::to_string)
        .collect()
}
