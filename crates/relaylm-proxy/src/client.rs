//! HTTP client for the Ollama backend.
//!
//! Every non-quiet call is announced on the activity log before dispatch and
//! its outcome is reported after completion, so observers of `/logs/stream`
//! see exactly what the proxy sent and received.

use std::fmt;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use relaylm_core::{
    BackendError, BackendPort, BackendRequest, LineStream, LogBroadcaster, LogEvent,
};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::config::ProxyConfig;
use crate::ndjson::ndjson_lines;

/// reqwest-backed [`BackendPort`].
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    log_page_url: String,
    broadcaster: LogBroadcaster,
}

impl fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a client for the backend named in `config`.
    pub fn new(config: &ProxyConfig, broadcaster: LogBroadcaster) -> Result<Self, reqwest::Error> {
        let client = Client::builder().pool_max_idle_per_host(10).build()?;
        Ok(Self {
            client,
            base_url: config.backend_url.clone(),
            log_page_url: config.log_page_url(),
            broadcaster,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Publish the pre-dispatch request events.
    fn announce(&self, request: &BackendRequest, url: &str) {
        self.broadcaster.publish(LogEvent::request(format!(
            "Sending request to Ollama (view logs at {})",
            self.log_page_url
        )));
        self.broadcaster
            .publish(LogEvent::request(format!("Method: {}", request.method)));
        self.broadcaster
            .publish(LogEvent::request(format!("URL: {url}")));
        if let Some(body) = &request.body {
            let pretty = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
            self.broadcaster
                .publish(LogEvent::request(format!("Data: {pretty}")));
        }
    }

    fn report_error(&self, request: &BackendRequest, err: &BackendError) {
        if !request.quiet {
            self.broadcaster
                .publish(LogEvent::error(format!("Error in proxy request: {err}")));
        }
    }

    /// Dispatch the request and check the status line.
    async fn send(&self, request: &BackendRequest) -> Result<reqwest::Response, BackendError> {
        let url = self.url(&request.path);
        if !request.quiet {
            self.announce(request, &url);
        }
        debug!(method = %request.method, url = %url, "Calling backend");

        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| BackendError::Unreachable(format!("invalid method: {e}")))?;
        let mut builder = self
            .client
            .request(method, &url)
            .header("content-type", "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn fetch_json(&self, request: &BackendRequest) -> Result<Value, BackendError> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(classify)?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::MalformedBody(e.to_string()))
    }
}

/// Map a transport error onto the backend error taxonomy.
fn classify(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(err.to_string())
    } else if err.is_decode() {
        BackendError::MalformedBody(err.to_string())
    } else {
        BackendError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl BackendPort for BackendClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(&self, request: BackendRequest) -> Result<Value, BackendError> {
        match self.fetch_json(&request).await {
            Ok(value) => {
                if !request.quiet {
                    self.broadcaster
                        .publish(LogEvent::response("Received response from Ollama:"));
                    let pretty =
                        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                    self.broadcaster.publish(LogEvent::response(pretty));
                }
                Ok(value)
            }
            Err(e) => {
                self.report_error(&request, &e);
                Err(e)
            }
        }
    }

    async fn stream(&self, request: BackendRequest) -> Result<LineStream, BackendError> {
        match self.send(&request).await {
            Ok(response) => {
                if !request.quiet {
                    self.broadcaster.publish(LogEvent::stream_start());
                }
                Ok(ndjson_lines(response.bytes_stream().map_err(classify)))
            }
            Err(e) => {
                self.report_error(&request, &e);
                Err(e)
            }
        }
    }
}
