//! In-process stand-in for an Ollama server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Model name that makes `/api/generate` sleep past the proxy's timeout.
pub const SLOW_MODEL: &str = "slow";

/// Model name that makes `/api/generate` answer 404.
pub const MISSING_MODEL: &str = "missing";

/// Prompt text that makes a streaming `/api/generate` never finish.
pub const ENDLESS_PROMPT: &str = "keep talking";

/// Streamed `/api/generate` lines, including one that is not JSON.
pub const GENERATE_STREAM: &str = concat!(
    "{\"model\":\"m1\",\"response\":\"Hel\",\"done\":false}\n",
    "this is not json\n",
    "{\"model\":\"m1\",\"response\":\"lo\",\"done\":false}\n",
    "{\"model\":\"m1\",\"response\":\"\",\"done\":true}\n",
);

#[derive(Clone, Default)]
struct Recorded {
    generate_bodies: Arc<Mutex<Vec<Value>>>,
    stream_dropped: Arc<AtomicBool>,
}

/// Flags the endless stream as closed once its body is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A running fake backend.
pub struct FakeOllama {
    pub base_url: String,
    recorded: Recorded,
}

impl FakeOllama {
    pub async fn start() -> Self {
        let recorded = Recorded::default();
        let app = Router::new()
            .route("/api/tags", get(tags))
            .route("/api/show", get(show))
            .route("/api/version", get(version))
            .route("/api/generate", post(generate))
            .route("/api/chat", post(chat))
            .with_state(recorded.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend crashed");
        });

        Self {
            base_url: format!("http://{addr}"),
            recorded,
        }
    }

    /// Bodies received on `/api/generate`, in arrival order.
    pub fn generate_bodies(&self) -> Vec<Value> {
        self.recorded
            .generate_bodies
            .lock()
            .expect("lock poisoned")
            .clone()
    }

    /// Whether an endless stream body has been dropped by the server,
    /// i.e. the proxy closed its side of the connection.
    pub fn stream_dropped(&self) -> bool {
        self.recorded.stream_dropped.load(Ordering::SeqCst)
    }
}

async fn tags() -> Json<Value> {
    Json(json!({
        "models": [
            {"name": "m1", "model": "m1", "details": {"family": "llama", "parameter_size": "8B"}},
            {"name": "m2", "model": "m2", "details": {"family": "gemma"}}
        ]
    }))
}

async fn show() -> Json<Value> {
    Json(json!({"model": {"name": "m1"}}))
}

async fn version() -> Json<Value> {
    Json(json!({"version": "0.6.5"}))
}

fn ndjson(body: &'static str) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// One `tick` fragment every 50 ms, forever.
fn endless_ndjson(flag: DropFlag) -> Response {
    let lines = futures_util::stream::unfold(flag, |flag| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let line = Bytes::from_static(b"{\"model\":\"m1\",\"response\":\"tick\",\"done\":false}\n");
        Some((Ok::<_, std::io::Error>(line), flag))
    });
    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(lines))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn generate(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Response {
    recorded
        .generate_bodies
        .lock()
        .expect("lock poisoned")
        .push(body.clone());

    match body["model"].as_str() {
        Some(SLOW_MODEL) => {
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
        Some(MISSING_MODEL) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "model 'missing' not found"})),
            )
                .into_response();
        }
        _ => {}
    }

    if body["stream"].as_bool().unwrap_or(false) {
        let endless = body["prompt"]
            .as_str()
            .is_some_and(|p| p.contains(ENDLESS_PROMPT));
        if endless {
            return endless_ndjson(DropFlag(Arc::clone(&recorded.stream_dropped)));
        }
        return ndjson(GENERATE_STREAM);
    }

    Json(json!({
        "model": body["model"],
        "response": "hello",
        "done": true
    }))
    .into_response()
}

async fn chat() -> Response {
    ndjson(concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"a\"},\"done\":false}\n",
        "garbage\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
    ))
}
