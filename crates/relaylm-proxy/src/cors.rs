//! Cross-origin access.
//!
//! Browser clients get the usual `CorsLayer` treatment. Some OpenAI client
//! libraries also send bare `OPTIONS` requests without the CORS request
//! headers; those are answered by [`preflight`] with a small JSON body.

use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

const ALLOW_HEADERS: &str = "Content-Type,Authorization";
const ALLOW_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";
const MAX_AGE_SECS: u64 = 3600;

/// CORS layer applied to the whole router.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(MAX_AGE_SECS))
}

/// `OPTIONS` handler for every route.
pub async fn preflight() -> Response {
    preflight_response()
}

pub fn preflight_response() -> Response {
    let mut response = Json(json!({
        "status": "ok",
        "message": "CORS preflight request successful"
    }))
    .into_response();

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(MAX_AGE_SECS));
    response
}
