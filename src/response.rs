//! Response envelopes. Every route answers `{status, <resultKey>, message}`
//! with a caller-facing throttling hint derived from the resolved window.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};

fn throttle_hint(seconds: u64) -> String {
    format!(
        "This API call result is cached for {seconds} seconds, \
         so please limit your calls to once per {seconds} seconds."
    )
}

/// 200 with the result under its route-specific key.
pub fn success(result_key: &str, value: &str, seconds: u64) -> Response {
    let mut body = Map::new();
    body.insert("status".to_string(), Value::String("200".to_string()));
    body.insert(result_key.to_string(), Value::String(value.to_string()));
    body.insert("message".to_string(), Value::String(throttle_hint(seconds)));
    (StatusCode::OK, Json(Value::Object(body))).into_response()
}

/// 404, used exclusively for identifiers outside the supported set.
pub fn not_supported() -> Response {
    let body = json!({
        "status": "404",
        "message": "Token not supported",
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// 429 with the resolved window so callers can self-throttle.
pub fn rate_limited(seconds: u64) -> Response {
    let body = json!({
        "status": "429",
        "message": format!("Too many requests! {}", throttle_hint(seconds)),
    });
    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
}

/// Generic 400 for adapter failures and unexpected faults. Detail stays in
/// the server logs.
pub fn bad_request() -> Response {
    let body = json!({
        "status": "400",
        "message": "Something went wrong",
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}
