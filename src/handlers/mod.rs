// Handlers module
// HTTP handlers for the REST API

pub mod diagnostics;
pub mod posts;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

pub const ROOT_MESSAGE: &str = "Manhwa Forum API running";

/// Root handler
/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({ "message": ROOT_MESSAGE }))
}

/// Health check handler
/// Returns "OK" with 200 status for monitoring purposes, without touching the store
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
