use axum::{http::StatusCode, Json};
use serde_json::json;

use crate::api::response::ApiResponse;

/// GET /health - liveness probe
pub async fn health() -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    (
        StatusCode::OK,
        Json(ApiResponse::success(json!({ "status": "ok" }))),
    )
}
