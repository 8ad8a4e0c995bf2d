use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::AppState;

/// 200 only when the classifier is loaded and the chain node answers.
pub async fn check(State(state): State<AppState>) -> Response {
    if !state.gate.classifier().is_ready() {
        return unhealthy("ML models not loaded");
    }
    if !state.gate.chain().is_connected().await {
        return unhealthy("Blockchain not connected");
    }

    Json(json!({
        "status": "healthy",
        "message": "Server is running and all components are healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

fn unhealthy(message: &str) -> Response {
    tracing::warn!("health check failed: {}", message);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "error", "message": message })),
    )
        .into_response()
}
