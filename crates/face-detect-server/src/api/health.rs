//! Health check endpoint.

use axum::Json;
use face_detect_core::HealthStatus;

/// Liveness check; always healthy once the server is up.
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::healthy())
}
