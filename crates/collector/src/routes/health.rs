//! Health check endpoint.

use axum::{extract::State, Json};
use telemetry::metrics;

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.store.is_healthy() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        events_stored: state.store.len(),
        metrics: metrics().snapshot(),
    })
}
