//! API routes.

pub mod batch;
pub mod health;
pub mod heatmap;
pub mod location;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the collector router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/analytics/batch", post(batch::batch_handler))
        .route("/api/analytics/track", post(batch::track_handler))
        .route("/api/analytics/location", get(location::location_handler))
        .route("/api/analytics/heatmap", get(heatmap::heatmap_handler))
        .route(
            "/api/analytics/heatmap/overlay",
            get(heatmap::overlay_handler),
        )
        .route("/health", get(health::health_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
