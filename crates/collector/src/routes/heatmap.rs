//! Heatmap endpoints: raw points and a server-rendered overlay.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use footprint_core::{
    limits::{DEFAULT_BLUR_RADIUS, DEFAULT_GRID_SIZE, MAX_GRID_SIZE},
    parse_date, DeviceFilter, HeatmapQuery, HeatmapResponse,
};
use heatmap::{aggregate_with_radius, HeatmapRenderer};
use serde::Deserialize;
use std::time::Instant;
use telemetry::metrics;
use tracing::debug;

use crate::response::ApiError;
use crate::state::AppState;

/// GET /api/analytics/heatmap
///
/// Points are returned in a 100-unit space per axis.
pub async fn heatmap_handler(
    State(state): State<AppState>,
    query: Result<Query<HeatmapQuery>, QueryRejection>,
) -> Result<Json<HeatmapResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::invalid_query(e.body_text()))?;
    query.validate()?;

    let points = state.store.heatmap_points(&query, DEFAULT_GRID_SIZE).await?;
    metrics().heatmaps_served.inc();
    debug!(
        page_path = %query.page_path,
        device_type = query.device_type.as_str(),
        points = points.len(),
        "Served heatmap points"
    );

    Ok(Json(HeatmapResponse { points }))
}

/// Query string of the overlay endpoint.
#[derive(Debug, Deserialize)]
pub struct OverlayParams {
    pub page_path: String,
    #[serde(default)]
    pub device_type: DeviceFilter,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,
    #[serde(default = "default_radius")]
    pub radius: usize,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    pub opacity: Option<f64>,
}

fn default_grid_size() -> usize {
    DEFAULT_GRID_SIZE
}

fn default_radius() -> usize {
    DEFAULT_BLUR_RADIUS
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    800
}

impl OverlayParams {
    fn heatmap_query(&self) -> Result<HeatmapQuery, ApiError> {
        let start = self.start_date.as_deref().map(parse_date).transpose()?;
        let end = self.end_date.as_deref().map(parse_date).transpose()?;
        let query = HeatmapQuery::new(self.page_path.clone())
            .with_device(self.device_type)
            .with_range(start, end);
        query.validate()?;
        Ok(query)
    }

    fn check_bounds(&self, max_px: u32) -> Result<(), ApiError> {
        if self.grid_size == 0 || self.grid_size > MAX_GRID_SIZE {
            return Err(ApiError::invalid_query(format!(
                "grid_size must be between 1 and {}",
                MAX_GRID_SIZE
            )));
        }
        if self.radius > self.grid_size {
            return Err(ApiError::invalid_query("radius must not exceed grid_size"));
        }
        if self.width == 0 || self.height == 0 || self.width > max_px || self.height > max_px {
            return Err(ApiError::invalid_query(format!(
                "width and height must be between 1 and {}",
                max_px
            )));
        }
        Ok(())
    }
}

/// GET /api/analytics/heatmap/overlay - PNG overlay.
pub async fn overlay_handler(
    State(state): State<AppState>,
    params: Result<Query<OverlayParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::invalid_query(e.body_text()))?;
    params.check_bounds(state.config.max_overlay_px)?;
    let query = params.heatmap_query()?;

    let start = Instant::now();
    let points = state.store.heatmap_points(&query, params.grid_size).await?;
    let grid = aggregate_with_radius(&points, params.grid_size, params.radius)
        .with_scope(query.device_type, query.range());
    metrics()
        .aggregate_latency_ms
        .observe(start.elapsed().as_millis() as u64);

    let mut renderer = HeatmapRenderer::new();
    if let Some(opacity) = params.opacity {
        renderer.set_opacity(opacity);
    }
    let png = renderer.render_png(&grid, params.width, params.height)?;
    metrics().heatmaps_served.inc();

    debug!(
        page_path = %query.page_path,
        points = points.len(),
        cells = grid.nonzero_count(),
        bytes = png.len(),
        "Rendered heatmap overlay"
    );

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}
