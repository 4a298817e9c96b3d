//! Fetches heatmap points and exposes the view state.

use async_trait::async_trait;
use footprint_core::limits::DEFAULT_GRID_SIZE;
use footprint_core::{Error, HeatmapPoint, HeatmapQuery, HeatmapResponse, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, warn};
use url::Url;

use crate::aggregate::{aggregate_with_radius, DensityGrid};
use crate::config::HeatmapConfig;
use crate::render::{HeatmapRenderer, OverlaySurface};

const HEATMAP_PATH: &str = "/api/analytics/heatmap";

/// What the viewer shows.
#[derive(Debug, Clone, PartialEq)]
pub enum HeatmapView {
    Loading,
    /// The fetch failed; `retryable` marks failures worth retrying.
    Error { message: String, retryable: bool },
    /// The fetch succeeded with nothing to show.
    Empty,
    Ready(DensityGrid),
}

impl HeatmapView {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn grid(&self) -> Option<&DensityGrid> {
        match self {
            Self::Ready(grid) => Some(grid),
            _ => None,
        }
    }
}

/// Where points come from.
#[async_trait]
pub trait HeatmapSource: Send + Sync {
    /// Points in the wire's 100-unit space.
    async fn fetch_points(&self, query: &HeatmapQuery) -> Result<Vec<HeatmapPoint>>;
}

/// Fetches points from the collector's heatmap endpoint.
pub struct HttpHeatmapSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpHeatmapSource {
    pub fn new(config: &HeatmapConfig) -> Result<Self> {
        let url = Url::parse(&config.endpoint)
            .and_then(|base| base.join(HEATMAP_PATH))
            .map_err(|e| Error::validation(format!("endpoint: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl HeatmapSource for HttpHeatmapSource {
    async fn fetch_points(&self, query: &HeatmapQuery) -> Result<Vec<HeatmapPoint>> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&query.to_pairs())
            .send()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Status(response.status().as_u16()));
        }

        let body: HeatmapResponse = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("Invalid heatmap response: {}", e)))?;
        Ok(body.points)
    }
}

/// Loads, aggregates and renders the heatmap for one page.
pub struct HeatmapViewer {
    source: Arc<dyn HeatmapSource>,
    config: HeatmapConfig,
    renderer: RwLock<HeatmapRenderer>,
    view: RwLock<HeatmapView>,
}

impl HeatmapViewer {
    pub fn new(source: Arc<dyn HeatmapSource>, config: HeatmapConfig) -> Self {
        let renderer = HeatmapRenderer::new().with_opacity(config.opacity);
        Self {
            source,
            config,
            renderer: RwLock::new(renderer),
            view: RwLock::new(HeatmapView::Loading),
        }
    }

    /// Fetches and aggregates points for `query`. The view is `Loading`
    /// while the fetch runs.
    pub async fn load(&self, query: &HeatmapQuery) -> HeatmapView {
        *self.view.write() = HeatmapView::Loading;
        let start = Instant::now();

        let view = match self.fetch(query).await {
            Ok(points) => {
                let grid = aggregate_with_radius(
                    &points,
                    self.config.grid_size,
                    self.config.blur_radius,
                )
                .with_scope(query.device_type, query.range());
                metrics()
                    .aggregate_latency_ms
                    .observe(start.elapsed().as_millis() as u64);
                debug!(
                    page_path = %query.page_path,
                    points = points.len(),
                    cells = grid.nonzero_count(),
                    "Aggregated heatmap"
                );
                if grid.is_empty() {
                    HeatmapView::Empty
                } else {
                    HeatmapView::Ready(grid)
                }
            }
            Err(e) => {
                warn!(error = %e, page_path = %query.page_path, "Failed to load heatmap");
                HeatmapView::Error {
                    message: format!("Could not load heatmap data: {}", e),
                    retryable: e.is_transient(),
                }
            }
        };

        *self.view.write() = view.clone();
        view
    }

    async fn fetch(&self, query: &HeatmapQuery) -> Result<Vec<HeatmapPoint>> {
        query.validate()?;
        let points = self.source.fetch_points(query).await?;
        Ok(rescale(points, self.config.grid_size))
    }

    pub fn view(&self) -> HeatmapView {
        self.view.read().clone()
    }

    /// Paints the current grid; a non-ready view just clears the surface.
    pub fn paint<S: OverlaySurface + ?Sized>(&self, surface: &mut S) -> usize {
        let view = self.view.read();
        match view.grid() {
            Some(grid) => self.renderer.read().render(grid, surface),
            None => {
                surface.clear();
                0
            }
        }
    }

    pub fn set_opacity(&self, opacity: f64) {
        self.renderer.write().set_opacity(opacity);
    }

    pub fn toggle_visible(&self) -> bool {
        self.renderer.write().toggle()
    }
}

/// Maps wire-space points onto a grid of `grid_size` cells.
fn rescale(points: Vec<HeatmapPoint>, grid_size: usize) -> Vec<HeatmapPoint> {
    if grid_size == DEFAULT_GRID_SIZE {
        return points;
    }
    let factor = grid_size as f64 / DEFAULT_GRID_SIZE as f64;
    points
        .into_iter()
        .map(|p| HeatmapPoint::new(p.x * factor, p.y * factor, p.intensity))
        .collect()
}
