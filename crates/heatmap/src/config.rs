//! Heatmap viewer configuration.

use footprint_core::limits::{DEFAULT_BLUR_RADIUS, DEFAULT_GRID_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aggregation, rendering and fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapConfig {
    /// Collector base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Cells per side of the density grid
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,
    /// Box blur radius in cells
    #[serde(default = "default_blur_radius")]
    pub blur_radius: usize,
    /// Overlay opacity in [0, 1]
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_grid_size() -> usize {
    DEFAULT_GRID_SIZE
}

fn default_blur_radius() -> usize {
    DEFAULT_BLUR_RADIUS
}

fn default_opacity() -> f64 {
    0.6
}

fn default_request_timeout_ms() -> u64 {
    10000
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            grid_size: default_grid_size(),
            blur_radius: default_blur_radius(),
            opacity: default_opacity(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl HeatmapConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
