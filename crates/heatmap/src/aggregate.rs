//! Point samples to a normalized, smoothed density grid.

use footprint_core::limits::DEFAULT_BLUR_RADIUS;
use footprint_core::{DateRange, DeviceFilter, HeatmapPoint};
use serde::{Deserialize, Serialize};

/// Square matrix of click density, normalized so the hottest cell is 1.0.
///
/// Cells are stored row-major (`y * size + x`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityGrid {
    size: usize,
    cells: Vec<f64>,
    device: DeviceFilter,
    range: DateRange,
}

impl DensityGrid {
    /// All-zero grid, the "no data" result.
    pub fn empty(size: usize) -> Self {
        Self {
            size,
            cells: vec![0.0; size * size],
            device: DeviceFilter::All,
            range: DateRange::default(),
        }
    }

    /// Records the filter the grid was built for.
    pub fn with_scope(mut self, device: DeviceFilter, range: DateRange) -> Self {
        self.device = device;
        self.range = range;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Value at `(x, y)`; 0 outside the grid.
    pub fn get(&self, x: usize, y: usize) -> f64 {
        if x >= self.size || y >= self.size {
            return 0.0;
        }
        self.cells[y * self.size + x]
    }

    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on 0
        self.cells.chunks_exact(self.size.max(1))
    }

    pub fn max(&self) -> f64 {
        self.cells.iter().copied().fold(0.0, f64::max)
    }

    /// True when no cell holds any density.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&v| v == 0.0)
    }

    pub fn nonzero_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v > 0.0).count()
    }

    pub fn device(&self) -> DeviceFilter {
        self.device
    }

    pub fn range(&self) -> DateRange {
        self.range
    }
}

/// Aggregates with the default blur radius.
pub fn aggregate(points: &[HeatmapPoint], grid_size: usize) -> DensityGrid {
    aggregate_with_radius(points, grid_size, DEFAULT_BLUR_RADIUS)
}

/// Bins points into a `grid_size × grid_size` matrix, box-blurs it with the
/// given Chebyshev radius and normalizes by the maximum.
///
/// Points outside `[0, grid_size)` and non-positive or non-finite
/// intensities are dropped. The result does not depend on input order.
pub fn aggregate_with_radius(
    points: &[HeatmapPoint],
    grid_size: usize,
    radius: usize,
) -> DensityGrid {
    let mut grid = DensityGrid::empty(grid_size);
    if grid_size == 0 {
        return grid;
    }

    let raw = bin_points(points, grid_size);
    let blurred = box_blur(&raw, grid_size, radius);
    let max = blurred.iter().copied().fold(0.0, f64::max);
    if max > 0.0 && max.is_finite() {
        grid.cells = blurred.into_iter().map(|v| v / max).collect();
    }
    grid
}

/// Accumulates in-bounds samples into a row-major matrix.
pub fn bin_points(points: &[HeatmapPoint], grid_size: usize) -> Vec<f64> {
    let mut samples: Vec<(usize, usize, f64)> = points
        .iter()
        .filter_map(|p| cell_of(p, grid_size).map(|(x, y)| (x, y, p.intensity)))
        .collect();

    // Canonical order so float sums are identical under any permutation.
    samples.sort_by(|a, b| {
        (a.1, a.0)
            .cmp(&(b.1, b.0))
            .then_with(|| a.2.total_cmp(&b.2))
    });

    let mut cells = vec![0.0; grid_size * grid_size];
    for (x, y, intensity) in samples {
        cells[y * grid_size + x] += intensity;
    }
    cells
}

fn cell_of(point: &HeatmapPoint, grid_size: usize) -> Option<(usize, usize)> {
    if !(point.intensity.is_finite() && point.intensity > 0.0) {
        return None;
    }
    let limit = grid_size as f64;
    let in_range = |v: f64| v >= 0.0 && v < limit;
    if !(in_range(point.x) && in_range(point.y)) {
        return None;
    }
    Some((point.x as usize, point.y as usize))
}

/// Replaces each cell with the mean of the in-bounds cells within Chebyshev
/// distance `radius`. Out-of-bounds neighbors count toward neither sum nor
/// divisor.
pub fn box_blur(cells: &[f64], size: usize, radius: usize) -> Vec<f64> {
    if radius == 0 || size == 0 {
        return cells.to_vec();
    }

    // The window is a rectangle, so sum rows first, then columns.
    let mut horizontal = vec![0.0; size * size];
    for y in 0..size {
        for x in 0..size {
            let (lo, hi) = window(x, radius, size);
            horizontal[y * size + x] = (lo..=hi).map(|nx| cells[y * size + nx]).sum();
        }
    }

    let mut out = vec![0.0; size * size];
    for y in 0..size {
        let (y_lo, y_hi) = window(y, radius, size);
        for x in 0..size {
            let (x_lo, x_hi) = window(x, radius, size);
            let sum: f64 = (y_lo..=y_hi).map(|ny| horizontal[ny * size + x]).sum();
            let count = (x_hi - x_lo + 1) * (y_hi - y_lo + 1);
            out[y * size + x] = sum / count as f64;
        }
    }
    out
}

fn window(center: usize, radius: usize, size: usize) -> (usize, usize) {
    (
        center.saturating_sub(radius),
        (center + radius).min(size - 1),
    )
}
