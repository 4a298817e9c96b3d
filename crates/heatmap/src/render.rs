//! Color-mapped overlay painting.

use footprint_core::limits::VISIBILITY_THRESHOLD;
use footprint_core::{Error, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

use crate::aggregate::DensityGrid;

/// Piecewise-linear color ramp over `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    stops: Vec<(f64, [u8; 3])>,
}

impl Default for ColorMap {
    /// blue → cyan → green → yellow → red
    fn default() -> Self {
        Self {
            stops: vec![
                (0.0, [0, 0, 255]),
                (0.25, [0, 255, 255]),
                (0.5, [0, 255, 0]),
                (0.75, [255, 255, 0]),
                (1.0, [255, 0, 0]),
            ],
        }
    }
}

impl ColorMap {
    /// Stops must be sorted by position and cover at least one point.
    pub fn new(stops: Vec<(f64, [u8; 3])>) -> Result<Self> {
        if stops.is_empty() {
            return Err(Error::render("color map needs at least one stop"));
        }
        if stops.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(Error::render("color stops must be strictly increasing"));
        }
        Ok(Self { stops })
    }

    pub fn color_at(&self, value: f64) -> [u8; 3] {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };

        let mut lower = self.stops[0];
        for &upper in &self.stops {
            if value <= upper.0 {
                if upper.0 == lower.0 {
                    return upper.1;
                }
                let t = (value - lower.0) / (upper.0 - lower.0);
                return lerp(lower.1, upper.1, t);
            }
            lower = upper;
        }
        lower.1
    }
}

fn lerp(a: [u8; 3], b: [u8; 3], t: f64) -> [u8; 3] {
    let channel = |i: usize| (a[i] as f64 + (b[i] as f64 - a[i] as f64) * t).round() as u8;
    [channel(0), channel(1), channel(2)]
}

/// Something an overlay can be painted onto.
pub trait OverlaySurface {
    fn dimensions(&self) -> (u32, u32);

    /// Makes every pixel fully transparent.
    fn clear(&mut self);

    /// Fills the pixel rectangle `[x, x + width) × [y, y + height)`.
    fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: [u8; 4]);
}

impl OverlaySurface for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        RgbaImage::dimensions(self)
    }

    fn clear(&mut self) {
        for pixel in self.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: [u8; 4]) {
        let (w, h) = RgbaImage::dimensions(self);
        for py in y..(y + height).min(h) {
            for px in x..(x + width).min(w) {
                self.put_pixel(px, py, Rgba(color));
            }
        }
    }
}

/// Paints a density grid with uniform opacity and a show/hide toggle.
#[derive(Debug, Clone)]
pub struct HeatmapRenderer {
    color_map: ColorMap,
    opacity: f64,
    visible: bool,
    threshold: f64,
}

impl Default for HeatmapRenderer {
    fn default() -> Self {
        Self {
            color_map: ColorMap::default(),
            opacity: 0.6,
            visible: true,
            threshold: VISIBILITY_THRESHOLD,
        }
    }
}

impl HeatmapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.set_opacity(opacity);
        self
    }

    pub fn with_color_map(mut self, color_map: ColorMap) -> Self {
        self.color_map = color_map;
        self
    }

    /// Clamped to `[0, 1]`; NaN leaves the current value.
    pub fn set_opacity(&mut self, opacity: f64) {
        if !opacity.is_nan() {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn toggle(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Clears the surface and, when visible, paints every cell at or above
    /// the visibility threshold. Returns the number of cells painted.
    pub fn render<S: OverlaySurface + ?Sized>(&self, grid: &DensityGrid, surface: &mut S) -> usize {
        surface.clear();
        let size = grid.size();
        if !self.visible || size == 0 {
            return 0;
        }

        let (width, height) = surface.dimensions();
        let alpha = (self.opacity * 255.0).round() as u8;
        let edge = |i: usize, extent: u32| (i as u64 * extent as u64 / size as u64) as u32;

        let mut painted = 0;
        for (y, row) in grid.rows().enumerate() {
            let (top, bottom) = (edge(y, height), edge(y + 1, height));
            for (x, &value) in row.iter().enumerate() {
                if value < self.threshold {
                    continue;
                }
                let (left, right) = (edge(x, width), edge(x + 1, width));
                if right > left && bottom > top {
                    let [r, g, b] = self.color_map.color_at(value);
                    surface.fill_rect(left, top, right - left, bottom - top, [r, g, b, alpha]);
                }
                painted += 1;
            }
        }
        painted
    }

    /// Renders onto a fresh transparent image and encodes it as PNG.
    pub fn render_png(&self, grid: &DensityGrid, width: u32, height: u32) -> Result<Vec<u8>> {
        if width == 0 || height == 0 {
            return Err(Error::render("overlay dimensions must be non-zero"));
        }
        let mut image = RgbaImage::new(width, height);
        self.render(grid, &mut image);

        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| Error::render(format!("Failed to encode overlay: {}", e)))?;
        Ok(buf)
    }
}
