//! Size limits and tuning constants shared by client and collector.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so field limits are duplicated there. Keep both in sync when modifying.

// === Delivery ===

/// Events buffered before a size-triggered flush.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Periodic flush interval (seconds).
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Upper bound on buffered events while the backend is unreachable.
pub const DEFAULT_MAX_BUFFERED_EVENTS: usize = 500;

/// Maximum events accepted by the collector in one batch request.
pub const MAX_BATCH_EVENTS: usize = 1000;

/// Maximum batch payload size in bytes (1MB).
pub const MAX_BATCH_SIZE_BYTES: usize = 1024 * 1024;

// === Capture ===

/// Characters of element text kept on a click.
pub const MAX_ELEMENT_TEXT_CHARS: usize = 100;

/// CSS selector max length.
pub const MAX_ELEMENT_SELECTOR_LEN: usize = 256;

/// Page path max length.
pub const MAX_PAGE_PATH_LEN: usize = 2000;

/// Page title max length.
pub const MAX_PAGE_TITLE_LEN: usize = 500;

/// Referrer URL max length. Matches HTTP Referer header limit.
pub const MAX_REFERRER_LEN: usize = 2048;

/// Viewport widths below this are mobile.
pub const MOBILE_MAX_WIDTH: u32 = 768;

/// Viewport widths below this (and not mobile) are tablet.
pub const TABLET_MAX_WIDTH: u32 = 1024;

/// Scroll depths that emit a scroll interaction when first reached.
pub const SCROLL_MILESTONES: [f64; 4] = [25.0, 50.0, 75.0, 100.0];

// === Heatmap ===

/// Default heatmap grid edge length.
pub const DEFAULT_GRID_SIZE: usize = 100;

/// Largest grid edge the collector will aggregate.
pub const MAX_GRID_SIZE: usize = 1000;

/// Default box-blur radius (Chebyshev distance).
pub const DEFAULT_BLUR_RADIUS: usize = 3;

/// Cells below this normalized intensity are not painted.
pub const VISIBILITY_THRESHOLD: f64 = 0.01;
