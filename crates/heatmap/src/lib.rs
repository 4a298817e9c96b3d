//! Heatmap aggregation, rendering and viewing.

pub mod aggregate;
pub mod config;
pub mod render;
pub mod viewer;

pub use aggregate::*;
pub use config::*;
pub use render::*;
pub use viewer::*;
