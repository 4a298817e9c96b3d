//! Core types, wire shapes, and validation for the Footprint telemetry pipeline.

pub mod device;
pub mod error;
pub mod events;
pub mod heatmap;
pub mod limits;
pub mod location;
pub mod session;
pub mod traffic;

pub use device::*;
pub use error::{Error, Result, StoreErrorCode, ValidationErrorCode};
pub use events::*;
pub use heatmap::*;
pub use location::*;
pub use session::*;
pub use traffic::*;
