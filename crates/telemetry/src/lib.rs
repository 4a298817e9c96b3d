//! Internal telemetry for the Footprint pipeline.
//!
//! Structured logging setup plus in-process counters that the collector
//! exposes on its health endpoint.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;
