//! HTTP collector for the telemetry pipeline.

pub mod config;
pub mod extractors;
pub mod geo;
pub mod response;
pub mod routes;
pub mod state;
pub mod store;

pub use config::CollectorConfig;
pub use geo::{GeoLookup, HttpGeoLookup};
pub use routes::router;
pub use state::AppState;
pub use store::{EventStore, MemoryEventStore};
