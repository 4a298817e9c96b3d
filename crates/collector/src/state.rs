//! Application state shared across handlers.

use footprint_core::Result;
use std::sync::Arc;

use crate::config::CollectorConfig;
use crate::geo::{GeoLookup, HttpGeoLookup};
use crate::store::EventStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Event store (in-memory in this service, mock in tests)
    pub store: Arc<dyn EventStore>,
    /// Geo-IP lookup
    pub geo: Arc<dyn GeoLookup>,
    pub config: Arc<CollectorConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EventStore>,
        geo: Arc<dyn GeoLookup>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            store,
            geo,
            config: Arc::new(config),
        }
    }

    /// State with the HTTP geo client configured from `config`.
    pub fn from_config(store: Arc<dyn EventStore>, config: CollectorConfig) -> Result<Self> {
        let geo = Arc::new(HttpGeoLookup::new(&config)?);
        Ok(Self::new(store, geo, config))
    }
}
