//! Collector configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Geo-IP service URL ("mock" or empty for deterministic local answers)
    #[serde(default = "default_geo_url")]
    pub geo_lookup_url: String,
    /// How long a resolved address stays cached
    #[serde(default = "default_geo_cache_ttl_secs")]
    pub geo_cache_ttl_secs: u64,
    /// Geo-IP request timeout in milliseconds
    #[serde(default = "default_geo_timeout_ms")]
    pub geo_timeout_ms: u64,
    /// Largest overlay edge in pixels
    #[serde(default = "default_max_overlay_px")]
    pub max_overlay_px: u32,
    /// Events kept in memory before the oldest are dropped (0 = no cap)
    #[serde(default = "default_max_stored_events")]
    pub max_stored_events: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_geo_url() -> String {
    "mock".to_string()
}

fn default_geo_cache_ttl_secs() -> u64 {
    3600
}

fn default_geo_timeout_ms() -> u64 {
    3000
}

fn default_max_overlay_px() -> u32 {
    4096
}

fn default_max_stored_events() -> usize {
    1_000_000
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            geo_lookup_url: default_geo_url(),
            geo_cache_ttl_secs: default_geo_cache_ttl_secs(),
            geo_timeout_ms: default_geo_timeout_ms(),
            max_overlay_px: default_max_overlay_px(),
            max_stored_events: default_max_stored_events(),
        }
    }
}

impl CollectorConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn geo_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.geo_cache_ttl_secs)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo_timeout_ms)
    }
}
