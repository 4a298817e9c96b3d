//! Tracker configuration.

use footprint_core::limits::{
    DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_MAX_BUFFERED_EVENTS,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Client-side capture and delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Collector base URL (e.g. "https://example.com")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Buffered events that trigger an immediate flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Periodic flush interval in seconds
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Oldest events are dropped past this many buffered events
    #[serde(default = "default_max_buffered_events")]
    pub max_buffered_events: usize,
    /// Minimum spacing between sampled pointer moves (0 disables move capture)
    #[serde(default = "default_move_sample_interval_ms")]
    pub move_sample_interval_ms: u64,
    /// Whether to request location enrichment for new sessions
    #[serde(default = "default_true")]
    pub enable_location: bool,
    /// Location lookup timeout in milliseconds
    #[serde(default = "default_location_timeout_ms")]
    pub location_timeout_ms: u64,
    /// HTTP request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Local file receiving beacon sends outside a browser host
    #[serde(default = "default_beacon_log_path")]
    pub beacon_log_path: PathBuf,
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_flush_interval_secs() -> u64 {
    DEFAULT_FLUSH_INTERVAL_SECS
}

fn default_max_buffered_events() -> usize {
    DEFAULT_MAX_BUFFERED_EVENTS
}

fn default_move_sample_interval_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_location_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    10000
}

fn default_beacon_log_path() -> PathBuf {
    PathBuf::from("footprint-beacons.jsonl")
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            batch_size: default_batch_size(),
            flush_interval_secs: default_flush_interval_secs(),
            max_buffered_events: default_max_buffered_events(),
            move_sample_interval_ms: default_move_sample_interval_ms(),
            enable_location: default_true(),
            location_timeout_ms: default_location_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            beacon_log_path: default_beacon_log_path(),
        }
    }
}

impl TrackerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.location_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `None` when move capture is disabled.
    pub fn move_sample_interval(&self) -> Option<Duration> {
        (self.move_sample_interval_ms > 0)
            .then(|| Duration::from_millis(self.move_sample_interval_ms))
    }
}
