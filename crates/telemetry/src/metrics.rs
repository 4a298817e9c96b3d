//! Internal metrics collection.
//!
//! Counters live in-process; the collector reports a snapshot on `/health`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let index = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Client delivery
    pub events_enqueued: Counter,
    pub events_sent: Counter,
    pub events_dropped: Counter,
    pub flushes: Counter,
    pub flush_failures: Counter,
    pub flushes_skipped: Counter,
    pub beacons_sent: Counter,
    pub beacons_failed: Counter,
    pub location_lookups: Counter,
    pub location_failures: Counter,

    // Collector
    pub batches_received: Counter,
    pub events_received: Counter,
    pub events_rejected: Counter,
    pub unload_beacons_received: Counter,
    pub heatmaps_served: Counter,

    // Latency histograms
    pub flush_latency_ms: Histogram,
    pub aggregate_latency_ms: Histogram,

    // Gauges
    pub buffer_depth: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_enqueued: u64,
    pub events_sent: u64,
    pub events_dropped: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    pub beacons_sent: u64,
    pub beacons_failed: u64,
    pub batches_received: u64,
    pub events_received: u64,
    pub events_rejected: u64,
    pub unload_beacons_received: u64,
    pub heatmaps_served: u64,
    pub flush_latency_mean_ms: f64,
    pub aggregate_latency_mean_ms: f64,
    pub buffer_depth: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_enqueued: self.events_enqueued.get(),
            events_sent: self.events_sent.get(),
            events_dropped: self.events_dropped.get(),
            flushes: self.flushes.get(),
            flush_failures: self.flush_failures.get(),
            beacons_sent: self.beacons_sent.get(),
            beacons_failed: self.beacons_failed.get(),
            batches_received: self.batches_received.get(),
            events_received: self.events_received.get(),
            events_rejected: self.events_rejected.get(),
            unload_beacons_received: self.unload_beacons_received.get(),
            heatmaps_served: self.heatmaps_served.get(),
            flush_latency_mean_ms: self.flush_latency_ms.mean(),
            aggregate_latency_mean_ms: self.aggregate_latency_ms.mean(),
            buffer_depth: self.buffer_depth.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
