//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use collector::EventStore;
use footprint_core::{
    BatchPayload, Error, EventEnvelope, GeoLocation, HeatmapPoint, HeatmapQuery, Result,
    StoreErrorCode, UnloadBeacon,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracker::{BeaconEndpoint, Clock, PlatformStorage, PlatformTransport};

/// Mock transport that captures batches and beacons in memory.
///
/// This implements the same `PlatformTransport` trait as `HttpTransport`,
/// so tests can check exactly what the tracker would have put on the wire.
#[derive(Clone)]
pub struct MockTransport {
    /// Batches accepted by `post_batch`.
    batches: Arc<Mutex<Vec<BatchPayload>>>,
    /// Bodies handed to `send_beacon`.
    beacons: Arc<Mutex<Vec<(BeaconEndpoint, Vec<u8>)>>>,
    /// Every `post_batch` call, accepted or not.
    attempts: Arc<AtomicUsize>,
    /// Simulate collector failures if set.
    should_fail: Arc<Mutex<bool>>,
    /// Simulate the platform refusing beacons if set.
    refuse_beacons: Arc<Mutex<bool>>,
    /// Answer to `fetch_location`; `None` fails the lookup.
    location: Arc<Mutex<Option<GeoLocation>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            beacons: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
            refuse_beacons: Arc::new(Mutex::new(false)),
            location: Arc::new(Mutex::new(None)),
        }
    }

    /// Get all accepted batches.
    pub fn batches(&self) -> Vec<BatchPayload> {
        self.batches.lock().clone()
    }

    /// Events from every accepted batch, in delivery order.
    pub fn delivered_events(&self) -> Vec<EventEnvelope> {
        self.batches
            .lock()
            .iter()
            .flat_map(|b| b.events.iter().cloned())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn beacons(&self) -> Vec<(BeaconEndpoint, Vec<u8>)> {
        self.beacons.lock().clone()
    }

    pub fn beacons_to(&self, endpoint: BeaconEndpoint) -> Vec<Vec<u8>> {
        self.beacons
            .lock()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Set failure mode for testing retry handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    pub fn set_refuse_beacons(&self, refuse: bool) {
        *self.refuse_beacons.lock() = refuse;
    }

    pub fn set_location(&self, location: Option<GeoLocation>) {
        *self.location.lock() = location;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformTransport for MockTransport {
    async fn post_batch(&self, payload: &BatchPayload) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if *self.should_fail.lock() {
            return Err(Error::Status(503));
        }
        self.batches.lock().push(payload.clone());
        Ok(())
    }

    fn send_beacon(&self, endpoint: BeaconEndpoint, body: &[u8]) -> bool {
        if *self.refuse_beacons.lock() {
            return false;
        }
        self.beacons.lock().push((endpoint, body.to_vec()));
        true
    }

    async fn fetch_location(&self) -> Result<GeoLocation> {
        self.location
            .lock()
            .clone()
            .ok_or_else(|| Error::lookup("Mock location unavailable"))
    }
}

/// Tab storage that is always unavailable, like a browser with storage
/// disabled.
#[derive(Debug, Default)]
pub struct FailingStorage;

impl PlatformStorage for FailingStorage {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::storage("storage disabled"))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::storage("storage disabled"))
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// 2024-03-01 09:00:00 UTC.
    pub fn fixed() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Event store whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(&self, _events: Vec<EventEnvelope>) -> Result<usize> {
        Err(Error::store(StoreErrorCode::WriteFailed, "Mock store failure"))
    }

    async fn record_unload(&self, _beacon: UnloadBeacon) -> Result<()> {
        Err(Error::store(StoreErrorCode::WriteFailed, "Mock store failure"))
    }

    async fn heatmap_points(
        &self,
        _query: &HeatmapQuery,
        _grid_size: usize,
    ) -> Result<Vec<HeatmapPoint>> {
        Ok(Vec::new())
    }

    fn len(&self) -> usize {
        0
    }

    fn is_healthy(&self) -> bool {
        false
    }
}

/// Heatmap source answering from a fixed point list.
#[derive(Default)]
pub struct StaticHeatmapSource {
    points: Mutex<Vec<HeatmapPoint>>,
    error: Mutex<Option<u16>>,
    requests: Mutex<Vec<HeatmapQuery>>,
}

impl StaticHeatmapSource {
    pub fn new(points: Vec<HeatmapPoint>) -> Self {
        Self {
            points: Mutex::new(points),
            ..Self::default()
        }
    }

    /// Every fetch fails with this HTTP status.
    pub fn failing(status: u16) -> Self {
        Self {
            error: Mutex::new(Some(status)),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<HeatmapQuery> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl heatmap::HeatmapSource for StaticHeatmapSource {
    async fn fetch_points(&self, query: &HeatmapQuery) -> Result<Vec<HeatmapPoint>> {
        self.requests.lock().push(query.clone());
        if let Some(status) = *self.error.lock() {
            return Err(Error::Status(status));
        }
        Ok(self.points.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_captures_batches() {
        let mock = MockTransport::new();

        mock.post_batch(&BatchPayload::new(vec![])).await.unwrap();
        assert_eq!(mock.batches().len(), 1);
        assert_eq!(mock.attempts(), 1);
    }

    #[tokio::test]
    async fn test_mock_transport_failure_mode() {
        let mock = MockTransport::new();
        mock.set_should_fail(true);

        let result = mock.post_batch(&BatchPayload::new(vec![])).await;
        assert!(result.unwrap_err().is_transient());
        assert!(mock.batches().is_empty());
        assert_eq!(mock.attempts(), 1);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::fixed();
        let start = clock.now();
        clock.advance(Duration::seconds(42));
        assert_eq!((clock.now() - start).num_seconds(), 42);
    }
}
