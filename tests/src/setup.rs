//! Common test setup functions.

use axum::Router;
use axum_test::TestServer;
use bytes::Bytes;
use collector::{router, AppState, CollectorConfig, EventStore, HttpGeoLookup, MemoryEventStore};
use footprint_core::EventEnvelope;
use std::sync::Arc;
use tracker::{BeaconEndpoint, PlatformStorage, Tracker, TrackerConfig};

use crate::mocks::{FailingEventStore, ManualClock, MockTransport};

/// Test context around the real collector router.
///
/// This provides the same production code paths by:
/// - Using the real Axum router with all middleware
/// - Using the in-memory event store the binary runs with
/// - Using the geo client in mock mode, so no lookup service is needed
pub struct TestContext {
    pub store: MemoryEventStore,
    pub router: Router,
    pub server: TestServer,
}

impl TestContext {
    /// Create a new test context with all components initialized.
    pub fn new() -> Self {
        let store = MemoryEventStore::new();
        let router = Self::build_router(Arc::new(store.clone()));
        let server = TestServer::new(router.clone()).expect("Failed to create test server");

        Self {
            store,
            router,
            server,
        }
    }

    /// Same router listening on a local port, for the reqwest-based
    /// clients.
    pub fn over_http() -> Self {
        let store = MemoryEventStore::new();
        let router = Self::build_router(Arc::new(store.clone()));
        let server = Self::http_server(router.clone());

        Self {
            store,
            router,
            server,
        }
    }

    /// Server whose store rejects every write.
    pub fn with_failing_store() -> TestServer {
        let router = Self::build_router(Arc::new(FailingEventStore));
        TestServer::new(router).expect("Failed to create test server")
    }

    /// [`with_failing_store`](Self::with_failing_store) on a local port.
    pub fn with_failing_store_over_http() -> TestServer {
        Self::http_server(Self::build_router(Arc::new(FailingEventStore)))
    }

    fn http_server(router: Router) -> TestServer {
        TestServer::builder()
            .http_transport()
            .build(router)
            .expect("Failed to create HTTP test server")
    }

    /// Base URL of a server started with HTTP transport.
    pub fn endpoint(&self) -> String {
        endpoint_of(&self.server)
    }

    fn build_router(store: Arc<dyn EventStore>) -> Router {
        let state = AppState::new(
            store,
            Arc::new(HttpGeoLookup::mock()),
            CollectorConfig::default(),
        );
        router(state)
    }

    /// All stored events.
    pub fn stored_events(&self) -> Vec<EventEnvelope> {
        self.store.events()
    }

    /// Posts what a tracker's transport captured, the way a browser would
    /// have delivered it.
    pub async fn deliver(&self, transport: &MockTransport) {
        for batch in transport.batches() {
            self.server
                .post("/api/analytics/batch")
                .json(&batch)
                .await
                .assert_status_ok();
        }
        for (endpoint, body) in transport.beacons() {
            self.server
                .post(endpoint.path())
                .content_type("text/plain")
                .bytes(Bytes::from(body))
                .await
                .assert_status_ok();
        }
    }
}

/// Base URL of `server`; panics for mock transport.
pub fn endpoint_of(server: &TestServer) -> String {
    server
        .server_address()
        .expect("server runs with HTTP transport")
        .to_string()
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracker wired to a mock transport and a manual clock.
pub struct TrackerHarness {
    pub tracker: Tracker,
    pub transport: MockTransport,
    pub clock: Arc<ManualClock>,
}

impl TrackerHarness {
    pub fn new(config: TrackerConfig, storage: Arc<dyn PlatformStorage>) -> Self {
        let transport = MockTransport::new();
        let clock = Arc::new(ManualClock::fixed());
        let tracker = Tracker::new(
            config,
            Arc::new(transport.clone()),
            storage,
            clock.clone(),
        );
        Self {
            tracker,
            transport,
            clock,
        }
    }

    /// Tracker with location lookups off.
    pub fn without_location(storage: Arc<dyn PlatformStorage>) -> Self {
        let config = TrackerConfig {
            enable_location: false,
            ..TrackerConfig::default()
        };
        Self::new(config, storage)
    }

    /// Decoded unload summaries sent so far.
    pub fn track_beacons(&self) -> Vec<serde_json::Value> {
        self.transport
            .beacons_to(BeaconEndpoint::Track)
            .iter()
            .filter_map(|body| serde_json::from_slice(body).ok())
            .collect()
    }
}
