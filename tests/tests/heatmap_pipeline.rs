//! Clicks in, heatmap out: collector queries, server overlays and the
//! viewer working from stored events.

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Duration;
use collector::{EventStore, MemoryEventStore};
use footprint_core::limits::DEFAULT_GRID_SIZE;
use footprint_core::{DeviceFilter, HeatmapPoint, HeatmapQuery, HeatmapResponse, Result};
use heatmap::{HeatmapConfig, HeatmapSource, HeatmapView, HeatmapViewer, OverlaySurface};
use integration_tests::{fixtures, mocks::StaticHeatmapSource, setup::TestContext};
use std::sync::Arc;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Stores three desktop clicks on the centre of `/pricing`, one mobile
/// click, one click on another page and one from the previous day.
async fn seed_clicks(ctx: &TestContext) {
    let session = fixtures::session_id();
    let day = fixtures::base_time();
    let events = vec![
        fixtures::click_envelope(fixtures::click(&session, "/pricing", 640.0, 400.0, 1280, day)),
        fixtures::click_envelope(fixtures::click(&session, "/pricing", 640.0, 400.0, 1280, day)),
        fixtures::click_envelope(fixtures::click(&session, "/pricing", 128.0, 80.0, 1280, day)),
        fixtures::click_envelope(fixtures::click(&session, "/pricing", 187.5, 400.0, 375, day)),
        fixtures::click_envelope(fixtures::click(&session, "/about", 640.0, 400.0, 1280, day)),
        fixtures::click_envelope(fixtures::click(
            &session,
            "/pricing",
            640.0,
            400.0,
            1280,
            day - Duration::days(1),
        )),
    ];
    ctx.server
        .post("/api/analytics/batch")
        .text(fixtures::batch_body(&events))
        .await
        .assert_status_ok();
}

/// Reads points straight from a store, as the collector endpoint would.
struct StoreSource(MemoryEventStore);

#[async_trait]
impl HeatmapSource for StoreSource {
    async fn fetch_points(&self, query: &HeatmapQuery) -> Result<Vec<HeatmapPoint>> {
        self.0.heatmap_points(query, DEFAULT_GRID_SIZE).await
    }
}

/// Counts painted rectangles.
#[derive(Default)]
struct RecordingSurface {
    cleared: usize,
    rects: Vec<(u32, u32, u32, u32, [u8; 4])>,
}

impl OverlaySurface for RecordingSurface {
    fn dimensions(&self) -> (u32, u32) {
        (1000, 500)
    }

    fn clear(&mut self) {
        self.cleared += 1;
        self.rects.clear();
    }

    fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: [u8; 4]) {
        self.rects.push((x, y, width, height, color));
    }
}

#[tokio::test]
async fn test_points_are_in_percent_space() {
    let ctx = TestContext::new();
    seed_clicks(&ctx).await;

    let response = ctx
        .server
        .get("/api/analytics/heatmap")
        .add_query_param("page_path", "/pricing")
        .await;

    response.assert_status_ok();
    let body: HeatmapResponse = response.json();
    assert_eq!(body.points.len(), 5);
    assert!(body.points.contains(&HeatmapPoint::click(50.0, 50.0)));
    assert!(body.points.contains(&HeatmapPoint::click(10.0, 10.0)));
}

#[tokio::test]
async fn test_device_and_date_filters() {
    let ctx = TestContext::new();
    seed_clicks(&ctx).await;

    let desktop: HeatmapResponse = ctx
        .server
        .get("/api/analytics/heatmap")
        .add_query_param("page_path", "/pricing")
        .add_query_param("device_type", "desktop")
        .add_query_param("start_date", "2024-03-01")
        .await
        .json();
    assert_eq!(desktop.points.len(), 3);

    let mobile: HeatmapResponse = ctx
        .server
        .get("/api/analytics/heatmap")
        .add_query_param("page_path", "/pricing")
        .add_query_param("device_type", "mobile")
        .await
        .json();
    assert_eq!(mobile.points, vec![HeatmapPoint::click(50.0, 50.0)]);
}

#[tokio::test]
async fn test_invalid_queries_return_400() {
    let ctx = TestContext::new();

    let missing = ctx.server.get("/api/analytics/heatmap").await;
    missing.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(missing.json::<serde_json::Value>()["code"], "VALID_003");

    let reversed = ctx
        .server
        .get("/api/analytics/heatmap")
        .add_query_param("page_path", "/pricing")
        .add_query_param("start_date", "2024-03-02")
        .add_query_param("end_date", "2024-03-01")
        .await;
    reversed.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(reversed.json::<serde_json::Value>()["code"], "VALID_003");

    let bad_date = ctx
        .server
        .get("/api/analytics/heatmap")
        .add_query_param("page_path", "/pricing")
        .add_query_param("start_date", "yesterday")
        .await;
    bad_date.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_overlay_is_png() {
    let ctx = TestContext::new();
    seed_clicks(&ctx).await;

    let response = ctx
        .server
        .get("/api/analytics/heatmap/overlay")
        .add_query_param("page_path", "/pricing")
        .add_query_param("grid_size", "50")
        .add_query_param("width", "200")
        .add_query_param("height", "100")
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "image/png");
    assert!(response.as_bytes().starts_with(&PNG_SIGNATURE));
}

#[tokio::test]
async fn test_overlay_bounds_are_checked() {
    let ctx = TestContext::new();

    let cases = [
        ("grid_size", "0"),
        ("grid_size", "5000"),
        ("width", "0"),
        ("height", "100000"),
    ];
    for (key, value) in cases {
        let response = ctx
            .server
            .get("/api/analytics/heatmap/overlay")
            .add_query_param("page_path", "/pricing")
            .add_query_param(key, value)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<serde_json::Value>()["code"],
            "VALID_003",
            "{}={}",
            key,
            value
        );
    }
}

#[tokio::test]
async fn test_viewer_renders_stored_clicks() {
    let ctx = TestContext::new();
    seed_clicks(&ctx).await;

    let viewer = HeatmapViewer::new(
        Arc::new(StoreSource(ctx.store.clone())),
        HeatmapConfig::default(),
    );
    let query = HeatmapQuery::new("/pricing").with_device(DeviceFilter::Desktop);

    let view = viewer.load(&query).await;
    let grid = view.grid().expect("ready view");
    assert_eq!(grid.size(), DEFAULT_GRID_SIZE);
    assert_eq!(grid.get(50, 50), 1.0, "densest cell is normalized to one");
    assert!(grid.get(10, 10) > 0.0);
    assert_eq!(grid.get(90, 90), 0.0);
    assert_eq!(grid.device(), DeviceFilter::Desktop);

    let mut surface = RecordingSurface::default();
    let painted = viewer.paint(&mut surface);
    assert!(painted > 0);
    assert_eq!(surface.rects.len(), painted);
    assert!(surface.rects.iter().all(|r| r.4[3] == 153), "opacity 0.6");

    assert!(!viewer.toggle_visible());
    assert_eq!(viewer.paint(&mut surface), 0);
    assert!(surface.rects.is_empty());
}

#[tokio::test]
async fn test_viewer_rescales_to_configured_grid() {
    let source = Arc::new(StaticHeatmapSource::new(vec![HeatmapPoint::click(50.0, 25.0)]));
    let config = HeatmapConfig {
        grid_size: 20,
        blur_radius: 0,
        ..HeatmapConfig::default()
    };
    let viewer = HeatmapViewer::new(source.clone(), config);

    let view = viewer.load(&HeatmapQuery::new("/")).await;
    let grid = view.grid().expect("ready view");
    assert_eq!(grid.nonzero_count(), 1);
    assert_eq!(grid.get(10, 5), 1.0);
    assert_eq!(source.requests().len(), 1);
}

#[tokio::test]
async fn test_viewer_empty_and_error_states() {
    let viewer = HeatmapViewer::new(
        Arc::new(StaticHeatmapSource::new(Vec::new())),
        HeatmapConfig::default(),
    );
    assert_eq!(viewer.load(&HeatmapQuery::new("/")).await, HeatmapView::Empty);

    let failing = HeatmapViewer::new(
        Arc::new(StaticHeatmapSource::failing(503)),
        HeatmapConfig::default(),
    );
    match failing.load(&HeatmapQuery::new("/")).await {
        HeatmapView::Error { retryable, .. } => assert!(retryable),
        other => panic!("expected an error view, got {:?}", other),
    }

    let mut surface = RecordingSurface::default();
    assert_eq!(failing.paint(&mut surface), 0);
    assert_eq!(surface.cleared, 1);
}

#[tokio::test]
async fn test_viewer_rejects_query_without_page() {
    let source = Arc::new(StaticHeatmapSource::new(vec![HeatmapPoint::click(1.0, 1.0)]));
    let viewer = HeatmapViewer::new(source.clone(), HeatmapConfig::default());

    match viewer.load(&HeatmapQuery::new("")).await {
        HeatmapView::Error { retryable, .. } => assert!(!retryable),
        other => panic!("expected an error view, got {:?}", other),
    }
    assert!(source.requests().is_empty());
}
