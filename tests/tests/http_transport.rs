//! The reqwest-based clients against the collector on a real socket.

use collector::EventStore;
use footprint_core::{
    BatchPayload, Error, EventKind, EventPayload, GeoLocation, HeatmapPoint, HeatmapQuery,
    UnloadBeacon,
};
use heatmap::{HeatmapConfig, HeatmapSource, HeatmapView, HeatmapViewer, HttpHeatmapSource};
use integration_tests::{
    fixtures,
    setup::{endpoint_of, TestContext},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracker::{BeaconEndpoint, HttpTransport, PlatformTransport, TrackerConfig};

fn beacon_log_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "footprint-http-{}.jsonl",
        uuid::Uuid::new_v4().simple()
    ))
}

fn transport_for(endpoint: String) -> HttpTransport {
    let config = TrackerConfig {
        endpoint,
        beacon_log_path: beacon_log_path(),
        ..TrackerConfig::default()
    };
    HttpTransport::new(&config).expect("valid transport config")
}

#[tokio::test]
async fn test_post_batch_is_stored() {
    let ctx = TestContext::over_http();
    let transport = transport_for(ctx.endpoint());

    let events = fixtures::page_view_envelopes(3);
    transport
        .post_batch(&BatchPayload::new(events))
        .await
        .expect("batch accepted");

    let stored = ctx.stored_events();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|e| e.kind() == EventKind::PageView));
}

#[tokio::test]
async fn test_post_batch_maps_rejections_to_status() {
    let ctx = TestContext::over_http();
    let transport = transport_for(ctx.endpoint());

    let oversized = BatchPayload::new(fixtures::page_view_envelopes(1001));
    match transport.post_batch(&oversized).await {
        Err(Error::Status(400)) => {}
        other => panic!("expected Status(400), got {:?}", other),
    }
    assert!(ctx.stored_events().is_empty());

    let failing = TestContext::with_failing_store_over_http();
    let transport = transport_for(endpoint_of(&failing));
    let err = transport
        .post_batch(&BatchPayload::new(fixtures::page_view_envelopes(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Status(500)));
    assert!(err.is_transient(), "server errors are re-queued");
}

#[tokio::test]
async fn test_unreachable_collector_is_transient() {
    let transport = transport_for("http://127.0.0.1:9/".to_string());

    let err = transport
        .post_batch(&BatchPayload::new(fixtures::page_view_envelopes(1)))
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_fetch_location_from_collector() {
    let ctx = TestContext::over_http();
    let transport = transport_for(ctx.endpoint());

    // Loopback callers have no public address to resolve.
    let location = transport.fetch_location().await.expect("location");
    assert_eq!(location, GeoLocation::unknown());
}

#[tokio::test]
async fn test_drain_delivers_beacons_and_empties_log() {
    let ctx = TestContext::over_http();
    let transport = transport_for(ctx.endpoint());

    let session = fixtures::session_id();
    let mut view = fixtures::page_view(&session, "/docs");
    let batch = BatchPayload::new(vec![fixtures::page_view_envelope(&session, "/docs")]);
    view.duration_seconds = 31.5;
    view.scroll_depth_percent = 70.0;
    view.exit_page = true;
    let summary = UnloadBeacon::from(&view);

    assert!(transport.send_beacon(BeaconEndpoint::Batch, &serde_json::to_vec(&batch).unwrap()));
    assert!(transport.send_beacon(BeaconEndpoint::Track, &serde_json::to_vec(&summary).unwrap()));
    assert_eq!(transport.beacon_log().records().unwrap().len(), 2);

    let delivered = transport.drain_beacons().await.unwrap();

    assert_eq!(delivered, 2);
    assert!(transport.beacon_log().records().unwrap().is_empty());
    assert_eq!(ctx.store.unloads(), vec![summary]);
    match &ctx.stored_events()[0].payload {
        EventPayload::PageView(stored) => {
            assert_eq!(stored.duration_seconds, 31.5);
            assert!(stored.exit_page);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[tokio::test]
async fn test_drain_keeps_rejected_beacons() {
    let ctx = TestContext::over_http();
    let transport = transport_for(ctx.endpoint());

    let invalid = serde_json::json!({
        "sessionId": "s_1_abc",
        "pagePath": "/docs",
        "durationSeconds": -1.0,
        "scrollDepthPercent": 10.0,
        "exitPage": true
    });
    let valid = BatchPayload::new(fixtures::page_view_envelopes(1));
    assert!(transport.send_beacon(BeaconEndpoint::Track, invalid.to_string().as_bytes()));
    assert!(transport.send_beacon(BeaconEndpoint::Batch, &serde_json::to_vec(&valid).unwrap()));

    let delivered = transport.drain_beacons().await.unwrap();

    assert_eq!(delivered, 1);
    let remaining = transport.beacon_log().records().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].endpoint, BeaconEndpoint::Track.path());
    assert_eq!(remaining[0].body, invalid);
    assert_eq!(ctx.stored_events().len(), 1);

    std::fs::remove_file(transport.beacon_log().path()).unwrap();
}

#[tokio::test]
async fn test_heatmap_source_over_http() {
    let ctx = TestContext::over_http();
    let session = fixtures::session_id();
    let day = fixtures::base_time();
    let clicks: Vec<_> = [(640.0, 400.0), (640.0, 400.0), (128.0, 80.0)]
        .into_iter()
        .map(|(x, y)| fixtures::click_envelope(fixtures::click(&session, "/pricing", x, y, 1280, day)))
        .collect();
    ctx.store.append(clicks).await.unwrap();

    let config = HeatmapConfig {
        endpoint: ctx.endpoint(),
        ..HeatmapConfig::default()
    };
    let source = Arc::new(HttpHeatmapSource::new(&config).expect("valid heatmap config"));

    let points = source
        .fetch_points(&HeatmapQuery::new("/pricing"))
        .await
        .unwrap();
    assert_eq!(points.len(), 3);
    assert!(points.contains(&HeatmapPoint::click(50.0, 50.0)));

    match source.fetch_points(&HeatmapQuery::new("")).await {
        Err(Error::Status(400)) => {}
        other => panic!("expected Status(400), got {:?}", other),
    }

    let viewer = HeatmapViewer::new(source, config);
    let view = viewer.load(&HeatmapQuery::new("/pricing")).await;
    assert!(view.is_ready());
    assert_eq!(viewer.load(&HeatmapQuery::new("/none")).await, HeatmapView::Empty);
}
