//! Tracker lifecycle: page load through unload, against a capturing
//! transport and a manual clock.

use chrono::Duration;
use footprint_core::{BatchPayload, EventKind, EventPayload, GeoLocation, SourceType};
use integration_tests::{
    fixtures,
    mocks::FailingStorage,
    setup::TrackerHarness,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracker::{BeaconEndpoint, MemoryStorage, PlatformSignal, TrackerConfig};

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn kinds(harness: &TrackerHarness) -> Vec<EventKind> {
    harness.tracker.queue().pending().iter().map(|e| e.kind()).collect()
}

#[tokio::test]
async fn test_first_load_records_view_and_source() {
    let harness = TrackerHarness::without_location(Arc::new(MemoryStorage::new()));

    harness.tracker.handle(fixtures::page_load(
        "https://shop.example.com/pricing?utm_source=newsletter&utm_medium=email&utm_campaign=spring",
        "",
        1280,
    ));

    assert_eq!(kinds(&harness), vec![EventKind::PageView, EventKind::TrafficSource]);

    let pending = harness.tracker.queue().pending();
    let EventPayload::TrafficSource(source) = &pending[1].payload else {
        panic!("expected a traffic source");
    };
    assert_eq!(source.source_type, SourceType::Email);
    assert_eq!(source.campaign.as_deref(), Some("spring"));
    assert_eq!(source.landing_page, "/pricing");

    let session = harness.tracker.session().unwrap();
    assert_eq!(session.entry_page, "/pricing");
    assert_eq!(session.utm_source.as_deref(), Some("newsletter"));
}

#[tokio::test]
async fn test_session_survives_reload_in_same_tab() {
    let storage = Arc::new(MemoryStorage::new());

    let first = TrackerHarness::without_location(storage.clone());
    first
        .tracker
        .handle(fixtures::page_load("https://example.com/", "", 1280));
    let first_id = first.tracker.session_id().unwrap();

    // Same tab storage, new page instance.
    let second = TrackerHarness::without_location(storage);
    second
        .tracker
        .handle(fixtures::page_load("https://example.com/docs", "https://example.com/", 1280));

    assert_eq!(second.tracker.session_id().unwrap(), first_id);
    assert_eq!(
        kinds(&second),
        vec![EventKind::PageView],
        "a continuing session is not classified again"
    );
}

#[tokio::test]
async fn test_unavailable_storage_keeps_one_id_per_page() {
    let harness = TrackerHarness::without_location(Arc::new(FailingStorage));

    harness
        .tracker
        .handle(fixtures::page_load("https://example.com/a", "", 1280));
    harness
        .tracker
        .handle(fixtures::page_load("https://example.com/b", "", 1280));

    let ids: Vec<_> = harness
        .tracker
        .queue()
        .pending()
        .iter()
        .map(|e| e.session_id().clone())
        .collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(
        kinds(&harness),
        vec![EventKind::PageView, EventKind::TrafficSource, EventKind::PageView]
    );
}

#[tokio::test]
async fn test_unload_sends_summary_and_remaining_events() {
    let harness = TrackerHarness::without_location(Arc::new(MemoryStorage::new()));

    harness
        .tracker
        .handle(fixtures::page_load("https://example.com/article", "", 1280));
    harness.tracker.handle(fixtures::scroll_to(60.0));
    harness.tracker.handle(fixtures::scroll_to(30.0));
    harness.tracker.handle(fixtures::click_signal(400.0, 300.0));
    harness.clock.advance(Duration::seconds(42));
    harness.tracker.handle(PlatformSignal::Unload);

    let summaries = harness.track_beacons();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["pagePath"], "/article");
    assert_eq!(summaries[0]["durationSeconds"], 42.0);
    assert_eq!(summaries[0]["scrollDepthPercent"], 60.0);
    assert_eq!(summaries[0]["exitPage"], true);

    let batches = harness.transport.beacons_to(BeaconEndpoint::Batch);
    assert_eq!(batches.len(), 1);
    let (events, rejected) = BatchPayload::parse(&batches[0]).unwrap();
    assert!(rejected.is_empty());
    assert!(events.iter().any(|e| matches!(
        &e.payload,
        EventPayload::Interaction(i) if i.element_selector == "button.btn.cta"
    )));

    assert!(harness.tracker.queue().is_empty());
    assert!(harness.tracker.session().unwrap().is_ended());
}

#[tokio::test]
async fn test_hidden_then_unload_finalizes_once() {
    let harness = TrackerHarness::without_location(Arc::new(MemoryStorage::new()));

    harness
        .tracker
        .handle(fixtures::page_load("https://example.com/", "", 1280));
    harness.clock.advance(Duration::seconds(5));
    harness.tracker.handle(PlatformSignal::VisibilityHidden);
    harness.clock.advance(Duration::seconds(5));
    harness.tracker.handle(PlatformSignal::Unload);

    let summaries = harness.track_beacons();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["durationSeconds"], 5.0);
}

#[tokio::test]
async fn test_returning_to_hidden_tab_keeps_capturing() {
    let harness = TrackerHarness::without_location(Arc::new(MemoryStorage::new()));

    harness
        .tracker
        .handle(fixtures::page_load("https://example.com/", "", 1280));
    harness.clock.advance(Duration::seconds(5));
    harness.tracker.handle(PlatformSignal::VisibilityHidden);
    harness.clock.advance(Duration::seconds(60));
    harness.tracker.handle(PlatformSignal::VisibilityVisible);
    harness.tracker.handle(fixtures::click_signal(200.0, 150.0));

    assert_eq!(kinds(&harness), vec![EventKind::Interaction]);

    harness.clock.advance(Duration::seconds(10));
    harness.tracker.handle(PlatformSignal::Unload);

    let summaries = harness.track_beacons();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0]["durationSeconds"], 5.0);
    assert_eq!(summaries[1]["durationSeconds"], 75.0);

    let batches = harness.transport.beacons_to(BeaconEndpoint::Batch);
    assert_eq!(batches.len(), 2);
    let (events, _) = BatchPayload::parse(&batches[1]).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), EventKind::Interaction);
}

#[tokio::test]
async fn test_route_change_freezes_previous_page() {
    let harness = TrackerHarness::without_location(Arc::new(MemoryStorage::new()));

    harness
        .tracker
        .handle(fixtures::page_load("https://example.com/a", "", 1280));
    harness.tracker.handle(fixtures::scroll_to(40.0));
    harness.clock.advance(Duration::seconds(12));
    harness
        .tracker
        .handle(fixtures::page_load("https://example.com/b", "https://example.com/a", 1280));
    harness.clock.advance(Duration::seconds(3));
    harness.tracker.handle(PlatformSignal::Unload);

    let summaries = harness.track_beacons();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0]["pagePath"], "/a");
    assert_eq!(summaries[0]["durationSeconds"], 12.0);
    assert_eq!(summaries[0]["scrollDepthPercent"], 40.0);
    assert_eq!(summaries[0]["exitPage"], false);
    assert_eq!(summaries[1]["pagePath"], "/b");
    assert_eq!(summaries[1]["durationSeconds"], 3.0);
    assert_eq!(summaries[1]["exitPage"], true);
}

#[tokio::test]
async fn test_entry_page_survives_navigation() {
    let storage = Arc::new(MemoryStorage::new());

    let landing = TrackerHarness::without_location(storage.clone());
    landing.tracker.handle(fixtures::page_load(
        "https://example.com/landing?utm_source=newsletter",
        "https://mail.example.org/",
        1280,
    ));
    landing.tracker.handle(PlatformSignal::Unload);

    let docs = TrackerHarness::without_location(storage);
    docs.clock.advance(Duration::minutes(2));
    docs.tracker
        .handle(fixtures::page_load("https://example.com/docs", "https://example.com/landing", 1280));

    let session = docs.tracker.session().unwrap();
    assert_eq!(session.entry_page, "/landing");
    assert_eq!(session.referrer, "https://mail.example.org/");
    assert_eq!(session.utm_source.as_deref(), Some("newsletter"));
    assert_eq!(session.started_at, fixtures::base_time());
    assert!(!session.is_ended());
}

#[tokio::test]
async fn test_signals_after_unload_are_ignored() {
    let harness = TrackerHarness::without_location(Arc::new(MemoryStorage::new()));

    harness
        .tracker
        .handle(fixtures::page_load("https://example.com/", "", 1280));
    harness.tracker.handle(PlatformSignal::Unload);
    harness.tracker.handle(fixtures::click_signal(10.0, 10.0));

    assert!(harness.tracker.queue().is_empty());
}

#[tokio::test]
async fn test_location_attached_for_new_session() {
    let harness = TrackerHarness::new(TrackerConfig::default(), Arc::new(MemoryStorage::new()));
    harness.transport.set_location(Some(GeoLocation {
        country_code: "DE".into(),
        country_name: "Germany".into(),
        city: "Berlin".into(),
        ..GeoLocation::unknown()
    }));

    harness
        .tracker
        .handle(fixtures::page_load("https://example.com/", "", 1280));
    settle().await;

    let pending = harness.tracker.queue().pending();
    let location = pending.iter().find_map(|e| match &e.payload {
        EventPayload::Location(signal) => Some(signal),
        _ => None,
    });
    let location = location.expect("location event");
    assert_eq!(location.location.city, "Berlin");
    assert_eq!(&location.session_id, pending[0].session_id());
}

#[tokio::test]
async fn test_failed_location_does_not_block_tracking() {
    let harness = TrackerHarness::new(TrackerConfig::default(), Arc::new(MemoryStorage::new()));
    harness.transport.set_location(None);

    harness
        .tracker
        .handle(fixtures::page_load("https://example.com/", "", 1280));
    settle().await;
    harness.tracker.handle(fixtures::click_signal(1.0, 2.0));

    assert_eq!(
        kinds(&harness),
        vec![EventKind::PageView, EventKind::TrafficSource, EventKind::Interaction]
    );
}

#[tokio::test]
async fn test_closed_signal_source_runs_unload() {
    let harness = TrackerHarness::without_location(Arc::new(MemoryStorage::new()));
    let (tx, rx) = mpsc::channel(8);

    tx.send(fixtures::page_load("https://example.com/", "", 375))
        .await
        .unwrap();
    tx.send(fixtures::click_signal(100.0, 200.0)).await.unwrap();
    drop(tx);

    harness.tracker.run(rx).await;

    assert_eq!(harness.track_beacons().len(), 1);
    let batches = harness.transport.beacons_to(BeaconEndpoint::Batch);
    let (events, _) = BatchPayload::parse(&batches[0]).unwrap();
    let EventPayload::PageView(view) = &events[0].payload else {
        panic!("expected the page view first");
    };
    assert_eq!(view.device_type, footprint_core::DeviceType::Mobile);
}
