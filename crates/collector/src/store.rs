//! Event storage behind the collector.

use async_trait::async_trait;
use footprint_core::{
    DeviceType, Error, EventEnvelope, EventPayload, HeatmapPoint, HeatmapQuery, InteractionType,
    Result, UnloadBeacon, ValidationErrorCode,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::debug;

/// Persistence for accepted events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Stores a batch; returns how many events were kept.
    async fn append(&self, events: Vec<EventEnvelope>) -> Result<usize>;

    /// Applies an unload summary to the page view it describes.
    async fn record_unload(&self, beacon: UnloadBeacon) -> Result<()>;

    /// Click points for a page in a `grid_size` grid.
    async fn heatmap_points(
        &self,
        query: &HeatmapQuery,
        grid_size: usize,
    ) -> Result<Vec<HeatmapPoint>>;

    /// Number of stored events.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Process-lifetime store. With a retention cap, the oldest events and
/// unload summaries are dropped once the cap is exceeded.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
    unloads: Arc<Mutex<Vec<UnloadBeacon>>>,
    max_events: Option<usize>,
}

impl MemoryEventStore {
    /// Unbounded store, for tests and short-lived tools.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store keeping at most `max_events` events; `0` means unbounded.
    pub fn with_max_events(max_events: usize) -> Self {
        Self {
            max_events: (max_events > 0).then_some(max_events),
            ..Self::default()
        }
    }

    pub fn max_events(&self) -> Option<usize> {
        self.max_events
    }

    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.read().clone()
    }

    pub fn unloads(&self) -> Vec<UnloadBeacon> {
        self.unloads.lock().clone()
    }

    pub fn clear(&self) {
        self.events.write().clear();
        self.unloads.lock().clear();
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>) -> Result<usize> {
        let count = events.len();
        let mut stored = self.events.write();
        stored.extend(events);
        if let Some(evicted) = overflow(stored.len(), self.max_events) {
            stored.drain(..evicted);
            debug!(evicted, retained = stored.len(), "Evicted oldest events");
        }
        Ok(count)
    }

    async fn record_unload(&self, beacon: UnloadBeacon) -> Result<()> {
        {
            let mut events = self.events.write();
            // The latest page view for this session and path is the one
            // being left.
            let view = events.iter_mut().rev().find_map(|e| match &mut e.payload {
                EventPayload::PageView(view)
                    if view.session_id == beacon.session_id
                        && view.page_path == beacon.page_path =>
                {
                    Some(view)
                }
                _ => None,
            });
            if let Some(view) = view {
                view.duration_seconds = beacon.duration_seconds;
                view.record_scroll_depth(beacon.scroll_depth_percent);
                view.exit_page = beacon.exit_page;
            }
        }
        let mut unloads = self.unloads.lock();
        unloads.push(beacon);
        if let Some(evicted) = overflow(unloads.len(), self.max_events) {
            unloads.drain(..evicted);
        }
        Ok(())
    }

    async fn heatmap_points(
        &self,
        query: &HeatmapQuery,
        grid_size: usize,
    ) -> Result<Vec<HeatmapPoint>> {
        if grid_size == 0 {
            return Err(Error::validation_code(
                ValidationErrorCode::InvalidQuery,
                "grid size must be positive",
            ));
        }
        let range = query.range();
        let events = self.events.read();

        Ok(events
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::Interaction(i) => Some(i),
                _ => None,
            })
            .filter(|i| i.event_type == InteractionType::Click)
            .filter(|i| i.page_path == query.page_path)
            .filter(|i| range.contains(i.timestamp))
            .filter(|i| {
                query
                    .device_type
                    .matches(DeviceType::from_width(i.viewport_width))
            })
            .filter_map(|i| {
                HeatmapPoint::from_pixels(
                    i.x_position,
                    i.y_position,
                    i.viewport_width,
                    i.viewport_height,
                    grid_size,
                )
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.events.read().len()
    }
}

fn overflow(len: usize, cap: Option<usize>) -> Option<usize> {
    cap.filter(|cap| len > *cap).map(|cap| len - cap)
}
