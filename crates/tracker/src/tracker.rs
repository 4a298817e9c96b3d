//! The per-tab tracker: wires capture, identity, enrichment and delivery to
//! the platform signal stream.

use chrono::{DateTime, Utc};
use footprint_core::{
    EventEnvelope, EventPayload, PageView, Session, SessionId, UnloadBeacon, UtmParams,
};
use parking_lot::Mutex;
use std::sync::Arc;
use telemetry::metrics;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::{EventCapture, Finalized};
use crate::config::TrackerConfig;
use crate::enrichment::EnrichmentResolver;
use crate::platform::{
    BeaconEndpoint, Clock, PageContext, PlatformEvents, PlatformSignal, PlatformStorage,
    PlatformTransport,
};
use crate::queue::{DeliveryQueue, QueueConfig};
use crate::session::{SessionHandle, SessionIdentity};

struct TrackerState {
    capture: EventCapture,
    session: Option<Session>,
}

/// Client-side tracker for one tab.
pub struct Tracker {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn PlatformTransport>,
    identity: SessionIdentity,
    resolver: Arc<EnrichmentResolver>,
    queue: Arc<DeliveryQueue>,
    state: Mutex<TrackerState>,
}

impl Tracker {
    pub fn new(
        config: TrackerConfig,
        transport: Arc<dyn PlatformTransport>,
        storage: Arc<dyn PlatformStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let queue = Arc::new(DeliveryQueue::new(
            Arc::clone(&transport),
            QueueConfig {
                batch_size: config.batch_size,
                max_buffered: config.max_buffered_events,
            },
        ));
        let resolver = Arc::new(EnrichmentResolver::new(
            Arc::clone(&transport),
            config.location_timeout(),
        ));

        Self {
            identity: SessionIdentity::new(storage, Arc::clone(&clock)),
            state: Mutex::new(TrackerState {
                capture: EventCapture::new(config.move_sample_interval()),
                session: None,
            }),
            config,
            clock,
            transport,
            resolver,
            queue,
        }
    }

    /// Starts the periodic flush timer.
    pub fn start(&self) -> JoinHandle<()> {
        info!(
            batch_size = self.config.batch_size,
            flush_interval_secs = self.config.flush_interval_secs,
            "Starting tracker"
        );
        Arc::clone(&self.queue).start_flush_task(self.config.flush_interval())
    }

    /// Processes signals until the host goes away, then runs the unload
    /// path if it has not run yet.
    pub async fn run<E: PlatformEvents>(&self, mut events: E) {
        while let Some(signal) = events.next_signal().await {
            self.handle(signal);
        }
        debug!("Signal source closed");
        self.handle(PlatformSignal::Unload);
    }

    /// Handles one platform signal. Never blocks on the network.
    pub fn handle(&self, signal: PlatformSignal) {
        let now = self.clock.now();
        match signal {
            PlatformSignal::PageLoad(ctx) => self.page_loaded(&ctx),
            PlatformSignal::Scroll(scroll) => {
                let events = self.state.lock().capture.scrolled(&scroll, now);
                for event in events {
                    self.enqueue(EventPayload::Interaction(event));
                }
            }
            PlatformSignal::Click { target, x, y } => {
                let event = self.state.lock().capture.clicked(&target, x, y, now);
                if let Some(event) = event {
                    self.enqueue(EventPayload::Interaction(event));
                }
            }
            PlatformSignal::PointerMove { x, y } => {
                let event = self.state.lock().capture.pointer_moved(x, y, now);
                if let Some(event) = event {
                    self.enqueue(EventPayload::Interaction(event));
                }
            }
            PlatformSignal::VisibilityHidden => self.hidden(),
            PlatformSignal::VisibilityVisible => self.state.lock().capture.resume(),
            PlatformSignal::Unload => self.unload(),
        }
    }

    fn page_loaded(&self, ctx: &PageContext) {
        let now = self.clock.now();
        let handle = self.identity.get_or_create();

        let (view, previous) = {
            let mut state = self.state.lock();
            if handle.is_new || state.session.is_none() {
                state.session = Some(self.resolve_session(&handle, ctx, now));
            }
            state.capture.page_loaded(handle.id.clone(), ctx, now)
        };
        if let Some(previous) = previous {
            debug!(
                session_id = %previous.session_id,
                page_path = %previous.page_path,
                duration_seconds = previous.duration_seconds,
                "Route changed"
            );
            self.send_summary(&previous);
        }
        debug!(
            session_id = %handle.id,
            page_path = %view.page_path,
            new_session = handle.is_new,
            "Page loaded"
        );
        self.enqueue(EventPayload::PageView(view));

        if handle.is_new {
            let source = self.resolver.traffic_source(handle.id.clone(), ctx, now);
            self.enqueue(EventPayload::TrafficSource(source));

            if self.config.enable_location {
                self.spawn_location_request(handle.id);
            }
        }
    }

    /// The session started by an earlier page of this tab, or a new one
    /// rooted at this page.
    fn resolve_session(
        &self,
        handle: &SessionHandle,
        ctx: &PageContext,
        now: DateTime<Utc>,
    ) -> Session {
        if !handle.is_new {
            if let Some(session) = self.identity.load_session(&handle.id) {
                return session;
            }
            debug!(session_id = %handle.id, "No stored session record, starting from this page");
        }
        let session = Session::new(
            handle.id.clone(),
            now,
            ctx.path(),
            ctx.referrer.clone(),
            UtmParams::from_query(&ctx.query_pairs()),
        );
        self.identity.save_session(&session);
        session
    }

    /// Sends a summary and hands off the buffer while the tab is hidden.
    /// Capture continues; the page may come back.
    fn hidden(&self) {
        let now = self.clock.now();
        let Some(view) = self.state.lock().capture.checkpoint(now) else {
            return;
        };
        self.send_summary(&view);
        let handed_off = self.queue.flush_on_unload();
        debug!(
            session_id = %view.session_id,
            duration_seconds = view.duration_seconds,
            handed_off,
            "Page hidden"
        );
    }

    /// Finalizes the page view, sends its summary beacon unless a hidden-tab
    /// summary already covers it, and hands the rest of the buffer to the
    /// beacon transport. Runs at most once per page.
    fn unload(&self) {
        let now = self.clock.now();
        let finalized = {
            let mut state = self.state.lock();
            let finalized = state.capture.finalize(now);
            if finalized.is_some() {
                if let Some(session) = state.session.as_mut() {
                    session.end(now);
                }
            }
            finalized
        };
        let Some(Finalized { view, owes_summary }) = finalized else {
            return;
        };

        if owes_summary {
            self.send_summary(&view);
        }
        let handed_off = self.queue.flush_on_unload();
        debug!(
            session_id = %view.session_id,
            duration_seconds = view.duration_seconds,
            handed_off,
            "Page unloaded"
        );
    }

    fn send_summary(&self, view: &PageView) {
        let beacon = UnloadBeacon::from(view);
        match serde_json::to_vec(&beacon) {
            Ok(body) => {
                if self.transport.send_beacon(BeaconEndpoint::Track, &body) {
                    metrics().beacons_sent.inc();
                } else {
                    metrics().beacons_failed.inc();
                    warn!(session_id = %view.session_id, "Unload beacon refused");
                }
            }
            Err(e) => {
                metrics().beacons_failed.inc();
                warn!(error = %e, "Failed to encode unload beacon");
            }
        }
    }

    fn enqueue(&self, payload: EventPayload) {
        self.queue
            .enqueue(EventEnvelope::new(payload, self.clock.now()));
    }

    fn spawn_location_request(&self, session_id: SessionId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime for location request, skipping");
            return;
        };
        let resolver = Arc::clone(&self.resolver);
        let queue = Arc::clone(&self.queue);
        let now = self.clock.now();

        runtime.spawn(async move {
            match resolver.request_location(session_id, now).await {
                Ok(signal) => {
                    let timestamp = signal.timestamp;
                    queue.enqueue(EventEnvelope::new(EventPayload::Location(signal), timestamp));
                }
                Err(e) => debug!(error = %e, "Location unavailable, continuing without it"),
            }
        });
    }

    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }

    pub fn session(&self) -> Option<Session> {
        self.state.lock().session.clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.state
            .lock()
            .session
            .as_ref()
            .map(|s| s.session_id.clone())
    }

    pub fn current_view(&self) -> Option<PageView> {
        self.state.lock().capture.current_view().cloned()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}
