//! Buffered, batched event delivery.
//!
//! Events are flushed when the buffer reaches the batch size, on a fixed
//! timer, or at unload. A failed flush puts its batch back at the front of
//! the buffer so the next tick retries it (at-least-once delivery).

use footprint_core::{BatchPayload, EventEnvelope};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error, warn};

use crate::platform::{BeaconEndpoint, PlatformTransport};

/// Queue sizing.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Buffered events that trigger a flush
    pub batch_size: usize,
    /// Oldest events are dropped past this size
    pub max_buffered: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: footprint_core::limits::DEFAULT_BATCH_SIZE,
            max_buffered: footprint_core::limits::DEFAULT_MAX_BUFFERED_EVENTS,
        }
    }
}

/// What a flush call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The batch was accepted.
    Sent(usize),
    /// The send failed and the batch went back to the front of the buffer.
    Requeued(usize),
    /// Nothing buffered.
    Empty,
    /// Another flush was already running.
    InFlight,
}

/// Clears the in-flight flag when a flush ends, however it ends.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// In-memory event buffer with timer, threshold and unload flushing.
pub struct DeliveryQueue {
    transport: Arc<dyn PlatformTransport>,
    config: QueueConfig,
    buffer: Mutex<Vec<EventEnvelope>>,
    flushing: AtomicBool,
}

impl DeliveryQueue {
    pub fn new(transport: Arc<dyn PlatformTransport>, config: QueueConfig) -> Self {
        Self {
            transport,
            config,
            buffer: Mutex::new(Vec::new()),
            flushing: AtomicBool::new(false),
        }
    }

    /// Buffers an event. Reaching the batch size schedules a flush on the
    /// current runtime without waiting for it; returns whether one was
    /// scheduled.
    pub fn enqueue(self: &Arc<Self>, envelope: EventEnvelope) -> bool {
        metrics().events_enqueued.inc();
        let depth = {
            let mut buffer = self.buffer.lock();
            buffer.push(envelope);
            self.enforce_cap(&mut buffer);
            buffer.len()
        };

        if depth < self.config.batch_size || self.is_flushing() {
            return false;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let queue = Arc::clone(self);
                handle.spawn(async move {
                    queue.flush().await;
                });
                true
            }
            Err(_) => {
                debug!(depth, "No runtime for threshold flush, waiting for timer");
                false
            }
        }
    }

    /// Sends everything buffered as one batch.
    ///
    /// Not re-entrant: a call made while another flush is running returns
    /// [`FlushOutcome::InFlight`] and leaves the buffer alone.
    pub async fn flush(&self) -> FlushOutcome {
        let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
            metrics().flushes_skipped.inc();
            return FlushOutcome::InFlight;
        };

        let events = std::mem::take(&mut *self.buffer.lock());
        if events.is_empty() {
            return FlushOutcome::Empty;
        }

        let count = events.len();
        let start = Instant::now();
        let payload = BatchPayload::new(events);

        match self.transport.post_batch(&payload).await {
            Ok(()) => {
                let elapsed = start.elapsed();
                metrics().flushes.inc();
                metrics().events_sent.inc_by(count as u64);
                metrics().flush_latency_ms.observe(elapsed.as_millis() as u64);
                self.update_depth();

                debug!(
                    count = count,
                    latency_ms = %elapsed.as_millis(),
                    "Flushed batch"
                );
                FlushOutcome::Sent(count)
            }
            Err(e) => {
                metrics().flush_failures.inc();
                warn!(error = %e, count = count, "Batch delivery failed, requeueing");
                self.requeue_front(payload.events);
                FlushOutcome::Requeued(count)
            }
        }
    }

    /// Hands everything buffered to the beacon transport. Never awaits and
    /// never retries: events the platform refuses are lost.
    pub fn flush_on_unload(&self) -> usize {
        let events = std::mem::take(&mut *self.buffer.lock());
        self.update_depth();
        if events.is_empty() {
            return 0;
        }

        let count = events.len();
        let body = match serde_json::to_vec(&BatchPayload::new(events)) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, count = count, "Failed to encode unload batch");
                metrics().beacons_failed.inc();
                return 0;
            }
        };

        if self.transport.send_beacon(BeaconEndpoint::Batch, &body) {
            metrics().beacons_sent.inc();
            metrics().events_sent.inc_by(count as u64);
            count
        } else {
            warn!(count = count, "Unload batch beacon refused, events lost");
            metrics().beacons_failed.inc();
            0
        }
    }

    /// Starts the periodic flush. The first tick fires one full interval
    /// after start.
    pub fn start_flush_task(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let FlushOutcome::Requeued(count) = self.flush().await {
                    debug!(count, "Retrying on next tick");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Copy of the buffered events, oldest first.
    pub fn pending(&self) -> Vec<EventEnvelope> {
        self.buffer.lock().clone()
    }

    fn requeue_front(&self, events: Vec<EventEnvelope>) {
        let mut buffer = self.buffer.lock();
        buffer.splice(0..0, events);
        self.enforce_cap(&mut buffer);
    }

    fn enforce_cap(&self, buffer: &mut Vec<EventEnvelope>) {
        if buffer.len() > self.config.max_buffered {
            let excess = buffer.len() - self.config.max_buffered;
            buffer.drain(..excess);
            metrics().events_dropped.inc_by(excess as u64);
            warn!(
                dropped = excess,
                max_buffered = self.config.max_buffered,
                "Delivery buffer full, dropped oldest events"
            );
        }
        metrics().buffer_depth.set(buffer.len() as u64);
    }

    fn update_depth(&self) {
        metrics().buffer_depth.set(self.buffer.lock().len() as u64);
    }
}
