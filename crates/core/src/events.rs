//! Event records and the batch envelope carried over the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::device::{Browser, DeviceType};
use crate::error::{Error, Result, ValidationErrorCode};
use crate::limits::{MAX_BATCH_EVENTS, MAX_ELEMENT_TEXT_CHARS};
use crate::location::LocationSignal;
use crate::session::SessionId;
use crate::traffic::TrafficSource;

/// The record of a single page load.
///
/// `duration_seconds`, `scroll_depth_percent` and `exit_page` are revised
/// while the page is open and frozen at unload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub session_id: SessionId,
    #[validate(length(max = 2000))]
    pub page_path: String,
    #[validate(length(max = 500))]
    pub page_title: String,
    pub timestamp: DateTime<Utc>,
    #[validate(range(min = 0.0))]
    pub duration_seconds: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub scroll_depth_percent: f64,
    pub exit_page: bool,
    pub device_type: DeviceType,
    pub browser: Browser,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl PageView {
    /// Raises the recorded scroll depth; lower values are ignored.
    pub fn record_scroll_depth(&mut self, depth: f64) -> bool {
        let depth = depth.clamp(0.0, 100.0);
        if depth > self.scroll_depth_percent {
            self.scroll_depth_percent = depth;
            true
        } else {
            false
        }
    }
}

/// Interaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Click,
    Move,
    Scroll,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Move => "move",
            Self::Scroll => "scroll",
        }
    }
}

/// A discrete user action. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub session_id: SessionId,
    pub event_type: InteractionType,
    #[validate(length(max = 256))]
    pub element_selector: String,
    #[validate(length(max = 100))]
    pub element_text: String,
    pub x_position: f64,
    pub y_position: f64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub timestamp: DateTime<Utc>,
    #[validate(length(max = 2000))]
    pub page_path: String,
}

/// Keeps at most `MAX_ELEMENT_TEXT_CHARS` characters of trimmed text.
pub fn truncate_element_text(text: &str) -> String {
    text.trim().chars().take(MAX_ELEMENT_TEXT_CHARS).collect()
}

/// Envelope type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    PageView,
    Interaction,
    TrafficSource,
    Location,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageView => "pageView",
            Self::Interaction => "interaction",
            Self::TrafficSource => "trafficSource",
            Self::Location => "location",
        }
    }
}

/// Typed envelope contents.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    PageView(PageView),
    Interaction(InteractionEvent),
    TrafficSource(TrafficSource),
    Location(LocationSignal),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PageView(_) => EventKind::PageView,
            Self::Interaction(_) => EventKind::Interaction,
            Self::TrafficSource(_) => EventKind::TrafficSource,
            Self::Location(_) => EventKind::Location,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::PageView(p) => &p.session_id,
            Self::Interaction(i) => &i.session_id,
            Self::TrafficSource(t) => &t.session_id,
            Self::Location(l) => &l.session_id,
        }
    }

    fn validate(&self) -> Result<()> {
        let result = match self {
            Self::PageView(p) => p.validate(),
            Self::Interaction(i) => i.validate(),
            Self::TrafficSource(t) => t.validate(),
            Self::Location(_) => Ok(()),
        };
        result.map_err(|e| Error::validation(e.to_string()))
    }
}

/// One queued event: `{type, data, timestamp}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub struct EventEnvelope {
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(payload: EventPayload, timestamp: DateTime<Utc>) -> Self {
        Self { payload, timestamp }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn session_id(&self) -> &SessionId {
        self.payload.session_id()
    }

    /// Parses and validates one envelope from untyped JSON.
    pub fn from_value(value: Value) -> Result<Self> {
        let envelope: Self = serde_json::from_value(value)?;
        envelope.payload.validate()?;
        Ok(envelope)
    }
}

#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: EventKind,
    data: Value,
    timestamp: DateTime<Utc>,
}

impl TryFrom<RawEnvelope> for EventEnvelope {
    type Error = serde_json::Error;

    fn try_from(raw: RawEnvelope) -> std::result::Result<Self, Self::Error> {
        let payload = match raw.kind {
            EventKind::PageView => EventPayload::PageView(serde_json::from_value(raw.data)?),
            EventKind::Interaction => {
                EventPayload::Interaction(serde_json::from_value(raw.data)?)
            }
            EventKind::TrafficSource => {
                EventPayload::TrafficSource(serde_json::from_value(raw.data)?)
            }
            EventKind::Location => EventPayload::Location(serde_json::from_value(raw.data)?),
        };
        Ok(Self {
            payload,
            timestamp: raw.timestamp,
        })
    }
}

impl From<EventEnvelope> for RawEnvelope {
    fn from(envelope: EventEnvelope) -> Self {
        let kind = envelope.kind();
        // Record types are plain derived structs; serializing them cannot fail.
        let data = match envelope.payload {
            EventPayload::PageView(p) => serde_json::to_value(p),
            EventPayload::Interaction(i) => serde_json::to_value(i),
            EventPayload::TrafficSource(t) => serde_json::to_value(t),
            EventPayload::Location(l) => serde_json::to_value(l),
        }
        .unwrap_or(Value::Null);
        Self {
            kind,
            data,
            timestamp: envelope.timestamp,
        }
    }
}

/// Body of `POST /api/analytics/batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPayload {
    pub events: Vec<EventEnvelope>,
}

impl BatchPayload {
    pub fn new(events: Vec<EventEnvelope>) -> Self {
        Self { events }
    }

    /// Parses a batch body, keeping valid events and collecting per-event
    /// errors instead of rejecting the whole batch.
    pub fn parse(bytes: &[u8]) -> Result<(Vec<EventEnvelope>, Vec<Error>)> {
        #[derive(Deserialize)]
        struct RawBatch {
            events: Vec<Value>,
        }

        let raw: RawBatch = serde_json::from_slice(bytes).map_err(|e| {
            Error::validation_code(ValidationErrorCode::InvalidFormat, e.to_string())
        })?;

        if raw.events.len() > MAX_BATCH_EVENTS {
            return Err(Error::validation_code(
                ValidationErrorCode::BatchTooLarge,
                format!(
                    "Batch has {} events, exceeds {} limit",
                    raw.events.len(),
                    MAX_BATCH_EVENTS
                ),
            ));
        }

        let mut events = Vec::with_capacity(raw.events.len());
        let mut errors = Vec::new();
        for (index, value) in raw.events.into_iter().enumerate() {
            match EventEnvelope::from_value(value) {
                Ok(event) => events.push(event),
                Err(e) => errors.push(Error::validation(format!("event {}: {}", index, e))),
            }
        }
        Ok((events, errors))
    }
}

/// Body of the unload beacon sent to `/api/analytics/track`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UnloadBeacon {
    pub session_id: SessionId,
    #[validate(length(max = 2000))]
    pub page_path: String,
    #[validate(range(min = 0.0))]
    pub duration_seconds: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub scroll_depth_percent: f64,
    pub exit_page: bool,
}

impl From<&PageView> for UnloadBeacon {
    fn from(view: &PageView) -> Self {
        Self {
            session_id: view.session_id.clone(),
            page_path: view.page_path.clone(),
            duration_seconds: view.duration_seconds,
            scroll_depth_percent: view.scroll_depth_percent,
            exit_page: view.exit_page,
        }
    }
}
