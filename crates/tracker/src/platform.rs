//! Host capabilities the tracker depends on.
//!
//! A browser host maps DOM listeners, `sessionStorage` and `sendBeacon`
//! onto these traits; tests and non-browser hosts supply their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use footprint_core::{BatchPayload, Error, GeoLocation, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use url::Url;

/// Wall-clock source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tab-scoped key/value storage.
pub trait PlatformStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Process-lifetime storage, standing in for tab storage outside a browser.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlatformStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Targets reachable through the teardown-safe transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeaconEndpoint {
    /// Finalized page view summary.
    Track,
    /// Remaining buffered events.
    Batch,
}

impl BeaconEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Track => "/api/analytics/track",
            Self::Batch => "/api/analytics/batch",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/api/analytics/track" => Some(Self::Track),
            "/api/analytics/batch" => Some(Self::Batch),
            _ => None,
        }
    }
}

/// Network access.
#[async_trait]
pub trait PlatformTransport: Send + Sync {
    /// POSTs one batch; non-2xx responses are errors.
    async fn post_batch(&self, payload: &BatchPayload) -> Result<()>;

    /// Schedules a send that survives page teardown. Must not block or
    /// await; returns whether the platform accepted the send.
    fn send_beacon(&self, endpoint: BeaconEndpoint, body: &[u8]) -> bool;

    /// Resolves the caller's location through the collector.
    async fn fetch_location(&self) -> Result<GeoLocation>;
}

/// Page identity at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    pub url: Url,
    pub title: String,
    pub referrer: String,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl PageContext {
    pub fn new(
        url: &str,
        title: impl Into<String>,
        referrer: impl Into<String>,
        user_agent: impl Into<String>,
        viewport_width: u32,
        viewport_height: u32,
    ) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::validation(format!("page url: {}", e)))?;
        Ok(Self {
            url,
            title: title.into(),
            referrer: referrer.into(),
            user_agent: user_agent.into(),
            viewport_width,
            viewport_height,
        })
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

/// The element a click landed on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementInfo {
    pub tag: String,
    pub id: Option<String>,
    pub class_name: String,
    pub text: String,
}

impl ElementInfo {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// `#id`, else `tag.first.second` from the class list, else the tag.
    pub fn selector(&self) -> String {
        let tag = self.tag.to_lowercase();
        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            return format!("#{}", id);
        }
        let classes: Vec<&str> = self.class_name.split_whitespace().take(2).collect();
        if classes.is_empty() {
            tag
        } else {
            format!("{}.{}", tag, classes.join("."))
        }
    }
}

/// Document scroll geometry at a scroll event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub document_height: f64,
    pub window_height: f64,
}

/// Observation-only browser signals. None of them can cancel default
/// behavior.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformSignal {
    PageLoad(PageContext),
    Scroll(ScrollMetrics),
    Click { target: ElementInfo, x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    VisibilityHidden,
    VisibilityVisible,
    Unload,
}

/// Source of browser signals.
#[async_trait]
pub trait PlatformEvents: Send {
    /// Next signal, or `None` when the host has gone away.
    async fn next_signal(&mut self) -> Option<PlatformSignal>;
}

#[async_trait]
impl PlatformEvents for mpsc::Receiver<PlatformSignal> {
    async fn next_signal(&mut self) -> Option<PlatformSignal> {
        self.recv().await
    }
}
