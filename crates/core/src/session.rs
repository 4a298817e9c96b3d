//! Session handling types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tab-scoped browsing session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new id from a timestamp and a random component.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!("s_{}_{}", now.timestamp_millis(), &random[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One continuous browsing visit in a tab.
///
/// Immutable after creation except for `ended_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub entry_page: String,
    pub referrer: String,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a session for the page that started it.
    pub fn new(
        session_id: SessionId,
        started_at: DateTime<Utc>,
        entry_page: impl Into<String>,
        referrer: impl Into<String>,
        utm: UtmParams,
    ) -> Self {
        Self {
            session_id,
            started_at,
            entry_page: entry_page.into(),
            referrer: referrer.into(),
            utm_source: utm.source,
            utm_medium: utm.medium,
            utm_campaign: utm.campaign,
            ended_at: None,
        }
    }

    /// Stamps the end of the session. Later calls keep the first stamp.
    pub fn end(&mut self, at: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(at);
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Campaign parameters read from the landing page query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtmParams {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
}

impl UtmParams {
    /// Extracts `utm_*` values from decoded query pairs.
    pub fn from_query(query: &[(String, String)]) -> Self {
        let find = |key: &str| {
            query
                .iter()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.clone())
        };
        Self {
            source: find("utm_source"),
            medium: find("utm_medium"),
            campaign: find("utm_campaign"),
        }
    }
}
