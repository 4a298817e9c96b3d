//! Location enrichment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Result of a geo-IP lookup, as returned by `GET /api/analytics/location`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeoLocation {
    pub country_code: String,
    pub country_name: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub isp: String,
    pub organization: String,
    pub is_vpn: bool,
    pub is_mobile: bool,
}

impl GeoLocation {
    /// Placeholder for addresses the lookup cannot place (private ranges,
    /// missing client address).
    pub fn unknown() -> Self {
        Self {
            country_code: "XX".to_string(),
            country_name: "Unknown".to_string(),
            ..Self::default()
        }
    }
}

/// A resolved location attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSignal {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub location: GeoLocation,
    pub timestamp: DateTime<Utc>,
}

impl LocationSignal {
    pub fn new(session_id: SessionId, location: GeoLocation, timestamp: DateTime<Utc>) -> Self {
        Self {
            session_id,
            location,
            timestamp,
        }
    }
}
