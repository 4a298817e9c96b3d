//! Traffic source records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::session::SessionId;

/// Origin category of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Direct,
    Organic,
    Social,
    Email,
    Referral,
    Paid,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Organic => "organic",
            Self::Social => "social",
            Self::Email => "email",
            Self::Referral => "referral",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified origin of a session, computed once at first page load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSource {
    pub session_id: SessionId,
    pub source_type: SourceType,
    #[validate(length(max = 256))]
    pub source_name: String,
    #[validate(length(max = 256))]
    pub medium: String,
    #[validate(length(max = 256))]
    pub campaign: Option<String>,
    #[validate(length(max = 2048))]
    pub referrer_url: Option<String>,
    #[validate(length(max = 2000))]
    pub landing_page: String,
    pub timestamp: DateTime<Utc>,
}
