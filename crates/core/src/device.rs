//! Device and browser classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::limits::{MOBILE_MAX_WIDTH, TABLET_MAX_WIDTH};

/// Device class derived from viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceType {
    /// `< 768` mobile, `< 1024` tablet, otherwise desktop.
    pub fn from_width(width: u32) -> Self {
        if width < MOBILE_MAX_WIDTH {
            Self::Mobile
        } else if width < TABLET_MAX_WIDTH {
            Self::Tablet
        } else {
            Self::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Browser family from a user-agent substring match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Browser {
    Firefox,
    Chrome,
    Safari,
    Edge,
    Other,
}

impl Browser {
    /// Precedence is Firefox > Chrome > Safari > Edge: Chrome UAs also
    /// contain "Safari", and Edge UAs contain both.
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Firefox") {
            Self::Firefox
        } else if user_agent.contains("Chrome") {
            Self::Chrome
        } else if user_agent.contains("Safari") {
            Self::Safari
        } else if user_agent.contains("Edge") {
            Self::Edge
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firefox => "Firefox",
            Self::Chrome => "Chrome",
            Self::Safari => "Safari",
            Self::Edge => "Edge",
            Self::Other => "Other",
        }
    }
}

/// Device filter used by heatmap queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFilter {
    #[default]
    All,
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceFilter {
    pub fn matches(&self, device: DeviceType) -> bool {
        match self {
            Self::All => true,
            Self::Mobile => device == DeviceType::Mobile,
            Self::Tablet => device == DeviceType::Tablet,
            Self::Desktop => device == DeviceType::Desktop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
        }
    }
}

impl FromStr for DeviceFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "mobile" => Ok(Self::Mobile),
            "tablet" => Ok(Self::Tablet),
            "desktop" => Ok(Self::Desktop),
            other => Err(Error::validation(format!("unknown device type: {}", other))),
        }
    }
}
