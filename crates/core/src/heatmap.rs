//! Heatmap query and point types shared by the collector and viewers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::device::DeviceFilter;
use crate::error::{Error, Result, ValidationErrorCode};

/// One weighted sample in grid space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

fn default_intensity() -> f64 {
    1.0
}

impl HeatmapPoint {
    pub fn new(x: f64, y: f64, intensity: f64) -> Self {
        Self { x, y, intensity }
    }

    /// A single click with unit weight.
    pub fn click(x: f64, y: f64) -> Self {
        Self::new(x, y, default_intensity())
    }

    /// Projects viewport pixel coordinates into a `grid_size` grid.
    ///
    /// Returns `None` for a zero-sized viewport.
    pub fn from_pixels(
        x: f64,
        y: f64,
        viewport_width: u32,
        viewport_height: u32,
        grid_size: usize,
    ) -> Option<Self> {
        if viewport_width == 0 || viewport_height == 0 {
            return None;
        }
        let scale = grid_size as f64;
        Some(Self::click(
            x / viewport_width as f64 * scale,
            y / viewport_height as f64 * scale,
        ))
    }
}

/// Inclusive time window. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

/// Query parameters of `GET /api/analytics/heatmap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapQuery {
    pub page_path: String,
    #[serde(default)]
    pub device_type: DeviceFilter,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub end_date: Option<DateTime<Utc>>,
}

impl HeatmapQuery {
    pub fn new(page_path: impl Into<String>) -> Self {
        Self {
            page_path: page_path.into(),
            device_type: DeviceFilter::All,
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_device(mut self, device_type: DeviceFilter) -> Self {
        self.device_type = device_type;
        self
    }

    pub fn with_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_path.is_empty() {
            return Err(Error::validation_code(
                ValidationErrorCode::InvalidQuery,
                "page_path is required",
            ));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(Error::validation_code(
                    ValidationErrorCode::InvalidQuery,
                    "start_date is after end_date",
                ));
            }
        }
        Ok(())
    }

    /// Query-string pairs in wire form.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page_path", self.page_path.clone()),
            ("device_type", self.device_type.as_str().to_string()),
        ];
        if let Some(start) = self.start_date {
            pairs.push(("start_date", start.to_rfc3339()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("end_date", end.to_rfc3339()));
        }
        pairs
    }
}

/// Body of a heatmap query response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatmapResponse {
    pub points: Vec<HeatmapPoint>,
}

/// Parses an ISO 8601 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| {
            Error::validation_code(
                ValidationErrorCode::InvalidQuery,
                format!("invalid date: {}", value),
            )
        })
}

fn deserialize_date<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
