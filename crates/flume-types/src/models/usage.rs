//! Normalized water usage readings.

use serde::{Deserialize, Serialize};

/// Aggregation bucket accepted by the usage query endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageBucket {
    #[serde(rename = "MIN")]
    Minute,
    #[serde(rename = "HR")]
    Hour,
    #[serde(rename = "DAY")]
    Day,
    #[serde(rename = "MON")]
    Month,
    #[serde(rename = "YR")]
    Year,
}

impl UsageBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "MIN",
            Self::Hour => "HR",
            Self::Day => "DAY",
            Self::Month => "MON",
            Self::Year => "YR",
        }
    }
}

/// One `{datetime, value}` pair, the canonical shape every usage response
/// decodes into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePoint {
    /// Upstream timestamp, `YYYY-MM-DD HH:MM:SS`
    pub datetime: String,
    /// Gallons
    pub value: f64,
}

impl UsagePoint {
    pub fn new(datetime: impl Into<String>, value: f64) -> Self {
        Self { datetime: datetime.into(), value }
    }

    /// Calendar date part of the timestamp.
    pub fn date(&self) -> &str {
        self.datetime.get(..10).unwrap_or(&self.datetime)
    }
}

/// Current flow reading for one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRate {
    pub value: f64,
    pub units: String,
    pub active: bool,
    pub datetime: Option<String>,
}

impl FlowRate {
    pub const UNITS: &'static str = "gallons_per_minute";

    pub fn gallons_per_minute(value: f64, active: bool, datetime: Option<String>) -> Self {
        Self { value, units: Self::UNITS.to_string(), active, datetime }
    }

    /// Reading reported when the endpoint returns no samples.
    pub fn idle() -> Self {
        Self::gallons_per_minute(0.0, false, None)
    }
}
