//! Per-endpoint scrape bookkeeping.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upstream endpoints that are tracked individually in exporter metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Token,
    Profile,
    Devices,
    FlowRate,
    DailyTotalUsage,
    WaterUsage,
}

impl Endpoint {
    /// Endpoints whose rate-limit counter is exported from startup.
    pub const SCRAPED: [Endpoint; 4] =
        [Endpoint::Devices, Endpoint::FlowRate, Endpoint::DailyTotalUsage, Endpoint::WaterUsage];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Profile => "profile",
            Self::Devices => "devices",
            Self::FlowRate => "flow_rate",
            Self::DailyTotalUsage => "daily_total_usage",
            Self::WaterUsage => "water_usage",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one upstream fetch, reported to the sink and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOutcome {
    pub endpoint: Endpoint,
    pub duration: Duration,
    pub success: bool,
}

impl ScrapeOutcome {
    pub fn new(endpoint: Endpoint, duration: Duration, success: bool) -> Self {
        Self { endpoint, duration, success }
    }
}
