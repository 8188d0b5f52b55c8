//! Destination for collected readings and scrape bookkeeping.

mod prometheus;
mod recording;

pub use prometheus::{init_metrics, PrometheusSink};
pub use recording::{RecordedEvent, RecordingSink};

use flume_types::{Device, Endpoint, FlowRate, ScrapeOutcome, UsageBucket, UsagePoint};

/// Receives everything the scheduler and client publish.
///
/// Implementations must be cheap and non-blocking; they are called inline
/// from the collection loop.
pub trait MetricsSink: Send + Sync {
    fn record_scrape(&self, outcome: &ScrapeOutcome);

    /// One 429 response from `endpoint`.
    fn record_rate_limited(&self, endpoint: Endpoint);

    fn record_device_info(&self, device: &Device);

    fn record_flow_rate(&self, device: &Device, rate: &FlowRate);

    /// One gauge per calendar day of bulk history.
    fn record_daily_usage(&self, device: &Device, points: &[UsagePoint]);

    fn record_total_usage(&self, device: &Device, bucket: UsageBucket, total: f64);
}
