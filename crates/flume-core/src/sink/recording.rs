use super::MetricsSink;
use flume_types::{Device, Endpoint, FlowRate, ScrapeOutcome, UsageBucket, UsagePoint};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    Scrape { endpoint: Endpoint, success: bool },
    RateLimited(Endpoint),
    DeviceInfo { device_id: String },
    FlowRate { device_id: String, value: f64 },
    DailyUsage { device_id: String, points: Vec<UsagePoint> },
    TotalUsage { device_id: String, bucket: UsageBucket, total: f64 },
}

/// In-memory sink that keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    pub fn scrapes(&self, endpoint: Endpoint) -> Vec<bool> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::Scrape { endpoint: ep, success } if *ep == endpoint => Some(*success),
                _ => None,
            })
            .collect()
    }

    pub fn flow_rates(&self) -> Vec<(String, f64)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::FlowRate { device_id, value } => Some((device_id.clone(), *value)),
                _ => None,
            })
            .collect()
    }

    pub fn rate_limited(&self) -> Vec<Endpoint> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::RateLimited(endpoint) => Some(*endpoint),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: RecordedEvent) {
        self.events.lock().push(event);
    }
}

impl MetricsSink for RecordingSink {
    fn record_scrape(&self, outcome: &ScrapeOutcome) {
        self.push(RecordedEvent::Scrape { endpoint: outcome.endpoint, success: outcome.success });
    }

    fn record_rate_limited(&self, endpoint: Endpoint) {
        self.push(RecordedEvent::RateLimited(endpoint));
    }

    fn record_device_info(&self, device: &Device) {
        self.push(RecordedEvent::DeviceInfo { device_id: device.id.clone() });
    }

    fn record_flow_rate(&self, device: &Device, rate: &FlowRate) {
        self.push(RecordedEvent::FlowRate { device_id: device.id.clone(), value: rate.value });
    }

    fn record_daily_usage(&self, device: &Device, points: &[UsagePoint]) {
        self.push(RecordedEvent::DailyUsage { device_id: device.id.clone(), points: points.to_vec() });
    }

    fn record_total_usage(&self, device: &Device, bucket: UsageBucket, total: f64) {
        self.push(RecordedEvent::TotalUsage { device_id: device.id.clone(), bucket, total });
    }
}
