//! Prometheus metrics for the Flume exporter.
//!
//! Exposes:
//! - `flume_current_flow_rate_gallons_per_minute{device_id,device_name,location}`
//! - `flume_total_water_usage_gallons{device_id,device_name,location,bucket}`
//! - `flume_daily_total_water_usage_gallons{device_id,device_name,location,date}`
//! - `flume_device_info{device_id,device_name,location,device_type}`
//! - `flume_exporter_scrape_duration_seconds{endpoint}`
//! - `flume_exporter_scrape_success{endpoint}`
//! - `flume_exporter_last_scrape_timestamp_seconds{endpoint}`
//! - `flume_exporter_rate_limit_errors_total{endpoint}`

use super::MetricsSink;
use flume_types::{Device, Endpoint, FlowRate, ScrapeOutcome, UsageBucket, UsagePoint};
use metrics::{counter, describe_counter, describe_gauge, gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INSTALL_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

const FLOW_RATE: &str = "flume_current_flow_rate_gallons_per_minute";
const TOTAL_USAGE: &str = "flume_total_water_usage_gallons";
const DAILY_TOTAL_USAGE: &str = "flume_daily_total_water_usage_gallons";
const DEVICE_INFO: &str = "flume_device_info";
const SCRAPE_DURATION: &str = "flume_exporter_scrape_duration_seconds";
const SCRAPE_SUCCESS: &str = "flume_exporter_scrape_success";
const LAST_SCRAPE: &str = "flume_exporter_last_scrape_timestamp_seconds";
const RATE_LIMIT_ERRORS: &str = "flume_exporter_rate_limit_errors_total";

/// Install the Prometheus recorder. Safe to call more than once; later calls
/// return the handle installed by the first.
pub fn init_metrics() -> Result<PrometheusHandle, String> {
    let _install = INSTALL_LOCK.lock();
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))?;

    describe_gauge!(FLOW_RATE, "Current water flow rate in gallons per minute");
    describe_gauge!(TOTAL_USAGE, "Total water usage in gallons per query bucket");
    describe_gauge!(DAILY_TOTAL_USAGE, "Daily total water usage in gallons for each day");
    describe_gauge!(DEVICE_INFO, "Device information");
    describe_gauge!(SCRAPE_DURATION, Unit::Seconds, "Duration of upstream API calls");
    describe_gauge!(SCRAPE_SUCCESS, "Whether the last upstream call succeeded (1) or failed (0)");
    describe_gauge!(LAST_SCRAPE, Unit::Seconds, "Unix timestamp of the last upstream call");
    describe_counter!(RATE_LIMIT_ERRORS, "Total 429 responses from the Flume API");

    // Exported at zero from startup so dashboards see the series before the first error.
    for endpoint in Endpoint::SCRAPED {
        counter!(RATE_LIMIT_ERRORS, "endpoint" => endpoint.as_str()).increment(0);
    }

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

fn device_labels(device: &Device) -> [(&'static str, String); 3] {
    [
        ("device_id", device.id.clone()),
        ("device_name", device.display_name().to_string()),
        ("location", device.location_name.clone()),
    ]
}

/// [`MetricsSink`] writing into the globally installed recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusSink;

impl MetricsSink for PrometheusSink {
    fn record_scrape(&self, outcome: &ScrapeOutcome) {
        let endpoint = outcome.endpoint.as_str();
        gauge!(SCRAPE_DURATION, "endpoint" => endpoint).set(outcome.duration.as_secs_f64());
        gauge!(SCRAPE_SUCCESS, "endpoint" => endpoint).set(if outcome.success { 1.0 } else { 0.0 });
        gauge!(LAST_SCRAPE, "endpoint" => endpoint).set(chrono::Utc::now().timestamp() as f64);
    }

    fn record_rate_limited(&self, endpoint: Endpoint) {
        counter!(RATE_LIMIT_ERRORS, "endpoint" => endpoint.as_str()).increment(1);
    }

    fn record_device_info(&self, device: &Device) {
        let [id, name, location] = device_labels(device);
        let labels = [id, name, location, ("device_type", device.kind.as_str().to_string())];
        gauge!(DEVICE_INFO, &labels).set(1.0);
    }

    fn record_flow_rate(&self, device: &Device, rate: &FlowRate) {
        gauge!(FLOW_RATE, &device_labels(device)).set(rate.value);
    }

    fn record_daily_usage(&self, device: &Device, points: &[UsagePoint]) {
        for point in points {
            let [id, name, location] = device_labels(device);
            let labels = [id, name, location, ("date", point.date().to_string())];
            gauge!(DAILY_TOTAL_USAGE, &labels).set(point.value);
        }
    }

    fn record_total_usage(&self, device: &Device, bucket: UsageBucket, total: f64) {
        let [id, name, location] = device_labels(device);
        let labels = [id, name, location, ("bucket", bucket.as_str().to_string())];
        gauge!(TOTAL_USAGE, &labels).set(total);
    }
}
