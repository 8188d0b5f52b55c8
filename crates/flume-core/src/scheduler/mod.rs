//! Collection passes over the account's devices.
//!
//! A pass lists devices, records device info for every allowed device, then
//! fetches the current flow rate for each sensor. The 30-day history is
//! fetched for every sensor when [`CollectionWindow`] says a bulk collection
//! is due; that decision is taken once per pass.

use crate::clock::{Clock, SystemClock};
use crate::sink::MetricsSink;
use crate::upstream::UpstreamClient;
use chrono::{Local, NaiveDateTime, NaiveTime};
use flume_types::{Device, Endpoint, ScrapeOutcome, UpstreamResult, UsageBucket};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

mod cadence;
mod filter;
mod interval;


pub use cadence::{should_collect_bulk, CollectionWindow};
pub use filter::DeviceFilter;
pub use interval::{next_interval, MAX_TICK_INTERVAL, MIN_TICK_INTERVAL};

const HISTORY_DAYS: i64 = 30;

/// Summary of one collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Devices returned by the listing
    pub devices_seen: usize,
    /// Devices that passed the filter
    pub devices_processed: usize,
    /// Sensors among the processed devices
    pub sensors: usize,
    /// Sensors whose history was fetched successfully
    pub bulk_collected: usize,
    pub failures: usize,
}

pub struct CollectionScheduler {
    client: Arc<UpstreamClient>,
    sink: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    filter: DeviceFilter,
    window: CollectionWindow,
    interval_override: Option<Duration>,
}

impl CollectionScheduler {
    pub fn new(
        client: Arc<UpstreamClient>,
        sink: Arc<dyn MetricsSink>,
        filter: DeviceFilter,
        interval_override: Option<Duration>,
    ) -> Self {
        Self {
            client,
            sink,
            clock: Arc::new(SystemClock),
            filter,
            window: CollectionWindow::new(),
            interval_override,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn window(&self) -> &CollectionWindow {
        &self.window
    }

    /// Runs a pass immediately, then one per tick until `shutdown` flips to
    /// true or its sender is dropped. A pass in flight always completes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("[Scheduler] Collection loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_pass().await;
            let interval = next_interval(self.interval_override, report.sensors);
            tracing::info!(
                "[Scheduler] Pass done: {}/{} devices, {} sensors, {} histories, {} failures. Next pass in {:?}",
                report.devices_processed,
                report.devices_seen,
                report.sensors,
                report.bulk_collected,
                report.failures,
                interval
            );

            tokio::select! {
                () = tokio::time::sleep(interval) => {},
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("[Scheduler] Collection loop stopped");
    }

    /// One pass over all devices. Upstream failures are recorded and
    /// counted, never propagated.
    pub async fn run_pass(&self) -> PassReport {
        let mut report = PassReport::default();

        let devices = match self.fetch_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::error!("[Scheduler] Failed to list devices: {}", e);
                report.failures += 1;
                return report;
            },
        };
        report.devices_seen = devices.len();

        let included: Vec<&Device> = devices.iter().filter(|d| self.filter.allows(&d.id)).collect();
        report.devices_processed = included.len();
        report.sensors = included.iter().filter(|d| d.kind.has_readings()).count();
        if !self.filter.is_empty() {
            tracing::info!(
                "[Scheduler] Device filter active: {} of {} devices selected",
                included.len(),
                devices.len()
            );
        }

        let now = self.clock.now().with_timezone(&Local).naive_local();
        let collect_bulk = report.sensors > 0 && self.window.claim(now);
        if report.sensors > 0 && !collect_bulk {
            tracing::debug!("[Scheduler] Daily history not due this pass");
        }

        for device in included {
            self.sink.record_device_info(device);

            if !device.kind.has_readings() {
                tracing::debug!(
                    "[Scheduler] Skipping {} device {}",
                    device.kind.as_str(),
                    device.id
                );
                continue;
            }

            if !self.collect_flow_rate(device).await {
                report.failures += 1;
            }

            if collect_bulk {
                if self.collect_history(device, now).await {
                    report.bulk_collected += 1;
                } else {
                    report.failures += 1;
                }
            }
        }

        report
    }

    async fn fetch_devices(&self) -> UpstreamResult<Vec<Device>> {
        let client = &self.client;
        self.call_with_reauth(Endpoint::Devices, move || client.list_devices()).await
    }

    async fn collect_flow_rate(&self, device: &Device) -> bool {
        let (client, id) = (&self.client, device.id.as_str());
        match self.call_with_reauth(Endpoint::FlowRate, move || client.get_current_rate(id)).await {
            Ok(rate) => {
                tracing::info!(
                    "[Scheduler] Flow rate for device {}: {:.2} {}",
                    device.id,
                    rate.value,
                    rate.units
                );
                self.sink.record_flow_rate(device, &rate);
                true
            },
            Err(e) => {
                tracing::warn!("[Scheduler] Flow rate for device {} failed: {}", device.id, e);
                false
            },
        }
    }

    async fn collect_history(&self, device: &Device, now: NaiveDateTime) -> bool {
        let since = (now.date() - chrono::Duration::days(HISTORY_DAYS)).and_time(NaiveTime::MIN);
        let (client, id) = (&self.client, device.id.as_str());
        let call = move || client.query_bulk_history(id, since, now);

        match self.call_with_reauth(Endpoint::DailyTotalUsage, call).await {
            Ok(points) => {
                let total: f64 = points.iter().map(|p| p.value).sum();
                self.sink.record_daily_usage(device, &points);
                self.sink.record_total_usage(device, UsageBucket::Day, total);
                tracing::info!(
                    "[Scheduler] Daily history for device {}: {} days, {:.1} gallons",
                    device.id,
                    points.len(),
                    total
                );
                true
            },
            Err(e) => {
                tracing::warn!("[Scheduler] Daily history for device {} failed: {}", device.id, e);
                false
            },
        }
    }

    /// Runs `call`, and runs it once more when the token was rejected. The
    /// second attempt goes through `ensure_valid` again, which authenticates
    /// when the 401 cleared the token.
    async fn call_with_reauth<T, F, Fut>(&self, endpoint: Endpoint, call: F) -> UpstreamResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = UpstreamResult<T>>,
    {
        match self.timed(endpoint, call()).await {
            Err(e) if e.is_unauthorized() => {
                tracing::warn!("[Scheduler] {} unauthorized, retrying once with a new token", endpoint);
                self.timed(endpoint, call()).await
            },
            other => other,
        }
    }

    async fn timed<T>(
        &self,
        endpoint: Endpoint,
        call: impl Future<Output = UpstreamResult<T>>,
    ) -> UpstreamResult<T> {
        let started = Instant::now();
        let result = call.await;
        self.sink.record_scrape(&ScrapeOutcome::new(endpoint, started.elapsed(), result.is_ok()));
        result
    }
}
