use std::time::Duration;

pub const MIN_TICK_INTERVAL: Duration = Duration::from_secs(2 * 60);
pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(10 * 60);
const PER_CALL: Duration = Duration::from_secs(30);

/// Delay before the next pass. One upstream call per sensor plus the device
/// listing, spaced 30 s apart, bounded to 2..=10 minutes. An explicit
/// override is used as is.
pub fn next_interval(override_interval: Option<Duration>, sensors: usize) -> Duration {
    if let Some(interval) = override_interval {
        return interval;
    }
    let calls = u32::try_from(sensors.saturating_add(1)).unwrap_or(u32::MAX);
    PER_CALL.saturating_mul(calls).clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL)
}
