//! Global minimum spacing between outbound upstream calls.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes callers so consecutive [`RateLimiter::wait`] completions are at
/// least `min_interval` apart.
///
/// The lock is held across the sleep. Tokio's mutex is fair, so waiters are
/// released in arrival order and each one measures its gap from the caller
/// released just before it.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_call: Mutex::new(None) }
    }

    /// Suspends until the interval since the previous call has elapsed.
    ///
    /// Returns the instant recorded as this call's slot.
    pub async fn wait(&self) -> Instant {
        let mut last_call = self.last_call.lock().await;

        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                tracing::debug!("[RateLimiter] Waiting {:?} before next upstream call", remaining);
                tokio::time::sleep(remaining).await;
            }
        }

        let now = Instant::now();
        *last_call = Some(now);
        now
    }

    pub fn interval(&self) -> Duration {
        self.min_interval
    }
}
