use super::TokenManager;
use flume_types::{Credentials, UpstreamError, UpstreamResult};

impl TokenManager {
    /// Runs at most `max_auth_attempts` password grants. Partial state is
    /// cleared between attempts and attempt `n` is followed by a wait of
    /// `n * retry_backoff`.
    pub(super) async fn authenticate_with_retry_locked(
        &self,
        slot: &mut Option<Credentials>,
    ) -> UpstreamResult<()> {
        let attempts = self.policy.max_auth_attempts;
        let mut failures = Vec::new();

        for attempt in 1..=attempts {
            tracing::info!("[TokenManager] Authentication attempt {}/{}", attempt, attempts);

            match self.authenticate_locked(slot).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(
                            "[TokenManager] Authentication succeeded on attempt {}",
                            attempt
                        );
                    }
                    return Ok(());
                },
                Err(e) => {
                    tracing::warn!("[TokenManager] Authentication attempt {} failed: {}", attempt, e);
                    failures.push(e);

                    if attempt < attempts {
                        self.clear_locked(slot).await;
                        let wait = self.policy.retry_backoff * attempt;
                        tracing::info!("[TokenManager] Waiting {:?} before retry", wait);
                        self.delay.sleep(wait).await;
                    }
                },
            }
        }

        tracing::error!("[TokenManager] Authentication failed after {} attempts", attempts);
        Err(UpstreamError::AuthRetriesExhausted { attempts, failures })
    }
}
