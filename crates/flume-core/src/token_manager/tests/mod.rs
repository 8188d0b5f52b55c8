mod token_manager_tests;

use super::{OAuthSettings, TokenManager, TokenPolicy, TokenStore};
use crate::clock::{Delay, ManualClock};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

/// Records requested sleeps without waiting.
#[derive(Default)]
pub(super) struct RecordingDelay {
    sleeps: parking_lot::Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    pub(super) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
    }
}

pub(super) struct Harness {
    pub manager: TokenManager,
    pub clock: Arc<ManualClock>,
    pub delay: Arc<RecordingDelay>,
}

pub(super) fn settings(base_url: &str) -> OAuthSettings {
    OAuthSettings {
        base_url: base_url.to_string(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        username: "user@example.com".to_string(),
        password: "hunter2".to_string(),
    }
}

pub(super) fn token_body(access: &str, refresh: &str, expires_in: i64) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "code": 602,
        "message": "Request OK",
        "data": [{
            "token_type": "bearer",
            "access_token": access,
            "expires_in": expires_in,
            "refresh_token": refresh
        }],
        "count": 1
    })
}

pub(super) fn harness(server: &MockServer, store: TokenStore) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).single().unwrap_or_else(Utc::now),
    ));
    let delay = Arc::new(RecordingDelay::default());
    let http = reqwest::Client::new();
    let manager = TokenManager::new(http, settings(&server.uri()), store)
        .with_policy(TokenPolicy::default())
        .with_clock(clock.clone())
        .with_delay(delay.clone());
    Harness { manager, clock, delay }
}
