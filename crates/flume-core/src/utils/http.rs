//! HTTP client utilities.

use reqwest::Client;
use std::time::Duration;

/// Longest response body carried inside an error.
pub const BODY_EXCERPT_LEN: usize = 512;

/// Create the shared HTTP client with the configured request timeout.
pub fn create_client(timeout: Duration) -> Result<Client, String> {
    base_builder(timeout).build().map_err(|e| format!("HTTP client builder failed: {e}"))
}

fn base_builder(timeout: Duration) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(timeout)
        .tcp_nodelay(true)
        .user_agent(concat!("flume-exporter/", env!("CARGO_PKG_VERSION")))
}

/// First [`BODY_EXCERPT_LEN`] characters of a response body.
pub fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_LEN {
        return trimmed.to_string();
    }
    let mut s: String = trimmed.chars().take(BODY_EXCERPT_LEN).collect();
    s.push('…');
    s
}
