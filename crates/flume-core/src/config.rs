//! Exporter configuration, assembled by the binary from flags and env vars.

use crate::token_manager::OAuthSettings;
use flume_types::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9193";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_BASE_URL: &str = "https://api.flumewater.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_API_MIN_INTERVAL_SECS: u64 = 30;

const TOKEN_DIR_NAME: &str = "flume-exporter";
const TOKEN_FILE_NAME: &str = "tokens.json";
const FALLBACK_TOKEN_FILE: &str = "flume_exporter_tokens.json";

/// Routes served next to the metrics endpoint.
pub const RESERVED_PATHS: [&str; 3] = ["/", "/health", "/health/detailed"];

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub base_url: String,
    pub listen_address: String,
    pub metrics_path: String,
    /// Explicit tick interval; computed from the sensor count when absent
    pub scrape_interval: Option<Duration>,
    pub timeout: Duration,
    pub api_min_interval: Duration,
    /// Raw comma-separated device allow-list
    pub device_ids: String,
    pub token_file: PathBuf,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            scrape_interval: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            api_min_interval: Duration::from_secs(DEFAULT_API_MIN_INTERVAL_SECS),
            device_ids: String::new(),
            token_file: default_token_path(),
        }
    }
}

impl ExporterConfig {
    /// Fails on the first missing credential, then on malformed values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.client_id, "Client ID", "client-id", "FLUME_CLIENT_ID"),
            (&self.client_secret, "Client secret", "client-secret", "FLUME_CLIENT_SECRET"),
            (&self.username, "Username", "username", "FLUME_USERNAME"),
            (&self.password, "Password", "password", "FLUME_PASSWORD"),
        ];
        for (value, field, flag, env) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::missing(field, flag, env));
            }
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::invalid("base_url", format!("not a valid URL: {e}")))?;

        if !self.metrics_path.starts_with('/') {
            return Err(ConfigError::invalid("metrics_path", "must start with '/'"));
        }
        if RESERVED_PATHS.contains(&self.metrics_path.as_str()) {
            return Err(ConfigError::invalid(
                "metrics_path",
                format!("'{}' is already served by the exporter", self.metrics_path),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be greater than zero"));
        }
        if self.scrape_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::invalid("scrape_interval", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn oauth_settings(&self) -> OAuthSettings {
        OAuthSettings {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    pub fn device_filtering(&self) -> bool {
        !self.device_ids.trim().is_empty()
    }
}

/// `<data dir>/flume-exporter/tokens.json`, or a file in the working
/// directory when the platform has no data dir.
pub fn default_token_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join(TOKEN_DIR_NAME).join(TOKEN_FILE_NAME),
        None => PathBuf::from(FALLBACK_TOKEN_FILE),
    }
}
