use clap::Parser;
use flume_core::config::{
    default_token_path, ExporterConfig, DEFAULT_API_MIN_INTERVAL_SECS, DEFAULT_BASE_URL,
    DEFAULT_LISTEN_ADDRESS, DEFAULT_METRICS_PATH, DEFAULT_TIMEOUT_SECS,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "flume-exporter",
    about = "Prometheus exporter for Flume water sensors",
    version = env!("CARGO_PKG_VERSION"),
    author
)]
pub struct Cli {
    #[arg(long, env = "FLUME_CLIENT_ID", help = "Flume API client ID")]
    pub client_id: Option<String>,

    #[arg(long, env = "FLUME_CLIENT_SECRET", hide_env_values = true, help = "Flume API client secret")]
    pub client_secret: Option<String>,

    #[arg(long, env = "FLUME_USERNAME", help = "Flume account email address")]
    pub username: Option<String>,

    #[arg(long, env = "FLUME_PASSWORD", hide_env_values = true, help = "Flume account password")]
    pub password: Option<String>,

    #[arg(long, env = "LISTEN_ADDRESS", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen_address: String,

    #[arg(long, env = "METRICS_PATH", default_value = DEFAULT_METRICS_PATH)]
    pub metrics_path: String,

    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = "SCRAPE_INTERVAL_SECS",
        help = "Seconds between collection passes (default: derived from the sensor count)"
    )]
    pub scrape_interval: Option<u64>,

    #[arg(long, env = "TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, help = "HTTP request timeout in seconds")]
    pub timeout: u64,

    #[arg(
        long,
        env = "API_MIN_INTERVAL_SECS",
        default_value_t = DEFAULT_API_MIN_INTERVAL_SECS,
        help = "Minimum seconds between Flume API requests"
    )]
    pub api_min_interval: u64,

    #[arg(long, env = "DEVICE_IDS", default_value = "", help = "Comma-separated device IDs to scrape")]
    pub device_ids: String,

    #[arg(long, env = "TOKEN_FILE", help = "Where to persist OAuth tokens")]
    pub token_file: Option<PathBuf>,

    #[arg(long, help = "Remove the stored token file before starting")]
    pub clear_tokens: bool,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn to_config(&self) -> ExporterConfig {
        ExporterConfig {
            client_id: self.client_id.clone().unwrap_or_default(),
            client_secret: self.client_secret.clone().unwrap_or_default(),
            username: self.username.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
            base_url: self.base_url.clone(),
            listen_address: self.listen_address.clone(),
            metrics_path: self.metrics_path.clone(),
            scrape_interval: self.scrape_interval.map(Duration::from_secs),
            timeout: Duration::from_secs(self.timeout),
            api_min_interval: Duration::from_secs(self.api_min_interval),
            device_ids: self.device_ids.clone(),
            token_file: self.token_file.clone().unwrap_or_else(default_token_path),
        }
    }
}
