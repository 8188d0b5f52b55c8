//! Flume Exporter
//!
//! Polls the Flume water API on a rate-limited schedule and serves the
//! readings as Prometheus metrics.
//!
//! Routes: `{metrics_path}`, `/health`, `/health/detailed`, `/`.

use anyhow::{Context, Result};
use clap::Parser;
use flume_core::sink::init_metrics;
use flume_core::utils::http::create_client;
use flume_core::{
    CollectionScheduler, DeviceFilter, ExporterConfig, MetricsSink, PrometheusSink, RateLimiter,
    TokenManager, TokenStore, UpstreamClient,
};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod collector;
mod server_utils;
mod state;

use cli::Cli;
use state::AppState;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Flume exporter v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = cli.to_config();
    config.validate().context("Invalid configuration")?;
    log_config(&config);

    let store = TokenStore::new(&config.token_file);
    if cli.clear_tokens {
        match store.remove().await {
            Ok(true) => info!("🧹 Authentication tokens cleared"),
            Ok(false) => info!("No token file found to clear"),
            Err(e) => warn!("⚠️ Failed to remove token file: {}", e),
        }
    }

    let metrics = init_metrics().map_err(|e| anyhow::anyhow!(e))?;
    let http = create_client(config.timeout).map_err(|e| anyhow::anyhow!(e))?;

    let tokens = Arc::new(TokenManager::new(http.clone(), config.oauth_settings(), store));
    if tokens.load_persisted().await {
        info!("🔑 Loaded persisted tokens");
    }

    let sink: Arc<dyn MetricsSink> = Arc::new(PrometheusSink);
    let limiter = Arc::new(RateLimiter::new(config.api_min_interval));
    let client = Arc::new(UpstreamClient::new(
        http,
        &config.base_url,
        limiter,
        tokens,
        sink.clone(),
    ));
    let scheduler = CollectionScheduler::new(
        client.clone(),
        sink,
        DeviceFilter::parse(&config.device_ids),
        config.scrape_interval,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let collector = tokio::spawn(collector::start_collection(client.clone(), scheduler, shutdown_rx));

    let app = api::router(&config.metrics_path)
        .with_state(AppState::new(config.clone(), client, metrics))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_address))?;

    info!("🌐 Server listening on http://{}", config.listen_address);
    info!("📊 Metrics available at http://{}{}", config.listen_address, config.metrics_path);

    let signal_tx = shutdown_tx.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        server_utils::shutdown_signal().await;
        let _ = signal_tx.send(true);
    });

    let mut drain_rx = shutdown_tx.subscribe();
    tokio::select! {
        result = server.into_future() => result.context("HTTP server failed")?,
        () = async {
            let _ = drain_rx.wait_for(|stop| *stop).await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => warn!("⚠️ Connections still open after {:?}, closing", SHUTDOWN_GRACE),
    }

    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(SHUTDOWN_GRACE, collector).await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => error!("❌ Collection task failed: {}", e),
        Err(_) => warn!("⚠️ Collection pass still running after {:?}, exiting", SHUTDOWN_GRACE),
    }

    info!("👋 Exporter stopped");
    Ok(())
}

fn log_config(config: &ExporterConfig) {
    info!("Configuration loaded:");
    info!("  Listen Address: {}", config.listen_address);
    info!("  Metrics Path: {}", config.metrics_path);
    match config.scrape_interval {
        Some(interval) => info!("  Scrape Interval: {:?}", interval),
        None => info!("  Scrape Interval: auto (2-10 minutes by sensor count)"),
    }
    info!("  Timeout: {:?}", config.timeout);
    info!("  Base URL: {}", config.base_url);
    info!("  API Min Interval: {:?}", config.api_min_interval);
    info!("  Token File: {}", config.token_file.display());
    if config.device_filtering() {
        info!("  Device IDs Filter: {}", config.device_ids);
    } else {
        info!("  Device IDs Filter: All devices");
    }
}
