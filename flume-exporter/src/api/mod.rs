//! HTTP routes: Prometheus scrape endpoint, health checks and a landing page.

mod health;


use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};

use crate::state::AppState;

const METRIC_DESCRIPTIONS: [(&str, &str); 8] = [
    ("flume_current_flow_rate_gallons_per_minute", "Current water flow rate"),
    ("flume_daily_total_water_usage_gallons", "Daily total water usage for each of the last 30 days"),
    ("flume_total_water_usage_gallons", "Total water usage per query bucket"),
    ("flume_device_info", "Device information"),
    ("flume_exporter_scrape_duration_seconds", "Time spent on each upstream call"),
    ("flume_exporter_scrape_success", "Whether the last upstream call succeeded"),
    ("flume_exporter_last_scrape_timestamp_seconds", "Time of the last upstream call"),
    ("flume_exporter_rate_limit_errors_total", "429 responses per endpoint"),
];

pub fn router(metrics_path: &str) -> Router<AppState> {
    Router::new()
        .route(metrics_path, get(get_metrics))
        .route("/health", get(health::get_health))
        .route("/health/detailed", get(health::get_detailed_health))
        .route("/", get(index))
}

pub async fn get_metrics(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.render_metrics(),
    )
        .into_response()
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let items: String = METRIC_DESCRIPTIONS
        .iter()
        .map(|(name, help)| format!("<li><code>{name}</code> - {help}</li>\n"))
        .collect();

    Html(format!(
        "<html>\n<head><title>Flume Water Prometheus Exporter</title></head>\n<body>\n\
         <h1>Flume Water Prometheus Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a> | <a href=\"/health\">Health</a></p>\n\
         <p>Collects water usage from the Flume API and exposes it as Prometheus metrics.</p>\n\
         <h2>Available Metrics:</h2>\n<ul>\n{items}</ul>\n</body>\n</html>\n",
        path = state.config().metrics_path,
    ))
}
