use axum::{extract::State, http::StatusCode, response::Json};
use flume_core::ExporterConfig;
use flume_types::AuthStatus;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub authentication: AuthenticationHealth,
    pub config: ConfigSummary,
}

#[derive(Debug, Serialize)]
pub struct AuthenticationHealth {
    pub valid: bool,
    pub status: AuthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

/// Non-secret view of the running configuration.
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub base_url: String,
    pub username: String,
    pub client_id: String,
    pub scrape_interval: String,
    pub api_min_interval: String,
    pub device_filtering: bool,
    pub device_ids: String,
}

impl From<&ExporterConfig> for ConfigSummary {
    fn from(config: &ExporterConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            username: config.username.clone(),
            client_id: config.client_id.clone(),
            scrape_interval: config
                .scrape_interval
                .map_or_else(|| "auto".to_string(), |d| format!("{}s", d.as_secs())),
            api_min_interval: format!("{}s", config.api_min_interval.as_secs()),
            device_filtering: config.device_filtering(),
            device_ids: config.device_ids.clone(),
        }
    }
}

fn respond(
    state: &AppState,
    valid: bool,
    validation_error: Option<String>,
) -> (StatusCode, Json<HealthResponse>) {
    let code = if valid { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = HealthResponse {
        status: if valid { "healthy" } else { "unhealthy" },
        timestamp: chrono::Utc::now().to_rfc3339(),
        authentication: AuthenticationHealth {
            valid,
            status: state.client().token_manager().status(),
            validation_error,
        },
        config: ConfigSummary::from(state.config()),
    };
    (code, Json(body))
}

/// Token state from memory only; never calls upstream.
pub async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let status = state.client().token_manager().status();
    let valid = status.has_access_token && !status.needs_auth;
    respond(&state, valid, None)
}

/// Forces a round trip to `/me` with the held token.
pub async fn get_detailed_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.client().validate_authentication().await {
        Ok(()) => respond(&state, true, None),
        Err(e) => {
            tracing::warn!("[Health] Authentication validation failed: {}", e);
            respond(&state, false, Some(e.to_string()))
        },
    }
}
