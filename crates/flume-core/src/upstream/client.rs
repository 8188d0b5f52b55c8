use super::account::{user_id_from_jwt, user_id_from_profile};
use super::envelope::{
    declared_failure, decode_usage, ActiveWire, DeviceWire, Envelope, QueryRequest, UsageQuery,
};
use crate::rate_limiter::RateLimiter;
use crate::sink::MetricsSink;
use crate::token_manager::TokenManager;
use crate::utils::http::excerpt;
use chrono::NaiveDateTime;
use flume_types::{
    Device, Endpoint, FlowRate, UpstreamError, UpstreamResult, UsageBucket, UsagePoint,
};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;

/// Upstream timestamp layout for usage queries.
pub const QUERY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BULK_HISTORY_REQUEST_ID: &str = "daily_total_water_usage";
const USAGE_REQUEST_ID: &str = "water_usage";

/// Flume API client. Every call waits on the shared [`RateLimiter`] and
/// obtains a bearer token from the [`TokenManager`] before sending.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
    tokens: Arc<TokenManager>,
    sink: Arc<dyn MetricsSink>,
    /// User id resolved for the access token it was looked up with
    user_id: parking_lot::Mutex<Option<(String, u64)>>,
}

impl UpstreamClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        limiter: Arc<RateLimiter>,
        tokens: Arc<TokenManager>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter,
            tokens,
            sink,
            user_id: parking_lot::Mutex::new(None),
        }
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// `GET /me/devices`.
    pub async fn list_devices(&self) -> UpstreamResult<Vec<Device>> {
        let (_, body) = self.execute(Endpoint::Devices, Method::GET, "/me/devices", None).await?;
        let envelope: Envelope<DeviceWire> = serde_json::from_value(body)
            .map_err(|e| UpstreamError::decode(Endpoint::Devices.as_str(), e.to_string()))?;
        Ok(envelope.data.into_iter().map(Device::from).collect())
    }

    /// Current flow from `/users/{user_id}/devices/{id}/query/active`. An
    /// empty response is an idle 0.0 reading.
    pub async fn get_current_rate(&self, device_id: &str) -> UpstreamResult<FlowRate> {
        let user_id = self.resolve_user_id().await?;
        let path = format!("/users/{user_id}/devices/{device_id}/query/active");

        let (_, body) = self.execute(Endpoint::FlowRate, Method::GET, &path, None).await?;
        let envelope: Envelope<ActiveWire> = serde_json::from_value(body)
            .map_err(|e| UpstreamError::decode(Endpoint::FlowRate.as_str(), e.to_string()))?;

        match envelope.data.into_iter().next() {
            Some(reading) => Ok(FlowRate::from(reading)),
            None => {
                tracing::debug!("[Upstream] No flow data for device {}", device_id);
                Ok(FlowRate::idle())
            },
        }
    }

    /// Usage points for one bucket size.
    pub async fn query_usage(
        &self,
        device_id: &str,
        bucket: UsageBucket,
        since: NaiveDateTime,
        until: Option<NaiveDateTime>,
    ) -> UpstreamResult<Vec<UsagePoint>> {
        self.query(Endpoint::WaterUsage, USAGE_REQUEST_ID, device_id, bucket, since, until).await
    }

    /// Per-day totals between `since` and `until`.
    pub async fn query_bulk_history(
        &self,
        device_id: &str,
        since: NaiveDateTime,
        until: NaiveDateTime,
    ) -> UpstreamResult<Vec<UsagePoint>> {
        self.query(
            Endpoint::DailyTotalUsage,
            BULK_HISTORY_REQUEST_ID,
            device_id,
            UsageBucket::Day,
            since,
            Some(until),
        )
        .await
    }

    /// Forces a `GET /me` round trip. Fails fast with
    /// [`UpstreamError::NoToken`] when no token is held; a token inside the
    /// refresh window is refreshed first, like any other call.
    pub async fn validate_authentication(&self) -> UpstreamResult<()> {
        if self.tokens.access_token().is_none() {
            return Err(UpstreamError::NoToken);
        }
        self.execute(Endpoint::Profile, Method::GET, "/me", None).await?;
        tracing::debug!("[Upstream] Authentication validated");
        Ok(())
    }

    async fn query(
        &self,
        endpoint: Endpoint,
        request_id: &str,
        device_id: &str,
        bucket: UsageBucket,
        since: NaiveDateTime,
        until: Option<NaiveDateTime>,
    ) -> UpstreamResult<Vec<UsagePoint>> {
        let request = QueryRequest {
            queries: [UsageQuery {
                request_id,
                bucket: bucket.as_str(),
                since_datetime: since.format(QUERY_DATETIME_FORMAT).to_string(),
                until_datetime: until.map(|u| u.format(QUERY_DATETIME_FORMAT).to_string()),
            }],
        };
        let payload = serde_json::to_value(&request)
            .map_err(|e| UpstreamError::decode(endpoint.as_str(), e.to_string()))?;

        let path = format!("/me/devices/{device_id}/query");
        let (_, body) = self.execute(endpoint, Method::POST, &path, Some(&payload)).await?;

        let points = decode_usage(&body, request_id)
            .map_err(|message| UpstreamError::decode(endpoint.as_str(), message))?;
        tracing::debug!(
            "[Upstream] {} for device {}: {} points ({})",
            endpoint,
            device_id,
            points.len(),
            bucket.as_str()
        );
        Ok(points)
    }

    /// Cached per access token; looked up via `/me`, then the token's own
    /// `user_id` claim.
    async fn resolve_user_id(&self) -> UpstreamResult<u64> {
        if let Some(current) = self.tokens.access_token() {
            if let Some((token, id)) = self.user_id.lock().as_ref() {
                if *token == current {
                    return Ok(*id);
                }
            }
        }

        let (token, body) = self.execute(Endpoint::Profile, Method::GET, "/me", None).await?;
        let user_id = match user_id_from_profile(&body) {
            Some(id) => id,
            None => {
                tracing::debug!("[Upstream] No id in /me response, reading token claims");
                user_id_from_jwt(&token).ok_or_else(|| UpstreamError::MissingUserId {
                    reason: "neither /me nor the access token carried a non-zero user id"
                        .to_string(),
                })?
            },
        };

        tracing::info!("[Upstream] Resolved user id {}", user_id);
        *self.user_id.lock() = Some((token, user_id));
        Ok(user_id)
    }

    /// Rate limit, authorize, send and classify. Returns the bearer token
    /// used together with the parsed body.
    async fn execute(
        &self,
        endpoint: Endpoint,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> UpstreamResult<(String, Value)> {
        let label = endpoint.as_str();

        self.limiter.wait().await;
        let token = self.tokens.ensure_valid().await?;

        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response =
            request.send().await.map_err(|e| UpstreamError::transport(label, e.to_string()))?;
        let status = response.status();
        let text =
            response.text().await.map_err(|e| UpstreamError::transport(label, e.to_string()))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("[Upstream] Rate limit exceeded (429) for {}", label);
            self.sink.record_rate_limited(endpoint);
            return Err(UpstreamError::RateLimited { endpoint: label.to_string() });
        }

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("[Upstream] {} rejected the token (401)", label);
            if self.tokens.invalidate_if(&token).await {
                *self.user_id.lock() = None;
            }
            return Err(UpstreamError::Unauthorized {
                endpoint: label.to_string(),
                message: excerpt(&text),
            });
        }

        if !status.is_success() {
            return Err(UpstreamError::Http {
                endpoint: label.to_string(),
                status: status.as_u16(),
                body: excerpt(&text),
            });
        }

        let body: Value =
            serde_json::from_str(&text).map_err(|e| UpstreamError::decode(label, e.to_string()))?;
        if let Some(message) = declared_failure(&body) {
            return Err(UpstreamError::logical(label, message));
        }

        Ok((token, body))
    }
}
