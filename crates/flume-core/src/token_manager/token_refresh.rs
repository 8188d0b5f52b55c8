use super::TokenManager;
use crate::utils::http::excerpt;
use chrono::Duration as ChronoDuration;
use flume_types::{Credentials, Endpoint, UpstreamError, UpstreamResult};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<TokenData>,
    #[serde(default)]
    count: Option<i64>,
}

#[derive(Deserialize)]
struct TokenData {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: i64,
}

impl TokenManager {
    pub(super) async fn authenticate_locked(
        &self,
        slot: &mut Option<Credentials>,
    ) -> UpstreamResult<()> {
        tracing::info!("[TokenManager] Authenticating as {}", self.settings.username);

        let request = TokenRequest {
            grant_type: "password",
            client_id: &self.settings.client_id,
            client_secret: &self.settings.client_secret,
            username: Some(&self.settings.username),
            password: Some(&self.settings.password),
            refresh_token: None,
        };
        let data = self.exchange(&request).await?;

        if data.refresh_token.is_empty() {
            tracing::warn!("[TokenManager] No refresh token received");
        }

        let creds = Credentials {
            expiry: self.clock.now() + ChronoDuration::seconds(data.expires_in),
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            token_type: data.token_type,
            expires_in: data.expires_in,
            owner: self.settings.owner(),
        };
        tracing::info!(
            "[TokenManager] Obtained token, expires in {}s (at {})",
            creds.expires_in,
            creds.expiry
        );

        self.persist(&creds).await;
        *slot = Some(creds);
        self.publish(slot);
        Ok(())
    }

    pub(super) async fn refresh_locked(&self, slot: &mut Option<Credentials>) -> UpstreamResult<()> {
        let current = slot
            .as_ref()
            .filter(|c| c.has_refresh_token())
            .cloned()
            .ok_or(UpstreamError::NoToken)?;

        tracing::debug!("[TokenManager] Token expires at {}, refreshing", current.expiry);

        let request = TokenRequest {
            grant_type: "refresh_token",
            client_id: &self.settings.client_id,
            client_secret: &self.settings.client_secret,
            username: None,
            password: None,
            refresh_token: Some(&current.refresh_token),
        };
        let data = self.exchange(&request).await?;

        let refresh_token =
            if data.refresh_token.is_empty() { current.refresh_token } else { data.refresh_token };
        let token_type = if data.token_type.is_empty() { current.token_type } else { data.token_type };

        let creds = Credentials {
            expiry: self.clock.now() + ChronoDuration::seconds(data.expires_in),
            access_token: data.access_token,
            refresh_token,
            token_type,
            expires_in: data.expires_in,
            owner: current.owner,
        };
        tracing::info!("[TokenManager] Token refreshed, expires in {}s", creds.expires_in);

        self.persist(&creds).await;
        *slot = Some(creds);
        self.publish(slot);
        Ok(())
    }

    async fn exchange(&self, request: &TokenRequest<'_>) -> UpstreamResult<TokenData> {
        let endpoint = Endpoint::Token.as_str();
        let url = format!("{}/oauth/token", self.settings.base_url);

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(endpoint, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::transport(endpoint, e.to_string()))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited { endpoint: endpoint.to_string() });
        }
        if !status.is_success() {
            tracing::debug!("[TokenManager] {} grant rejected with {}", request.grant_type, status);
            return Err(UpstreamError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let envelope: TokenEnvelope = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::decode(endpoint, e.to_string()))?;

        if !envelope.success || envelope.data.is_empty() {
            let message = envelope.message.filter(|m| !m.is_empty()).unwrap_or_else(|| {
                format!(
                    "success={}, count={}",
                    envelope.success,
                    envelope.count.unwrap_or(envelope.data.len() as i64)
                )
            });
            return Err(UpstreamError::logical(endpoint, message));
        }

        let Some(data) = envelope.data.into_iter().next() else {
            return Err(UpstreamError::logical(endpoint, "no token data"));
        };
        if data.access_token.is_empty() {
            return Err(UpstreamError::logical(endpoint, "empty access token"));
        }
        Ok(data)
    }
}
