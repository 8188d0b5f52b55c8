use crate::clock::{Clock, Delay, SystemClock, TokioDelay};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use flume_types::{AuthStatus, Credentials, TokenOwner, UpstreamError, UpstreamResult};
use std::sync::Arc;
use std::time::Duration;

mod file_utils;
mod retry;
mod store;
mod token_refresh;

#[cfg(test)]
mod tests;

pub(crate) use file_utils::preview;
pub use store::TokenStore;

const TOKEN_PREVIEW_LEN: usize = 10;

/// Account credentials presented to the token endpoint.
#[derive(Clone)]
pub struct OAuthSettings {
    /// API root without a trailing slash
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl OAuthSettings {
    pub fn owner(&self) -> TokenOwner {
        TokenOwner::new(&self.username, &self.client_id)
    }
}

impl std::fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Expiry thresholds and the authentication retry bound.
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    /// A token is expired once `now + expiry_buffer` reaches its expiry
    pub expiry_buffer: ChronoDuration,
    /// A token is refreshed once `now + refresh_window` reaches its expiry
    pub refresh_window: ChronoDuration,
    pub max_auth_attempts: u32,
    /// Attempt `n` waits `n * retry_backoff` before attempt `n + 1`
    pub retry_backoff: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            expiry_buffer: ChronoDuration::minutes(5),
            refresh_window: ChronoDuration::hours(1),
            max_auth_attempts: 3,
            retry_backoff: Duration::from_secs(5),
        }
    }
}

enum TokenAction {
    Ready(String),
    Refresh,
    Authenticate,
}

/// Owns the access/refresh token pair for the configured account.
///
/// `ensure_valid` runs its whole check-and-act sequence under one async
/// mutex, so concurrent callers never trigger duplicate authentications. A
/// synchronous snapshot mirrors the credentials for [`TokenManager::status`].
pub struct TokenManager {
    http: reqwest::Client,
    settings: OAuthSettings,
    policy: TokenPolicy,
    store: TokenStore,
    clock: Arc<dyn Clock>,
    delay: Arc<dyn Delay>,
    credentials: tokio::sync::Mutex<Option<Credentials>>,
    snapshot: parking_lot::RwLock<Option<Credentials>>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, settings: OAuthSettings, store: TokenStore) -> Self {
        Self {
            http,
            settings,
            policy: TokenPolicy::default(),
            store,
            clock: Arc::new(SystemClock),
            delay: Arc::new(TokioDelay),
            credentials: tokio::sync::Mutex::new(None),
            snapshot: parking_lot::RwLock::new(None),
        }
    }

    pub fn with_policy(mut self, policy: TokenPolicy) -> Self {
        self.policy = TokenPolicy { max_auth_attempts: policy.max_auth_attempts.max(1), ..policy };
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn owner(&self) -> TokenOwner {
        self.settings.owner()
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Adopts credentials from the token file when they are still usable.
    pub async fn load_persisted(&self) -> bool {
        let Some(creds) = self.store.load(&self.owner(), self.clock.now()).await else {
            return false;
        };
        let mut slot = self.credentials.lock().await;
        *slot = Some(creds);
        self.publish(&slot);
        true
    }

    /// Current bearer token, if one is held.
    pub fn access_token(&self) -> Option<String> {
        self.snapshot
            .read()
            .as_ref()
            .filter(|c| c.has_access_token())
            .map(|c| c.access_token.clone())
    }

    /// Token state computed from memory only.
    pub fn status(&self) -> AuthStatus {
        let snapshot = self.snapshot.read().clone();
        let now = self.clock.now();
        let token_file = self.store.path().map(|p| p.display().to_string());
        let needs_auth = matches!(self.plan(snapshot.as_ref(), now), TokenAction::Authenticate);

        match snapshot {
            Some(creds) => AuthStatus {
                has_access_token: creds.has_access_token(),
                has_refresh_token: creds.has_refresh_token(),
                token_expiry: Some(creds.expiry),
                is_expired: creds.is_expired_at(now, self.policy.expiry_buffer),
                is_expiring_soon: creds.is_expired_at(now, self.policy.refresh_window),
                needs_auth,
                token_file,
                access_token_preview: creds
                    .has_access_token()
                    .then(|| preview(&creds.access_token, TOKEN_PREVIEW_LEN)),
                refresh_token_preview: creds
                    .has_refresh_token()
                    .then(|| preview(&creds.refresh_token, TOKEN_PREVIEW_LEN)),
            },
            None => AuthStatus {
                has_access_token: false,
                has_refresh_token: false,
                token_expiry: None,
                is_expired: true,
                is_expiring_soon: true,
                needs_auth,
                token_file,
                access_token_preview: None,
                refresh_token_preview: None,
            },
        }
    }

    /// Returns a bearer token that is valid beyond the expiry buffer,
    /// refreshing or authenticating first when needed.
    ///
    /// A token outside the refresh window is returned without any network
    /// call.
    pub async fn ensure_valid(&self) -> UpstreamResult<String> {
        let mut slot = self.credentials.lock().await;

        match self.plan(slot.as_ref(), self.clock.now()) {
            TokenAction::Ready(token) => return Ok(token),
            TokenAction::Refresh => {
                if let Err(e) = self.refresh_locked(&mut slot).await {
                    tracing::warn!(
                        "[TokenManager] Token refresh failed, falling back to full authentication: {}",
                        e
                    );
                    self.clear_locked(&mut slot).await;
                    self.authenticate_with_retry_locked(&mut slot).await?;
                }
            },
            TokenAction::Authenticate => {
                tracing::info!("[TokenManager] No usable token, authenticating");
                self.authenticate_with_retry_locked(&mut slot).await?;
            },
        }

        slot.as_ref()
            .filter(|c| c.has_access_token())
            .map(|c| c.access_token.clone())
            .ok_or(UpstreamError::NoToken)
    }

    /// Drops the credentials and deletes the token file.
    pub async fn invalidate(&self) {
        let mut slot = self.credentials.lock().await;
        self.clear_locked(&mut slot).await;
    }

    /// Drops the credentials only while `rejected` is still the held access
    /// token. A 401 for a token that has since been refreshed or replaced is
    /// ignored. Returns whether anything was cleared.
    pub async fn invalidate_if(&self, rejected: &str) -> bool {
        let mut slot = self.credentials.lock().await;
        let held = slot.as_ref().is_some_and(|c| c.access_token == rejected);
        if !held {
            tracing::debug!("[TokenManager] Ignoring 401 for a token that is no longer held");
            return false;
        }
        self.clear_locked(&mut slot).await;
        true
    }

    /// Single password-grant attempt.
    pub async fn authenticate(&self) -> UpstreamResult<()> {
        let mut slot = self.credentials.lock().await;
        self.authenticate_locked(&mut slot).await
    }

    /// Password grant with the bounded retry loop.
    pub async fn authenticate_with_retry(&self) -> UpstreamResult<()> {
        let mut slot = self.credentials.lock().await;
        self.authenticate_with_retry_locked(&mut slot).await
    }

    /// Refresh-token grant. Fails with [`UpstreamError::NoToken`] when no
    /// refresh token is held.
    pub async fn refresh(&self) -> UpstreamResult<()> {
        let mut slot = self.credentials.lock().await;
        self.refresh_locked(&mut slot).await
    }

    fn plan(&self, creds: Option<&Credentials>, now: DateTime<Utc>) -> TokenAction {
        let Some(creds) = creds.filter(|c| c.has_access_token()) else {
            return TokenAction::Authenticate;
        };

        if !creds.is_expired_at(now, self.policy.refresh_window) {
            return TokenAction::Ready(creds.access_token.clone());
        }
        if creds.has_refresh_token() {
            return TokenAction::Refresh;
        }
        if creds.is_expired_at(now, self.policy.expiry_buffer) {
            return TokenAction::Authenticate;
        }
        TokenAction::Ready(creds.access_token.clone())
    }

    fn publish(&self, slot: &Option<Credentials>) {
        *self.snapshot.write() = slot.clone();
    }

    async fn persist(&self, creds: &Credentials) {
        if let Err(e) = self.store.save(creds).await {
            tracing::warn!("[TokenManager] Failed to save tokens: {}", e);
        }
    }

    async fn clear_locked(&self, slot: &mut Option<Credentials>) {
        *slot = None;
        self.publish(slot);
        match self.store.remove().await {
            Ok(true) => tracing::info!("[TokenManager] Cleared tokens and removed token file"),
            Ok(false) => tracing::debug!("[TokenManager] Cleared tokens"),
            Err(e) => tracing::warn!("[TokenManager] Failed to remove token file: {}", e),
        }
    }
}
