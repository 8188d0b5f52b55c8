//! Credential models: in-memory credentials, the persisted token file and
//! the network-free authentication status.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identity a set of credentials was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOwner {
    pub username: String,
    pub client_id: String,
}

impl TokenOwner {
    pub fn new(username: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self { username: username.into(), client_id: client_id.into() }
    }
}

/// OAuth credentials held by the token manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Validity in seconds as reported by the token endpoint
    pub expires_in: i64,
    /// Absolute expiry computed when the token was issued
    pub expiry: DateTime<Utc>,
    pub owner: TokenOwner,
}

impl Credentials {
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// True when the token is missing or `now + buffer` has reached expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        !self.has_access_token() || now + buffer >= self.expiry
    }
}

/// On-disk representation of [`Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFile {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    pub expiry_time: DateTime<Utc>,
    pub username: String,
    pub client_id: String,
}

impl TokenFile {
    pub fn belongs_to(&self, owner: &TokenOwner) -> bool {
        self.username == owner.username && self.client_id == owner.client_id
    }

    pub fn into_credentials(self) -> Credentials {
        Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            expiry: self.expiry_time,
            owner: TokenOwner { username: self.username, client_id: self.client_id },
        }
    }
}

impl From<&Credentials> for TokenFile {
    fn from(creds: &Credentials) -> Self {
        Self {
            access_token: creds.access_token.clone(),
            refresh_token: creds.refresh_token.clone(),
            token_type: creds.token_type.clone(),
            expires_in: creds.expires_in,
            expiry_time: creds.expiry,
            username: creds.owner.username.clone(),
            client_id: creds.owner.client_id.clone(),
        }
    }
}

/// Authentication status answerable without any network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub token_expiry: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub is_expiring_soon: bool,
    pub needs_auth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_preview: Option<String>,
}
