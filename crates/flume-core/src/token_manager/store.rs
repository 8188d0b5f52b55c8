use super::file_utils::atomic_write_json;
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use flume_types::{Credentials, TokenFile, TokenOwner};
use std::path::{Path, PathBuf};

/// Token file on disk, scoped to one (username, client id) pair.
///
/// A store without a path is disabled: loads find nothing and saves are
/// no-ops.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    path: Option<PathBuf>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns persisted credentials when the file is readable, belongs to
    /// `owner` and has not yet expired at `now`.
    pub async fn load(&self, owner: &TokenOwner, now: DateTime<Utc>) -> Option<Credentials> {
        let path = self.path.as_ref()?;

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::info!("[TokenStore] No existing tokens at {}: {}", path.display(), e);
                return None;
            },
        };

        let file: TokenFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("[TokenStore] Failed to parse token file {}: {}", path.display(), e);
                return None;
            },
        };

        if !file.belongs_to(owner) {
            tracing::warn!("[TokenStore] Token file belongs to a different user/client, ignoring");
            return None;
        }

        if now >= file.expiry_time {
            tracing::info!(
                "[TokenStore] Persisted tokens expired at {}, re-authentication required",
                file.expiry_time
            );
            return None;
        }

        tracing::info!("[TokenStore] Loaded tokens, expires at {}", file.expiry_time);
        Some(file.into_credentials())
    }

    pub async fn save(&self, credentials: &Credentials) -> AppResult<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        atomic_write_json(path, &TokenFile::from(credentials)).await?;
        tracing::debug!("[TokenStore] Tokens saved to {}", path.display());
        Ok(())
    }

    /// Deletes the token file. Returns whether a file was removed.
    pub async fn remove(&self) -> AppResult<bool> {
        let Some(path) = self.path.as_ref() else {
            return Ok(false);
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
