//! File utilities for the token store.

use crate::error::AppResult;
use std::path::Path;

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Writes `content` to a sibling temp file with owner-only permissions, then
/// renames it over `path`.
pub async fn atomic_write_json<T: serde::Serialize>(path: &Path, content: &T) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_private_dir(parent).await?;
    }

    let temp_path = path.with_extension("json.tmp");
    let json_str = serde_json::to_string_pretty(content)?;

    write_private(&temp_path, json_str.as_bytes()).await?;
    restrict_file(&temp_path).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    Ok(())
}

/// Creates or truncates `path` with owner-only permissions from the start.
async fn write_private(path: &Path, bytes: &[u8]) -> AppResult<()> {
    use tokio::io::AsyncWriteExt;

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

async fn ensure_private_dir(dir: &Path) -> AppResult<()> {
    if tokio::fs::metadata(dir).await.is_ok() {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(DIR_MODE)).await?;
    }
    Ok(())
}

#[cfg(unix)]
async fn restrict_file(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_MODE)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_file(_path: &Path) -> AppResult<()> {
    Ok(())
}

/// First `max_len` characters followed by `...`, for log-safe token previews.
pub fn preview(secret: &str, max_len: usize) -> String {
    let head: String = secret.chars().take(max_len).collect();
    format!("{head}...")
}
