//! Errors raised by token file handling.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Token file or directory operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Token file could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type AppResult<T> = Result<T, AppError>;
