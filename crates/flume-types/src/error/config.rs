//! Configuration-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that halt startup.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// A required credential was not supplied
    #[error("{field} is required (set via --{flag} flag or {env} env var)")]
    Missing {
        /// Human readable name of the setting
        field: String,
        /// Command line flag, without the leading dashes
        flag: String,
        /// Environment variable
        env: String,
    },

    /// Config validation error (invalid values)
    #[error("Config validation error for {field}: {message}")]
    ValidationError {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },
}

impl ConfigError {
    pub fn missing(field: &str, flag: &str, env: &str) -> Self {
        Self::Missing { field: field.to_string(), flag: flag.to_string(), env: env.to_string() }
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::ValidationError { field: field.to_string(), message: message.into() }
    }
}
