//! Typed error definitions.
//!
//! - [`UpstreamError`] classifies every failure of a call against the Flume API
//! - [`ConfigError`] covers missing or invalid local configuration

mod config;
mod upstream;

pub use config::ConfigError;
pub use upstream::UpstreamError;

/// Result type for upstream operations.
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;
