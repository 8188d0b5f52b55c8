//! Upstream API errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified failure of a call against the Flume API.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum UpstreamError {
    /// Network, DNS or timeout failure before a response arrived
    #[error("Transport error on {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// 401: the token itself was rejected
    #[error("Unauthorized on {endpoint}: {message}")]
    Unauthorized { endpoint: String, message: String },

    /// 429: counted by the caller, never retried inline
    #[error("Rate limit exceeded (429) for endpoint {endpoint}")]
    RateLimited { endpoint: String },

    /// Any other non-2xx status
    #[error("{endpoint} request failed with status {status}: {body}")]
    Http { endpoint: String, status: u16, body: String },

    /// 2xx response whose envelope declares failure or carries no data
    #[error("{endpoint} response indicates failure: {message}")]
    Logical { endpoint: String, message: String },

    /// Body did not match any known shape
    #[error("Failed to decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },

    /// Every authentication attempt failed
    #[error("Authentication failed after {attempts} attempts: {}", join_failures(.failures))]
    AuthRetriesExhausted { attempts: u32, failures: Vec<UpstreamError> },

    /// Neither the profile lookup nor the token payload carried a user id
    #[error("Could not resolve user id: {reason}")]
    MissingUserId { reason: String },

    /// No access token is held and none was requested
    #[error("No access token available")]
    NoToken,
}

fn join_failures(failures: &[UpstreamError]) -> String {
    failures
        .iter()
        .enumerate()
        .map(|(i, e)| format!("[attempt {}] {}", i + 1, e))
        .collect::<Vec<_>>()
        .join("; ")
}

impl UpstreamError {
    pub fn transport(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Transport { endpoint: endpoint.to_string(), message: message.into() }
    }

    pub fn decode(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Decode { endpoint: endpoint.to_string(), message: message.into() }
    }

    pub fn logical(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Logical { endpoint: endpoint.to_string(), message: message.into() }
    }

    /// True when the upstream rejected the token (401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
