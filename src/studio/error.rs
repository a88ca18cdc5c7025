//! Studio API Errors
//!
//! Structured error type shared by the transport client, the realtime
//! channel, and the spend policy engine. Remote error codes are passed
//! through verbatim so callers can react to them.

use serde_json::Value;
use thiserror::Error;

/// Error returned by all Studio-facing operations.
///
/// Carries a machine-readable `code`, an HTTP-equivalent `status`, a
/// human-readable `message`, and optional structured `details` (trigger
/// lists, balances, purchase links).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StudioError {
    pub code: String,
    pub status: u16,
    pub message: String,
    pub details: Option<Value>,
}

pub type StudioResult<T> = Result<T, StudioError>;

impl StudioError {
    pub fn new(code: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        if !details.is_null() {
            self.details = Some(details);
        }
        self
    }

    /// No credential configured; fatal before any network call.
    pub fn missing_auth() -> Self {
        Self::new(
            "missing_auth",
            401,
            "No authentication configured. Set FRAMECUT_API_KEY or FRAMECUT_BEARER_TOKEN.",
        )
    }

    /// A single attempt or a wait exceeded its bound.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new("timeout", 408, message)
    }

    /// Transport-level failure unrelated to HTTP status.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new("network_error", 503, message)
    }

    /// All attempts consumed without a definitive resolved error.
    pub fn retry_exhausted() -> Self {
        Self::new("retry_exhausted", 503, "Request retries exhausted")
    }

    /// Generic non-2xx without a more specific remote code.
    pub fn request_failed(status: u16) -> Self {
        Self::new(
            "request_failed",
            status,
            format!("Request failed with status {}", status),
        )
    }
}
