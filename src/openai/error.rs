//! Errors from the OpenAI HTTP layer, classified by kind.

use std::fmt;

use thiserror::Error;

/// Coarse classification of an external API failure, so callers can tell
/// quota and auth problems apart from transient network trouble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    Auth,
    Quota,
    RateLimit,
    Network,
    Timeout,
    BadResponse,
    Api,
}

impl ServiceErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::RateLimit => "rate_limit",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::BadResponse => "bad_response",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn bad_response(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::BadResponse, message)
    }

    /// Classify a non-success HTTP status and its body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = extract_api_message(body).unwrap_or_else(|| body.trim().to_string());
        let kind = match status {
            401 | 403 => ServiceErrorKind::Auth,
            429 if body.contains("insufficient_quota") => ServiceErrorKind::Quota,
            429 => ServiceErrorKind::RateLimit,
            408 | 504 => ServiceErrorKind::Timeout,
            _ => ServiceErrorKind::Api,
        };
        Self::new(kind, format!("HTTP {}: {}", status, detail))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ServiceErrorKind::Timeout
        } else if err.is_decode() {
            ServiceErrorKind::BadResponse
        } else if err.is_connect() || err.is_request() {
            ServiceErrorKind::Network
        } else {
            ServiceErrorKind::Api
        };
        Self::new(kind, err.to_string())
    }
}

/// Pull `error.message` out of an OpenAI error body.
fn extract_api_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error")?.get("message")?.as_str().map(str::to_string)
}
