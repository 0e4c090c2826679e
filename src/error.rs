//! Tool-level error type shared by the analysis and generation dispatchers.

use thiserror::Error;

use crate::openai::{ProviderError, ServiceErrorKind};

/// Errors a tool invocation can report back to the caller.
///
/// Cache problems are absorbed inside the dispatchers and never reach the
/// caller as a tool failure; `CacheDegraded` exists so those paths can be
/// logged with the same vocabulary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImageToolError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("External service error ({kind}): {message}")]
    ExternalService { kind: ServiceErrorKind, message: String },

    #[error("Cache degraded: {message}")]
    CacheDegraded { message: String },

    #[error("Partial failure: {succeeded} of {requested} images saved")]
    PartialFailure { succeeded: usize, requested: usize },
}

impl ImageToolError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn external(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self::ExternalService { kind, message: message.into() }
    }

    pub fn cache_degraded(message: impl Into<String>) -> Self {
        Self::CacheDegraded { message: message.into() }
    }

    /// Stable machine-readable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::NotFound { .. } => "not_found",
            Self::ExternalService { .. } => "external_service",
            Self::CacheDegraded { .. } => "cache_degraded",
            Self::PartialFailure { .. } => "partial_failure",
        }
    }
}

impl From<ProviderError> for ImageToolError {
    fn from(err: ProviderError) -> Self {
        Self::ExternalService { kind: err.kind, message: err.message }
    }
}
