//! Error types for rag-audit.

use thiserror::Error;

use crate::verify::schema::SchemaViolation;

/// Result type alias using rag-audit's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while auditing an answer.
#[derive(Error, Debug)]
pub enum Error {
    /// The reasoning provider could not produce content
    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    /// Judge output parsed but did not match the expected shape
    #[error("Schema validation error: {0}")]
    Schema(#[from] SchemaViolation),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected failure inside the orchestrator
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audit log write or read failed
    #[error("Audit log error: {0}")]
    AuditLog(String),

    /// Request rejected before verification
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an infrastructure error.
    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the grounding judge may retry after this error.
    ///
    /// Provider failures and malformed judge output are retryable; everything
    /// else indicates a fault outside the judge call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::Schema(_) | Self::Serialization(_)
        )
    }
}
