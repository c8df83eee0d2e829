//! Error types for the Parla coaching backend
//!
//! This module provides structured error definitions using thiserror. The
//! variants preserve the caller-distinguishable kinds: unauthorized vs bad
//! input vs upstream provider failure vs malformed provider output. HTTP
//! status mapping lives in the API layer.

use thiserror::Error;

/// Main error type for Parla operations
#[derive(Error, Debug)]
pub enum CoachError {
    /// Request carried no valid authenticated user
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Requested entity does not exist or is not owned by the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected before any side effect (missing transcript, bad body)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Chat completion provider failed
    #[error("Chat completion error: {0}")]
    LlmApi(String),

    /// Embedding provider failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Speech provider (transcription or synthesis) failed
    #[error("Speech service error: {0}")]
    Speech(String),

    /// A provider response did not match its required shape
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Parla operations
pub type Result<T> = std::result::Result<T, CoachError>;

/// Convert anyhow::Error to CoachError
impl From<anyhow::Error> for CoachError {
    fn from(err: anyhow::Error) -> Self {
        CoachError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoachError::NotFound("session 42".to_string());
        assert_eq!(err.to_string(), "Not found: session 42");
    }

    #[test]
    fn test_invalid_input_display() {
        let err = CoachError::InvalidInput("no transcript provided".to_string());
        assert_eq!(err.to_string(), "Invalid input: no transcript provided");
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: CoachError = anyhow::anyhow!("something broke").into();
        assert!(matches!(err, CoachError::Other(_)));
    }
}
