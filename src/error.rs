//! Error types for ArborDB
//!
//! This module defines the error types used throughout the crate. The main
//! error type is `ArborError`. Validation errors are produced before any
//! backend call is made; backend failures surface through the returned
//! future; delivery errors on live subscriptions are logged, never returned.

use thiserror::Error;

/// Main error type for ArborDB
#[derive(Error, Debug)]
pub enum ArborError {
    /// Invalid arguments: absent values, root mutation, malformed query criteria
    #[error("Validation error: {0}")]
    Validation(String),

    /// `off` was given a callback that has no registration on the reference
    #[error("No event registration found: {0}")]
    RegistrationNotFound(String),

    /// Opaque failure reported by the backend capability
    #[error("Backend error: {0}")]
    Backend(String),

    /// A subscription handler received an error instead of event data
    #[error("Event delivery error: {0}")]
    Delivery(String),

    /// Transport envelope content that cannot be reverse-transformed
    #[error("Decode error: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error (JSON): {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not supported
    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

/// Result type alias for operations that can fail with an [ArborError]
pub type Result<T> = std::result::Result<T, ArborError>;

impl ArborError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        ArborError::Validation(msg.into())
    }

    /// Create a new backend error
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        ArborError::Backend(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        ArborError::Decode(msg.into())
    }

    /// Create a new delivery error
    pub fn delivery<S: Into<String>>(msg: S) -> Self {
        ArborError::Delivery(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        ArborError::NotFound(what.into())
    }

    /// Create a new not supported error
    pub fn not_supported<S: Into<String>>(what: S) -> Self {
        ArborError::NotSupported(what.into())
    }

    /// Whether this error was raised by argument validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, ArborError::Validation(_))
    }
}

impl From<regex::Error> for ArborError {
    fn from(err: regex::Error) -> Self {
        ArborError::validation(format!("Invalid pattern: {}", err))
    }
}

impl From<chrono::ParseError> for ArborError {
    fn from(err: chrono::ParseError) -> Self {
        ArborError::decode(format!("Invalid timestamp: {}", err))
    }
}

impl From<base64::DecodeError> for ArborError {
    fn from(err: base64::DecodeError) -> Self {
        ArborError::decode(format!("Invalid binary text: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArborError::validation("cannot set root");
        assert_eq!(err.to_string(), "Validation error: cannot set root");
        assert!(err.is_validation());
        assert!(!ArborError::backend("down").is_validation());
    }

    #[test]
    fn test_decode_conversions() {
        let err: ArborError = chrono::DateTime::parse_from_rfc3339("nope").unwrap_err().into();
        assert!(matches!(err, ArborError::Decode(_)));
    }
}
