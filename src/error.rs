//! Error types for cache operations
//!
//! Public cache operations never surface these to callers; they exist for the
//! codec and configuration internals and for diagnostics. Every public
//! operation has a defined fallback value for every failure mode.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration error - bad or missing settings
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Connection error - the backing store is unreachable
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Value could not be encoded for storage
    #[error("Encode error: {0}")]
    EncodeError(String),

    /// Stored payload could not be decoded back into a value
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Backend operation failure (timeout, reset, protocol error)
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CacheError::ConnectionError("connection refused".to_string());
        assert_eq!(error.to_string(), "Connection error: connection refused");

        let error = CacheError::DecodeError("unexpected token".to_string());
        assert!(error.to_string().contains("Decode error"));
    }

    #[test]
    fn test_error_conversion() {
        let error: CacheError = "test error".into();
        assert!(matches!(error, CacheError::Other(_)));

        let error: CacheError = "test error".to_string().into();
        assert!(matches!(error, CacheError::Other(_)));
    }
}
