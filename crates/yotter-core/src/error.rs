//! Error types for Yotter.
//!
//! Loader failures never reach attribute readers: the entity framework folds
//! them into the invalid state. The variants here surface from constructors,
//! backing-store writes, configuration loading and programming defects such
//! as touching an attribute no group declares.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Yotter library.
#[derive(Debug, Error)]
pub enum YotterError {
    // Upstream errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("{kind} not found: {key}")]
    NotFound { kind: String, key: String },

    #[error("Upstream error: {message}")]
    Upstream { message: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{kind} declares no attribute named '{attribute}'")]
    UnknownAttribute { kind: String, attribute: String },

    #[error("{kind} declares no group named '{group}'")]
    UnknownGroup { kind: String, group: String },

    #[error("{kind} '{key}' is not bound to a backing store")]
    NoBackingStore { kind: String, key: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Yotter operations.
pub type Result<T> = std::result::Result<T, YotterError>;

impl From<std::io::Error> for YotterError {
    fn from(err: std::io::Error) -> Self {
        YotterError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for YotterError {
    fn from(err: serde_json::Error) -> Self {
        YotterError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for YotterError {
    fn from(err: rusqlite::Error) -> Self {
        YotterError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for YotterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            YotterError::Timeout(std::time::Duration::from_secs(0))
        } else {
            YotterError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl YotterError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        YotterError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Shorthand for an upstream failure with a message.
    pub fn upstream(message: impl Into<String>) -> Self {
        YotterError::Upstream {
            message: message.into(),
        }
    }

    /// Shorthand for an upstream "does not exist" answer.
    pub fn not_found(kind: impl Into<String>, key: impl Into<String>) -> Self {
        YotterError::NotFound {
            kind: kind.into(),
            key: key.into(),
        }
    }

    /// Whether this error came from talking to the content platform.
    ///
    /// Both transient failures and "not found" answers end up here; the
    /// entity framework treats them identically.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            YotterError::Network { .. }
                | YotterError::Timeout(_)
                | YotterError::RateLimited { .. }
                | YotterError::NotFound { .. }
                | YotterError::Upstream { .. }
                | YotterError::Json { .. }
        )
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            YotterError::Network { .. }
                | YotterError::Timeout(_)
                | YotterError::RateLimited { .. }
        )
    }

    /// Errors that indicate a bug in the caller rather than a runtime condition.
    pub fn is_programming_defect(&self) -> bool {
        matches!(
            self,
            YotterError::UnknownAttribute { .. } | YotterError::UnknownGroup { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = YotterError::not_found("channel", "cBAD");
        assert_eq!(err.to_string(), "channel not found: cBAD");

        let err = YotterError::UnknownAttribute {
            kind: "video".into(),
            attribute: "colour".into(),
        };
        assert_eq!(err.to_string(), "video declares no attribute named 'colour'");
    }

    #[test]
    fn test_upstream_classification() {
        assert!(YotterError::not_found("video", "x").is_upstream_failure());
        assert!(YotterError::upstream("parse failed").is_upstream_failure());
        assert!(!YotterError::Config {
            message: "bad".into()
        }
        .is_upstream_failure());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(YotterError::Timeout(std::time::Duration::from_secs(5)).is_retryable());
        assert!(!YotterError::not_found("video", "x").is_retryable());
    }

    #[test]
    fn test_programming_defects() {
        assert!(YotterError::UnknownGroup {
            kind: "video".into(),
            group: "nope".into()
        }
        .is_programming_defect());
        assert!(!YotterError::upstream("boom").is_programming_defect());
    }
}
