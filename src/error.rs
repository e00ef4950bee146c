//! Error types and handling for quickkv
//!
//! This module defines all error types used throughout the crate.
//! Backend client failures are carried through untranslated.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for quickkv operations
#[derive(Debug, Error)]
pub enum QuickKvError {
    #[error("Invalid key: {key:?} contains whitespace")]
    InvalidKey { key: String },

    #[error("Wrong key type: expected a string, found {found}")]
    WrongKeyType { found: &'static str },

    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    #[error("Operation '{operation}' is not supported by the {backend} backend")]
    UnsupportedOperation {
        operation: &'static str,
        backend: &'static str,
    },

    #[error(transparent)]
    DocumentStore(#[from] mongodb::error::Error),

    #[error(transparent)]
    RemoteCache(#[from] redis::RedisError),

    #[error("Serialization error: {message}")]
    SerializationError {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        config_key: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        component: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, QuickKvError>;

impl QuickKvError {
    pub(crate) fn not_found(key: &str) -> Self {
        QuickKvError::KeyNotFound {
            key: key.to_string(),
        }
    }

    pub(crate) fn serialization<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        QuickKvError::SerializationError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for missing or expired keys
    pub fn is_not_found(&self) -> bool {
        matches!(self, QuickKvError::KeyNotFound { .. })
    }

    /// Check if the error was caused by the caller rather than a backend failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            QuickKvError::InvalidKey { .. }
                | QuickKvError::WrongKeyType { .. }
                | QuickKvError::KeyNotFound { .. }
                | QuickKvError::UnsupportedOperation { .. }
        )
    }
}

impl From<config::ConfigError> for QuickKvError {
    fn from(err: config::ConfigError) -> Self {
        QuickKvError::ConfigError {
            message: err.to_string(),
            config_key: None,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuickKvError::InvalidKey {
            key: "a b".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid key: \"a b\" contains whitespace");

        let err = QuickKvError::not_found("session:42");
        assert_eq!(err.to_string(), "Key not found: session:42");

        let err = QuickKvError::UnsupportedOperation {
            operation: "search",
            backend: "memory",
        };
        assert_eq!(
            err.to_string(),
            "Operation 'search' is not supported by the memory backend"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(QuickKvError::not_found("k").is_client_error());
        assert!(QuickKvError::WrongKeyType { found: "number" }.is_client_error());
        assert!(!QuickKvError::InternalError {
            message: "boom".to_string(),
            component: None,
            source: None,
        }
        .is_client_error());
    }

    #[test]
    fn test_is_not_found() {
        assert!(QuickKvError::not_found("k").is_not_found());
        assert!(!QuickKvError::InvalidKey {
            key: " ".to_string()
        }
        .is_not_found());
    }

    #[test]
    fn test_serialization_error_keeps_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = QuickKvError::serialization("bad payload", json_err);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "Serialization error: bad payload");
    }
}
