//! Layered error definitions
//!
//! Categorized by who observes them: config / handler / caller

use thiserror::Error;

/// Unified error type for configuration and setup
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised while validating a configuration
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigParse { .. } | Self::ConfigValidation { .. })
    }
}

/// Failure reported by a batch handler
///
/// Contained at the batch level: it is logged and counted, never returned to
/// the callers whose items were in the batch.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler returned an error for the batch
    #[error("batch handler failed: {message}")]
    Failed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The handler panicked while processing the batch
    #[error("batch handler panicked: {message}")]
    Panicked { message: String },
}

impl HandlerError {
    /// Create a handler failure with a message only
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a handler failure wrapping an underlying error
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a panic error
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked {
            message: message.into(),
        }
    }
}

/// Error observed by a caller waiting on its item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The item was not acknowledged before its own deadline
    #[error("item timed out waiting for batch completion after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// The block no longer accepts items
    #[error("timed batch block is closed")]
    Closed,
}

impl BatchError {
    /// Whether this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = BatchError::Timeout { waited_ms: 22000 };
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "item timed out waiting for batch completion after 22000ms"
        );
    }

    #[test]
    fn test_handler_error_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = HandlerError::with_source("persist customers", io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("persist customers"));
    }

    #[test]
    fn test_config_error_kind() {
        assert!(ContractError::config_validation("batch_size", "must be > 0").is_config_error());
        assert!(!ContractError::Other("x".into()).is_config_error());
    }
}
