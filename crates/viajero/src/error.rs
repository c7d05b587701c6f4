//! Error types for the service

use thiserror::Error;

/// Result type for service operations
pub type ServeResult<T> = Result<T, ServeError>;

/// Errors that can occur in the service
#[derive(Debug, Error)]
pub enum ServeError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Catalog or result database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Engine library error
    #[error("Engine error: {0}")]
    Engine(#[from] viajar::EngineError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServeError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ServeError::config("missing mode");
        assert_eq!(error.to_string(), "Configuration error: missing mode");
    }

    #[test]
    fn test_engine_error_wraps() {
        let engine = viajar::EngineError::InvalidStep {
            message: "blank locator".to_string(),
        };
        let error = ServeError::from(engine);
        assert!(error.to_string().contains("blank locator"));
    }
}
