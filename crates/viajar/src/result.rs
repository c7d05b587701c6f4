//! Result and error types for the engine.

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while executing a step catalog
#[derive(Debug, Error)]
pub enum EngineError {
    /// Every locator candidate was exhausted without finding a usable element
    #[error("Element not found with any locator: {locator}")]
    ElementNotFound {
        /// The full candidate string, pipe-separated
        locator: String,
    },

    /// A resolved element could not be acted upon after all fallback attempts
    #[error("Action {action} failed: {message}")]
    ActionFailed {
        /// Action that was attempted
        action: String,
        /// Cause of the final attempt's failure
        message: String,
    },

    /// Browser session failed to start; the run aborts before any step
    #[error("Failed to launch browser session: {message}")]
    SessionLaunch {
        /// Error message
        message: String,
    },

    /// No step catalog exists for the requested test case and mode
    #[error("No step catalog for test case {test_case_id} in mode {mode}")]
    CatalogNotFound {
        /// Requested test case id
        test_case_id: String,
        /// Requested mode
        mode: String,
    },

    /// A catalog row is malformed (blank locator, non-numeric count, ...)
    #[error("Invalid step definition: {message}")]
    InvalidStep {
        /// Error message
        message: String,
    },

    /// A bounded wait elapsed without its condition holding
    #[error("Timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Page-level browser error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Input simulation error
    #[error("Input simulation failed: {message}")]
    Input {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// True when the error should fail a single step rather than the run
    #[must_use]
    pub const fn is_step_level(&self) -> bool {
        !matches!(self, Self::SessionLaunch { .. } | Self::CatalogNotFound { .. })
    }
}
