//! Centralized error handling and classification

use crate::backend::error::BackendError;
use crate::logging::LogLevel;

/// Centralized error handler for all network operations
#[derive(Debug, Clone, Default)]
pub struct ErrorHandler;

impl ErrorHandler {
    pub fn new() -> Self {
        Self
    }

    /// Classify error and determine appropriate log level
    pub fn classify_error(&self, error: &BackendError) -> LogLevel {
        match error {
            // Rate limiting - low priority
            BackendError::Http { status, .. } if *status == 429 => LogLevel::Debug,

            // Server errors - temporary issues
            BackendError::Http { status, .. } if (500..=599).contains(status) => LogLevel::Warn,

            // Authentication errors - critical
            BackendError::Http { status, .. } if *status == 401 => LogLevel::Error,
            BackendError::Http { status, .. } if *status == 403 => LogLevel::Error,

            // Malformed rows mean the schema drifted
            BackendError::Decode(_) => LogLevel::Error,

            // Retrying cannot fix a bad URL
            BackendError::Config(_) => LogLevel::Error,

            // Network issues - usually temporary
            BackendError::Transport(_) | BackendError::Timeout(_) => LogLevel::Warn,

            // Other errors
            _ => LogLevel::Warn,
        }
    }

    /// Whether a failed backend request should be sent again. Only failures
    /// that never produced a response qualify; any HTTP status is an answer.
    pub fn should_retry(&self, error: &BackendError) -> bool {
        error.is_network()
    }

    /// Whether a failed sign-up step should be attempted again. Validation
    /// rejections (e.g. "User already registered") repeat on every attempt.
    pub fn should_retry_step(&self, error: &BackendError) -> bool {
        match error {
            BackendError::Transport(_) | BackendError::Timeout(_) => true,
            BackendError::Http { .. } => !error.is_validation(),
            BackendError::Decode(_) | BackendError::Unexpected(_) => true,
            BackendError::NotFound(_) | BackendError::Config(_) => false,
        }
    }

    /// Log a failure at the level its kind deserves.
    pub fn log(&self, operation: &str, error: &BackendError) {
        let level: log::Level = self.classify_error(error).into();
        log::log!(level, "{} failed: {}", operation, error);
    }
}
