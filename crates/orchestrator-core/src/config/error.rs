//! Configuration error types
//!
//! This module provides the error types for configuration management.

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable not found: {key}{}", .default.as_ref().map(|d| format!(" (default: {d})")).unwrap_or_default())]
    EnvVarNotFound { key: String, default: Option<String> },

    #[error("invalid value for {key} ({category}): got {value:?}, expected {expected}")]
    InvalidValue { key: String, value: String, expected: String, category: String },

    #[error("validation failed ({category}): {message}; suggestion: {suggestion}")]
    ValidationFailed {
        message: String,
        category: String,
        suggestion: String,
        details: Vec<(String, String)>,
    },

    #[error("parsing error in {field} ({category}): {message}")]
    ParseError { message: String, category: String, field: String },

    #[error("required field missing: {0}")]
    RequiredFieldMissing(String),
}

impl ConfigError {
    pub fn env_var_not_found(key: impl Into<String>, default: Option<&str>) -> Self {
        ConfigError::EnvVarNotFound { key: key.into(), default: default.map(str::to_string) }
    }

    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            value: value.into(),
            expected: expected.into(),
            category: category.into(),
        }
    }

    pub fn validation_failed(
        message: impl Into<String>,
        category: impl Into<String>,
        suggestion: impl Into<String>,
        details: Vec<(String, String)>,
    ) -> Self {
        ConfigError::ValidationFailed {
            message: message.into(),
            category: category.into(),
            suggestion: suggestion.into(),
            details,
        }
    }

    /// Convenience constructor for call sites that have no specific
    /// category/suggestion/detail to report beyond the message itself.
    pub fn simple_validation(message: impl Into<String>) -> Self {
        Self::validation_failed(message, "general", "see message", Vec::new())
    }

    pub fn parse_error(
        message: impl Into<String>,
        category: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        ConfigError::ParseError { message: message.into(), category: category.into(), field: field.into() }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
