//! # Error Context Utilities
//!
//! This module provides utilities for adding rich context to errors,
//! including correlation IDs, structured metadata, and error chaining.

use super::{OrchestratorError, ErrorCategory, ErrorSeverity, ErrorMetadata};
use std::collections::HashMap;
use serde::Serialize;
use serde_json::{json, Value};

/// Error with additional context
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: OrchestratorError,
    /// Error metadata
    pub metadata: ErrorMetadata,
    /// Error chain (causes)
    pub chain: Vec<String>,
}

impl ErrorContext {
    /// Create new error context
    pub fn new(error: OrchestratorError) -> Self {
        let (category, severity, code) = categorize_error(&error);
        Self {
            error,
            metadata: ErrorMetadata::new(category, severity, code),
            chain: Vec::new(),
        }
    }

    /// Add context value
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.metadata.context.insert(key.into(), json_value);
        }
        self
    }

    /// Set correlation ID
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(id.into());
        self
    }

    /// Add to error chain
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.chain.push(cause.into());
        self
    }

    /// Convert to JSON for logging
    pub fn to_json(&self) -> Value {
        json!({
            "error": self.error.to_string(),
            "category": self.metadata.category,
            "severity": self.metadata.severity,
            "code": self.metadata.error_code,
            "correlation_id": self.metadata.correlation_id,
            "context": self.metadata.context,
            "chain": self.chain,
            "timestamp": self.metadata.timestamp,
            "retry_count": self.metadata.retry_count,
        })
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContextExt: Sized {
    /// Add context to the error
    fn context(self, key: impl Into<String>, value: impl Serialize) -> ErrorContext;

    /// Add correlation ID
    fn with_correlation_id(self, id: impl Into<String>) -> ErrorContext;

    /// Add multiple context values
    fn with_contexts(self, contexts: HashMap<String, Value>) -> ErrorContext;
}

impl ErrorContextExt for OrchestratorError {
    fn context(self, key: impl Into<String>, value: impl Serialize) -> ErrorContext {
        ErrorContext::new(self).with_context(key, value)
    }

    fn with_correlation_id(self, id: impl Into<String>) -> ErrorContext {
        ErrorContext::new(self).with_correlation_id(id)
    }

    fn with_contexts(self, contexts: HashMap<String, Value>) -> ErrorContext {
        let mut error_context = ErrorContext::new(self);
        for (key, value) in contexts {
            error_context.metadata.context.insert(key, value);
        }
        error_context
    }
}

/// Categorize an error for retry/alerting decisions.
pub fn categorize_error(error: &OrchestratorError) -> (ErrorCategory, ErrorSeverity, String) {
    match error {
        // External-collaborator errors are usually transient.
        OrchestratorError::CatalogError { .. } => (
            ErrorCategory::Transient,
            ErrorSeverity::Error,
            "CATALOG_001".to_string(),
        ),
        OrchestratorError::SearchError { .. } => (
            ErrorCategory::Transient,
            ErrorSeverity::Warning,
            "SEARCH_001".to_string(),
        ),
        OrchestratorError::LLMError { .. } => (
            ErrorCategory::Transient,
            ErrorSeverity::Warning,
            "LLM_001".to_string(),
        ),
        OrchestratorError::Timeout { .. } => (
            ErrorCategory::Transient,
            ErrorSeverity::Error,
            "TIMEOUT_001".to_string(),
        ),

        // Graph/structure errors are permanent until the metamodel is fixed.
        OrchestratorError::InvalidEdgeCondition { .. } => (
            ErrorCategory::Permanent,
            ErrorSeverity::Error,
            "EDGE_COND_001".to_string(),
        ),
        OrchestratorError::ValidationError { .. } => (
            ErrorCategory::Permanent,
            ErrorSeverity::Critical,
            "VALIDATION_001".to_string(),
        ),

        // Routing/input-resolution failures are user-input driven.
        OrchestratorError::IntentUnresolved { .. } => (
            ErrorCategory::User,
            ErrorSeverity::Warning,
            "INTENT_001".to_string(),
        ),
        OrchestratorError::NoWorkflowForIntent { .. } => (
            ErrorCategory::User,
            ErrorSeverity::Warning,
            "ROUTE_001".to_string(),
        ),
        OrchestratorError::InputMappingImpossible { .. } => (
            ErrorCategory::User,
            ErrorSeverity::Warning,
            "INPUT_MAP_001".to_string(),
        ),
        OrchestratorError::WorkflowDisabled { .. } => (
            ErrorCategory::User,
            ErrorSeverity::Warning,
            "WF_DISABLED_001".to_string(),
        ),

        // Execution-time errors are system errors.
        OrchestratorError::NodeProcessingFailed { .. } => (
            ErrorCategory::System,
            ErrorSeverity::Error,
            "NODE_FAIL_001".to_string(),
        ),
        OrchestratorError::UnsatisfiableInputs { .. } => (
            ErrorCategory::System,
            ErrorSeverity::Error,
            "UNSAT_INPUT_001".to_string(),
        ),
        OrchestratorError::SerializationError { .. } => (
            ErrorCategory::System,
            ErrorSeverity::Error,
            "SER_001".to_string(),
        ),
        OrchestratorError::DeserializationError { .. } => (
            ErrorCategory::System,
            ErrorSeverity::Error,
            "DESER_001".to_string(),
        ),
        OrchestratorError::ConfigurationError(_) => (
            ErrorCategory::System,
            ErrorSeverity::Critical,
            "CONFIG_001".to_string(),
        ),
    }
}

/// Error context builder for fluent API
pub struct ErrorContextBuilder {
    error: OrchestratorError,
    context: HashMap<String, Value>,
    correlation_id: Option<String>,
    causes: Vec<String>,
}

impl ErrorContextBuilder {
    /// Create new builder
    pub fn new(error: OrchestratorError) -> Self {
        Self {
            error,
            context: HashMap::new(),
            correlation_id: None,
            causes: Vec::new(),
        }
    }

    /// Add context value
    pub fn context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.context.insert(key.into(), json_value);
        }
        self
    }

    /// Set correlation ID
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add cause
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Build error context
    pub fn build(self) -> ErrorContext {
        let mut error_context = ErrorContext::new(self.error);
        error_context.metadata.context = self.context;
        error_context.metadata.correlation_id = self.correlation_id;
        error_context.chain = self.causes;
        error_context
    }
}

/// Correlation ID generator, used to tag each orchestration run for log
/// correlation across catalog/engine/app boundaries.
pub struct CorrelationIdGenerator;

impl CorrelationIdGenerator {
    /// Generate a new correlation ID
    pub fn generate() -> String {
        use uuid::Uuid;
        format!("run-{}", Uuid::new_v4())
    }

    /// Generate with prefix
    pub fn generate_with_prefix(prefix: &str) -> String {
        use uuid::Uuid;
        format!("{}-{}", prefix, Uuid::new_v4())
    }
}

/// Macro for adding context to errors easily
#[macro_export]
macro_rules! error_context {
    ($error:expr, $($key:expr => $value:expr),* $(,)?) => {{
        use $crate::error::ErrorContextExt;
        let mut ctx = $crate::error::ErrorContext::new($error);
        $(
            ctx = ctx.with_context($key, $value);
        )*
        ctx
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_builder() {
        let error = OrchestratorError::NodeProcessingFailed {
            node_id: uuid::Uuid::nil(),
            cause: "Test error".to_string(),
        };

        let context = ErrorContextBuilder::new(error)
            .context("run_id", "12345")
            .context("operation", "process_node")
            .correlation_id("run-123")
            .cause("connector timeout")
            .build();

        assert_eq!(context.metadata.correlation_id.as_deref(), Some("run-123"));
        assert_eq!(context.chain.len(), 1);
        assert_eq!(context.metadata.context.get("run_id"), Some(&json!("12345")));
    }

    #[test]
    fn test_error_categorization() {
        let transient_error = OrchestratorError::LLMError {
            message: "Service unavailable".to_string(),
        };
        let (category, _, _) = categorize_error(&transient_error);
        assert_eq!(category, ErrorCategory::Transient);

        let permanent_error = OrchestratorError::ValidationError {
            message: "workflow graph contains a cycle".to_string(),
        };
        let (category, severity, _) = categorize_error(&permanent_error);
        assert_eq!(category, ErrorCategory::Permanent);
        assert_eq!(severity, ErrorSeverity::Critical);
    }
}
