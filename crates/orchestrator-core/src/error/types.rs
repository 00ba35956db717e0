//! # Error Handling for the Orchestrator Core
//!
//! All operations across the catalog, engine, and app layers return a single
//! [`OrchestratorError`] enum. Each variant corresponds to one of the failure
//! modes an orchestration run can hit: intent resolution, workflow selection,
//! input mapping, node execution, and the external-collaborator seams
//! (catalog store, search index, LLM bridge).
//!
//! ## Usage Examples
//!
//! ```rust
//! use orchestrator_core::error::OrchestratorError;
//!
//! fn handle(result: Result<(), OrchestratorError>) {
//!     match result {
//!         Ok(()) => println!("done"),
//!         Err(OrchestratorError::NoWorkflowForIntent { intent }) => {
//!             eprintln!("no workflow registered for intent {intent}");
//!         }
//!         Err(OrchestratorError::UnsatisfiableInputs { node_id, missing_keys }) => {
//!             eprintln!("node {node_id} missing inputs: {missing_keys:?}");
//!         }
//!         Err(e) => eprintln!("orchestration failed: {e}"),
//!     }
//! }
//! ```
//!
//! ## Error Conversion
//!
//! [`OrchestratorError`] implements [`From`] for the serialization errors the
//! core data model can raise while crossing the catalog persistence boundary.

use uuid::Uuid;

/// Primary error type for orchestrator-core, orchestrator-catalog, and
/// orchestrator-engine operations.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Intent detection could not classify the incoming utterance with
    /// sufficient confidence against the known intent catalog.
    #[error("could not resolve an intent for input: {utterance}")]
    IntentUnresolved {
        /// The raw utterance or request text that failed classification.
        utterance: String,
    },

    /// An intent was resolved, but no enabled workflow is registered for it.
    #[error("no workflow registered for intent {intent}")]
    NoWorkflowForIntent {
        /// The normalized UPPER_SNAKE_CASE intent name.
        intent: String,
    },

    /// The input mapper could not assign the available variables to the
    /// entry node's required input ports.
    #[error("input mapping impossible: {reason}")]
    InputMappingImpossible {
        /// Human-readable explanation of why mapping failed.
        reason: String,
    },

    /// The selected workflow instance is deprecated with no replacement, or
    /// otherwise not eligible to accept new runs.
    #[error("workflow {workflow_id} is disabled")]
    WorkflowDisabled {
        /// Id of the disabled workflow instance.
        workflow_id: Uuid,
    },

    /// A node's `process` call returned an error.
    #[error("node {node_id} failed: {cause}")]
    NodeProcessingFailed {
        /// Id of the node instance that failed.
        node_id: Uuid,
        /// Underlying failure description.
        cause: String,
    },

    /// A node became ready to run but one or more required input ports still
    /// had no value in the execution context, and port adaptation could not
    /// fill the gap.
    #[error("node {node_id} has unsatisfiable inputs: {missing_keys:?}")]
    UnsatisfiableInputs {
        /// Id of the node instance that could not be satisfied.
        node_id: Uuid,
        /// Dot-paths of the required ports with no bound value.
        missing_keys: Vec<String>,
    },

    /// An edge's condition expression referenced an unsupported operator or
    /// an operand type mismatch.
    #[error("invalid edge condition on edge {edge}: {reason}")]
    InvalidEdgeCondition {
        /// Identifier of the offending edge (`from_node -> to_node`).
        edge: String,
        /// Explanation of the condition failure.
        reason: String,
    },

    /// The metamodel/instance catalog (the out-of-scope durable store, or its
    /// in-memory stand-in) failed to complete an operation.
    #[error("catalog error: {message}")]
    CatalogError {
        /// Details from the catalog backend.
        message: String,
    },

    /// The node search index (hybrid vector + full-text search seam) failed.
    #[error("search error: {message}")]
    SearchError {
        /// Details from the search backend.
        message: String,
    },

    /// The LLM bridge (intent classification, input mapping, port
    /// adaptation) failed or returned an unusable response.
    #[error("LLM error: {message}")]
    LLMError {
        /// Details about the LLM call failure.
        message: String,
    },

    /// A metamodel, port value, or schema failed validation — includes
    /// workflow graph validation (cycle detection, unreachable nodes,
    /// dangling edges).
    #[error("validation error: {message}")]
    ValidationError {
        /// Details about what failed validation.
        message: String,
    },

    /// Failed to serialize a value (context snapshot, metamodel, report) to
    /// the catalog's storage format.
    #[error("serialization error: {message}")]
    SerializationError {
        /// Details about the serialization failure.
        message: String,
    },

    /// Failed to deserialize a value read back from the catalog.
    #[error("deserialization error: {message}")]
    DeserializationError {
        /// Details about the deserialization failure.
        message: String,
    },

    /// Configuration is invalid or incomplete.
    #[error("configuration error: {0}")]
    ConfigurationError(
        /// Details about the configuration issue.
        String,
    ),

    /// An operation exceeded its allotted time budget.
    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// Elapsed time in milliseconds before cancellation.
        elapsed_ms: u64,
    },
}

impl OrchestratorError {
    /// Build a [`OrchestratorError::CatalogError`] from any displayable cause.
    pub fn catalog_error(message: impl Into<String>) -> Self {
        OrchestratorError::CatalogError { message: message.into() }
    }

    /// Build a [`OrchestratorError::SearchError`] from any displayable cause.
    pub fn search_error(message: impl Into<String>) -> Self {
        OrchestratorError::SearchError { message: message.into() }
    }

    /// Build a [`OrchestratorError::LLMError`] from any displayable cause.
    pub fn llm_error(message: impl Into<String>) -> Self {
        OrchestratorError::LLMError { message: message.into() }
    }

    /// Build a [`OrchestratorError::ValidationError`] from any displayable cause.
    pub fn validation_error(message: impl Into<String>) -> Self {
        OrchestratorError::ValidationError { message: message.into() }
    }

    /// Build a [`OrchestratorError::NodeProcessingFailed`].
    pub fn node_processing_failed(node_id: Uuid, cause: impl Into<String>) -> Self {
        OrchestratorError::NodeProcessingFailed { node_id, cause: cause.into() }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(error: serde_json::Error) -> Self {
        OrchestratorError::SerializationError {
            message: error.to_string(),
        }
    }
}

impl super::ErrorExt for OrchestratorError {
    fn category(&self) -> super::ErrorCategory {
        super::context::categorize_error(self).0
    }

    fn severity(&self) -> super::ErrorSeverity {
        super::context::categorize_error(self).1
    }

    fn error_code(&self) -> &'static str {
        match self {
            OrchestratorError::IntentUnresolved { .. } => "INTENT_001",
            OrchestratorError::NoWorkflowForIntent { .. } => "ROUTE_001",
            OrchestratorError::InputMappingImpossible { .. } => "INPUT_MAP_001",
            OrchestratorError::WorkflowDisabled { .. } => "WF_DISABLED_001",
            OrchestratorError::NodeProcessingFailed { .. } => "NODE_FAIL_001",
            OrchestratorError::UnsatisfiableInputs { .. } => "UNSAT_INPUT_001",
            OrchestratorError::InvalidEdgeCondition { .. } => "EDGE_COND_001",
            OrchestratorError::CatalogError { .. } => "CATALOG_001",
            OrchestratorError::SearchError { .. } => "SEARCH_001",
            OrchestratorError::LLMError { .. } => "LLM_001",
            OrchestratorError::ValidationError { .. } => "VALIDATION_001",
            OrchestratorError::SerializationError { .. } => "SER_001",
            OrchestratorError::DeserializationError { .. } => "DESER_001",
            OrchestratorError::ConfigurationError(_) => "CONFIG_001",
            OrchestratorError::Timeout { .. } => "TIMEOUT_001",
        }
    }
}
