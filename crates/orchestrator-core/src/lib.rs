//! # orchestrator-core
//!
//! Data model, error taxonomy, configuration, token accounting, and
//! observability report types for the cognitive workflow orchestrator. This
//! crate performs no I/O: it is the shared vocabulary the catalog and engine
//! layers build on.
//!
//! ## Core concepts
//!
//! - [`context::ExecutionContext`] — the dot-path addressable run state
//!   threaded through a single workflow execution.
//! - [`ports::PortValue`] / [`ports::PortSchema`] — the tagged-union runtime
//!   value type and its tolerant structural validator.
//! - [`metamodel`] — versioned, typed descriptions of nodes, workflows, and
//!   intents, as stored in the catalog.
//! - [`observability`] — the per-run report shape (node/edge/adaptation
//!   records, token usage, metrics) assembled by the executor.
//! - [`error::OrchestratorError`] — the single error type shared by every
//!   layer of the orchestrator.

pub mod ai;
pub mod config;
pub mod context;
pub mod error;
pub mod metamodel;
pub mod observability;
pub mod ports;
pub mod testing;

pub use context::ExecutionContext;
pub use error::{ErrorCategory, ErrorSeverity, OrchestratorError, Result};
pub use metamodel::{
    IntentMetamodel, NodeMetamodel, Version, WorkflowEdge, WorkflowMetamodel, WorkflowNode,
};
pub use observability::{IntentDetectionReport, InputMappingReport, OrchestrationReport, RoutingDecision};
pub use ports::{Port, PortRole, PortSchema, PortValue};

/// Current version of the orchestrator core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::{
        context::ExecutionContext,
        error::{OrchestratorError, Result},
        metamodel::{IntentMetamodel, NodeMetamodel, Version, WorkflowEdge, WorkflowMetamodel, WorkflowNode},
        observability::{IntentDetectionReport, InputMappingReport, OrchestrationReport, RoutingDecision},
        ports::{Port, PortRole, PortSchema, PortValue},
    };
    pub use async_trait::async_trait;
    pub use serde_json::{json, Value};
    pub use uuid::Uuid;
}
