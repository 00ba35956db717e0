//! # Metamodels — versioned, typed descriptions of nodes, workflows, intents
//!
//! The knowledge-layer vocabulary: [`NodeMetamodel`], [`WorkflowMetamodel`],
//! and [`IntentMetamodel`] are the documents a catalog service stores,
//! versions, and serves to the operational layer's instance pools. None of
//! the types here perform I/O; persistence and search are external
//! collaborators (`orchestrator-catalog`).
//!
//! [`NodeConfigPayload`] follows a `nodes::agent::{ModelProvider, AgentConfig}`
//! split (one config shape per model provider, dispatched by an enum),
//! generalized from "LLM provider only" to the full `AI | TOOL | FLOW` type
//! lattice (§3).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::ports::{Port, PortRole};

/// Semantic version triple. `Ord`-derived so "major version bump" (breaking
/// change detection, §4.2/§4.3) is a plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Whether `other` is a breaking update relative to `self` (major bump).
    pub fn is_breaking_update_to(&self, other: &Version) -> bool {
        other.major > self.major
    }

    pub fn bump_major(self) -> Self {
        Version::new(self.major + 1, 0, 0)
    }

    pub fn bump_minor(self) -> Self {
        Version::new(self.major, self.minor + 1, 0)
    }

    pub fn bump_patch(self) -> Self {
        Version::new(self.major, self.minor, self.patch + 1)
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::new(1, 0, 0)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Top-level node family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Ai,
    Tool,
    Flow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    Llm,
    Embeddings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolType {
    Rest,
    VectorDb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlType {
    Gateway,
}

/// Model provider for an LLM or embeddings node, shaped like
/// `nodes::agent::ModelProvider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelProvider {
    OpenAi,
    AzureOpenAi,
    Anthropic,
    Bedrock,
}

/// HTTP method for a REST tool node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Type-specific configuration payload, keyed to the node's
/// `type`/`modelType`/`toolType`/`controlType` discriminators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeConfigPayload {
    Llm {
        provider: ModelProvider,
        model: String,
        system_prompt: String,
        parameters: BTreeMap<String, serde_json::Value>,
    },
    Embeddings {
        provider: ModelProvider,
        model: String,
        dimensions: usize,
    },
    Rest {
        uri: String,
        method: HttpMethod,
        headers: BTreeMap<String, String>,
    },
    VectorDb {
        connection_uri: String,
        collection: String,
        top_k: usize,
    },
    Gateway,
}

/// Versioned, typed description of a computational node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetamodel {
    pub id: Uuid,
    /// Groups successive versions of "the same" node.
    pub family_id: Uuid,
    pub version: Version,
    pub is_latest: bool,

    pub name: String,
    pub description: String,
    pub author: String,
    pub qualitative_descriptor: String,

    pub node_type: NodeType,
    pub model_type: Option<ModelType>,
    pub tool_type: Option<ToolType>,
    pub control_type: Option<ControlType>,

    pub input_ports: Vec<Port>,
    pub output_ports: Vec<Port>,
    pub config: NodeConfigPayload,

    /// Dense vector derived from name + type + description + port keys, used
    /// by the hybrid search index (§6).
    pub embedding: Vec<f32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NodeMetamodel {
    /// The node-family discriminator string used by `PortRole::is_valid_for`.
    fn family_key(&self) -> &'static str {
        match self.node_type {
            NodeType::Ai => match self.model_type {
                Some(ModelType::Llm) => "llm",
                Some(ModelType::Embeddings) => "embeddings",
                None => "llm",
            },
            NodeType::Tool => match self.tool_type {
                Some(ToolType::Rest) => "rest",
                Some(ToolType::VectorDb) => "vector_db",
                None => "rest",
            },
            NodeType::Flow => "gateway",
        }
    }

    /// Validates the structural invariants from spec §3: refinement
    /// consistency (`modelType`/`toolType`/`controlType` match `type`), port
    /// key uniqueness, and role legality per node family.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        match self.node_type {
            NodeType::Ai if self.model_type.is_none() => {
                return Err(OrchestratorError::validation_error(
                    "AI node must set modelType",
                ));
            }
            NodeType::Tool if self.tool_type.is_none() => {
                return Err(OrchestratorError::validation_error(
                    "TOOL node must set toolType",
                ));
            }
            NodeType::Flow if self.control_type.is_none() => {
                return Err(OrchestratorError::validation_error(
                    "FLOW node must set controlType",
                ));
            }
            _ => {}
        }

        let mut seen_keys = std::collections::HashSet::new();
        for port in self.input_ports.iter().chain(self.output_ports.iter()) {
            if !seen_keys.insert(port.key.as_str()) {
                return Err(OrchestratorError::validation_error(format!(
                    "duplicate port key {:?} in node {}",
                    port.key, self.id
                )));
            }
        }

        let family = self.family_key();
        for port in self.input_ports.iter().chain(self.output_ports.iter()) {
            if !port.role.is_valid_for(family) {
                return Err(OrchestratorError::validation_error(format!(
                    "port role {:?} is not legal for node family {}",
                    port.role, family
                )));
            }
        }

        Ok(())
    }

    pub fn required_input_ports(&self) -> impl Iterator<Item = &Port> {
        self.input_ports.iter().filter(|p| p.is_required())
    }

    pub fn input_port(&self, key: &str) -> Option<&Port> {
        self.input_ports.iter().find(|p| p.key == key)
    }

    pub fn output_port(&self, key: &str) -> Option<&Port> {
        self.output_ports.iter().find(|p| p.key == key)
    }
}

/// `{id, name, description, embedding, aiGenerated}`. Names are normalized
/// to `UPPER_SNAKE_CASE` by the intent detector before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentMetamodel {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub embedding: Vec<f32>,
    pub ai_generated: bool,
    pub created_at: DateTime<Utc>,
}

/// Normalizes a free-text intent name to `UPPER_SNAKE_CASE`.
pub fn normalize_intent_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Readiness discipline for a workflow node: `MERGE` fires on the first
/// satisfied incoming edge, `DEFAULT` (JOIN) requires every incoming edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionType {
    Default,
    Merge,
}

/// A node's placement within a workflow graph — workflow-local id plus the
/// node metamodel it instantiates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    pub node_metamodel_id: Uuid,
    pub execution_type: ExecutionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpressionOperation {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    StartsWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    IsTrue,
    IsFalse,
}

/// A single predicate within an edge condition: `context.get(port) <op> value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionExpression {
    pub port: String,
    pub operation: ExpressionOperation,
    /// Absent (`None`) only for the null/true/false operations, which read
    /// no operand.
    pub value: Option<crate::ports::PortValue>,
}

/// Rich edge condition: a set of expressions combined by `operator`
/// (defaults to AND when absent at the edge level, see [`WorkflowEdge`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeCondition {
    pub operator: ConditionOperator,
    pub expressions: Vec<ConditionExpression>,
}

impl EdgeCondition {
    /// Validation-time checks from §4.6: at least one expression; each
    /// expression has a port and operation; `value` is null only for the
    /// null/true/false operations.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.expressions.is_empty() {
            return Err(OrchestratorError::validation_error(
                "edge condition must have at least one expression",
            ));
        }
        for expr in &self.expressions {
            if expr.port.trim().is_empty() {
                return Err(OrchestratorError::validation_error(
                    "condition expression must name a port",
                ));
            }
            let allows_null_value = matches!(
                expr.operation,
                ExpressionOperation::IsNull
                    | ExpressionOperation::IsNotNull
                    | ExpressionOperation::IsTrue
                    | ExpressionOperation::IsFalse
            );
            if expr.value.is_none() && !allows_null_value {
                return Err(OrchestratorError::validation_error(format!(
                    "condition expression on port {:?} requires a value for operation {:?}",
                    expr.port, expr.operation
                )));
            }
        }
        Ok(())
    }
}

/// A directed transition between two workflow nodes, carrying an optional
/// gating condition and a set of `sourcePath -> targetPath` bindings applied
/// when the edge fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub condition: Option<EdgeCondition>,
    /// Insertion-ordered so tie-breaking in the executor (§4.4 "Ordering &
    /// determinism") is deterministic.
    pub bindings: BTreeMap<String, String>,
}

impl WorkflowEdge {
    pub fn label(&self) -> String {
        format!("{} -> {}", self.source_node_id, self.target_node_id)
    }
}

/// `{intentId, score}` — a workflow's declared ability to handle an intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandledIntent {
    pub intent_id: Uuid,
    pub score: f64,
}

/// Versioned, typed description of a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetamodel {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub version: Version,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,

    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
    pub handled_intents: Vec<HandledIntent>,
}

impl WorkflowMetamodel {
    /// Nodes with in-degree 0 (no incoming edge).
    pub fn entry_nodes(&self) -> Vec<&WorkflowNode> {
        let has_incoming: std::collections::HashSet<&str> =
            self.edges.iter().map(|e| e.target_node_id.as_str()).collect();
        self.nodes.iter().filter(|n| !has_incoming.contains(n.id.as_str())).collect()
    }

    /// Nodes with out-degree 0 (no outgoing edge).
    pub fn exit_nodes(&self) -> Vec<&WorkflowNode> {
        let has_outgoing: std::collections::HashSet<&str> =
            self.edges.iter().map(|e| e.source_node_id.as_str()).collect();
        self.nodes.iter().filter(|n| !has_outgoing.contains(n.id.as_str())).collect()
    }

    pub fn node(&self, workflow_node_id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == workflow_node_id)
    }

    pub fn outgoing_edges(&self, workflow_node_id: &str) -> Vec<&WorkflowEdge> {
        self.edges.iter().filter(|e| e.source_node_id == workflow_node_id).collect()
    }

    pub fn incoming_edges(&self, workflow_node_id: &str) -> Vec<&WorkflowEdge> {
        self.edges.iter().filter(|e| e.target_node_id == workflow_node_id).collect()
    }

    /// Returns `true` iff the node membership (the multiset of
    /// `workflowNodeId -> nodeMetamodelId` pairs) differs from `other`'s —
    /// the breaking-update test from §4.3.
    pub fn node_membership_differs(&self, other: &WorkflowMetamodel) -> bool {
        let mine: std::collections::BTreeMap<&str, Uuid> =
            self.nodes.iter().map(|n| (n.id.as_str(), n.node_metamodel_id)).collect();
        let theirs: std::collections::BTreeMap<&str, Uuid> =
            other.nodes.iter().map(|n| (n.id.as_str(), n.node_metamodel_id)).collect();
        mine != theirs
    }

    pub fn handles_intent(&self, intent_id: Uuid) -> Option<f64> {
        self.handled_intents.iter().find(|h| h.intent_id == intent_id).map(|h| h.score)
    }

    /// Structural validation: workflow-local node ids and edge ids are
    /// unique, every edge's endpoints resolve to a declared node, every
    /// edge's condition (if any) validates (§4.6 "rejected before
    /// execution"), and handled-intent scores lie within `[0, 1]` (§3).
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        let mut seen_node_ids = std::collections::HashSet::new();
        for node in &self.nodes {
            if !seen_node_ids.insert(node.id.as_str()) {
                return Err(OrchestratorError::validation_error(format!(
                    "duplicate workflow-local node id {:?} in workflow {}",
                    node.id, self.id
                )));
            }
        }

        let mut seen_edge_ids = std::collections::HashSet::new();
        for edge in &self.edges {
            if !seen_edge_ids.insert(edge.id.as_str()) {
                return Err(OrchestratorError::validation_error(format!(
                    "duplicate edge id {:?} in workflow {}",
                    edge.id, self.id
                )));
            }
            if !seen_node_ids.contains(edge.source_node_id.as_str()) {
                return Err(OrchestratorError::validation_error(format!(
                    "edge {:?} references unknown source node {:?}",
                    edge.id, edge.source_node_id
                )));
            }
            if !seen_node_ids.contains(edge.target_node_id.as_str()) {
                return Err(OrchestratorError::validation_error(format!(
                    "edge {:?} references unknown target node {:?}",
                    edge.id, edge.target_node_id
                )));
            }
            if let Some(condition) = &edge.condition {
                condition.validate().map_err(|e| {
                    OrchestratorError::InvalidEdgeCondition { edge: edge.label(), reason: e.to_string() }
                })?;
            }
        }

        for handled in &self.handled_intents {
            if !(0.0..=1.0).contains(&handled.score) {
                return Err(OrchestratorError::validation_error(format!(
                    "handled-intent score {} for intent {} out of range [0, 1]",
                    handled.score, handled.intent_id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_port(key: &str, role: PortRole) -> Port {
        Port::new(key, crate::ports::PortSchema::optional(crate::ports::PortSchemaKind::String), role)
    }

    #[test]
    fn version_ord_detects_major_bump_as_breaking() {
        let v1 = Version::new(1, 2, 3);
        let v2 = Version::new(2, 0, 0);
        assert!(v1.is_breaking_update_to(&v2));
        assert!(!v1.is_breaking_update_to(&v1.bump_minor()));
    }

    #[test]
    fn normalize_intent_name_uppercases_and_snakes() {
        assert_eq!(normalize_intent_name("book a flight"), "BOOK_A_FLIGHT");
        assert_eq!(normalize_intent_name("  reset-password!! "), "RESET_PASSWORD");
    }

    #[test]
    fn entry_and_exit_nodes_derived_from_edges() {
        let wf = WorkflowMetamodel {
            id: Uuid::new_v4(),
            name: "wf".into(),
            description: String::new(),
            version: Version::default(),
            enabled: true,
            created_at: Utc::now(),
            nodes: vec![
                WorkflowNode { id: "a".into(), node_metamodel_id: Uuid::new_v4(), execution_type: ExecutionType::Default },
                WorkflowNode { id: "b".into(), node_metamodel_id: Uuid::new_v4(), execution_type: ExecutionType::Default },
            ],
            edges: vec![WorkflowEdge {
                id: "e1".into(),
                source_node_id: "a".into(),
                target_node_id: "b".into(),
                condition: None,
                bindings: BTreeMap::new(),
            }],
            handled_intents: vec![],
        };
        assert_eq!(wf.entry_nodes().iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(wf.exit_nodes().iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn node_metamodel_rejects_duplicate_port_keys() {
        let node = NodeMetamodel {
            id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            version: Version::default(),
            is_latest: true,
            name: "dup".into(),
            description: String::new(),
            author: "test".into(),
            qualitative_descriptor: String::new(),
            node_type: NodeType::Ai,
            model_type: Some(ModelType::Llm),
            tool_type: None,
            control_type: None,
            input_ports: vec![
                sample_port("prompt", PortRole::UserPrompt),
                sample_port("prompt", PortRole::SystemPromptVariable),
            ],
            output_ports: vec![],
            config: NodeConfigPayload::Llm {
                provider: ModelProvider::OpenAi,
                model: "gpt-4".into(),
                system_prompt: String::new(),
                parameters: BTreeMap::new(),
            },
            embedding: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(node.validate().is_err());
    }

    #[test]
    fn node_metamodel_rejects_role_illegal_for_family() {
        let node = NodeMetamodel {
            id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            version: Version::default(),
            is_latest: true,
            name: "bad-role".into(),
            description: String::new(),
            author: "test".into(),
            qualitative_descriptor: String::new(),
            node_type: NodeType::Ai,
            model_type: Some(ModelType::Llm),
            tool_type: None,
            control_type: None,
            input_ports: vec![sample_port("body", PortRole::ReqBody)],
            output_ports: vec![],
            config: NodeConfigPayload::Llm {
                provider: ModelProvider::OpenAi,
                model: "gpt-4".into(),
                system_prompt: String::new(),
                parameters: BTreeMap::new(),
            },
            embedding: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(node.validate().is_err());
    }

    #[test]
    fn edge_condition_requires_at_least_one_expression() {
        let condition = EdgeCondition { operator: ConditionOperator::And, expressions: vec![] };
        assert!(condition.validate().is_err());
    }

    #[test]
    fn edge_condition_allows_null_value_only_for_presence_ops() {
        let ok = EdgeCondition {
            operator: ConditionOperator::And,
            expressions: vec![ConditionExpression {
                port: "status".into(),
                operation: ExpressionOperation::IsNull,
                value: None,
            }],
        };
        assert!(ok.validate().is_ok());

        let bad = EdgeCondition {
            operator: ConditionOperator::And,
            expressions: vec![ConditionExpression {
                port: "status".into(),
                operation: ExpressionOperation::Equals,
                value: None,
            }],
        };
        assert!(bad.validate().is_err());
    }
}
