//! # Observability report — the per-run trace assembled by the executor
//!
//! [`OrchestrationReport`] is returned alongside the final `output` from a
//! single orchestration request. It records every node execution, every edge
//! evaluation, every port adaptation, and the aggregate token usage, so a
//! caller (or test) can reconstruct exactly what the executor did without
//! re-running it.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::tokens::TokenUsage;
use crate::ports::PortValue;

/// Outcome of a single node's execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeOutcome {
    Succeeded,
    Failed,
    /// Skipped because none of its incoming edges were satisfied (a
    /// conditional branch that never fired).
    Skipped,
}

/// Detail record for one node execution within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDetail {
    pub workflow_node_id: String,
    pub node_metamodel_id: Uuid,
    pub outcome: NodeOutcome,
    pub inputs: BTreeMap<String, PortValue>,
    pub outputs: BTreeMap<String, PortValue>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub token_usage: Option<TokenUsage>,
}

impl NodeDetail {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Record of a single edge's condition evaluation during propagation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEvaluationRecord {
    pub edge_id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub satisfied: bool,
    /// Human-readable reason, e.g. `"status EQUALS \"ok\" -> true"` or
    /// `"no condition, always satisfied"`.
    pub reason: String,
}

/// Record of a port-adaptation attempt (§4.5/§4.11): a node was about to run
/// with a missing required input, and the adapter was invoked to either
/// supply a value from context or fail the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortAdaptationRecord {
    pub workflow_node_id: String,
    pub port_key: String,
    pub succeeded: bool,
    /// The adapted value, when the adapter found one.
    pub adapted_value: Option<PortValue>,
    /// Whether the adapted binding was persisted back to the catalog as a
    /// new edge binding for future runs.
    pub persisted: bool,
    pub reason: String,
    /// Token usage reported by the `PortAdapter`'s LLM call (§6: port
    /// adaptation is one of the three LLM-bridge roles that must report
    /// usage).
    pub token_usage: Option<TokenUsage>,
}

/// Aggregate run-level metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_nodes_executed: usize,
    pub total_nodes_failed: usize,
    pub total_nodes_skipped: usize,
    pub total_edges_evaluated: usize,
    pub total_port_adaptations: usize,
    pub total_duration_ms: u64,
    pub total_token_usage: TokenUsage,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self {
            total_nodes_executed: 0,
            total_nodes_failed: 0,
            total_nodes_skipped: 0,
            total_edges_evaluated: 0,
            total_port_adaptations: 0,
            total_duration_ms: 0,
            total_token_usage: TokenUsage::new(0, 0),
        }
    }
}

/// Sub-report for the intent-detection stage (§4.10) that precedes routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDetectionReport {
    pub utterance: String,
    pub intent_id: Uuid,
    pub intent_name: String,
    /// Whether the detector minted a brand-new intent for this request
    /// rather than resolving to an existing one.
    pub created_new_intent: bool,
    pub user_variables: BTreeMap<String, PortValue>,
    pub token_usage: Option<TokenUsage>,
}

/// Sub-report for the input-mapping stage (§4.9) that follows routing and
/// precedes workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMappingReport {
    /// `true` when [`crate::observability`]'s caller short-circuited on
    /// trivially-satisfiable bindings without an LLM call.
    pub short_circuited: bool,
    pub bindings: BTreeMap<String, PortValue>,
    pub token_usage: Option<TokenUsage>,
}

/// Which intent/workflow/instance the run resolved to, recorded for
/// auditability independent of the node-by-node trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub intent_id: Option<Uuid>,
    pub intent_name: Option<String>,
    pub workflow_id: Uuid,
    pub workflow_version: crate::metamodel::Version,
    /// Sampling weight assigned to the chosen workflow among the candidates
    /// considered (§4.8); `1.0` when routing was unambiguous.
    pub sampling_weight: f64,
}

/// The complete trace of a single orchestration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Absent only when the run failed before intent detection ran at all.
    pub intent_detection: Option<IntentDetectionReport>,
    pub routing: Option<RoutingDecision>,
    pub input_mapping: Option<InputMappingReport>,
    pub node_details: Vec<NodeDetail>,
    pub edge_evaluations: Vec<EdgeEvaluationRecord>,
    pub port_adaptations: Vec<PortAdaptationRecord>,
    /// Full `ExecutionContext` snapshots taken immediately before and after
    /// each node's `process()` call, keyed `"before_<workflow_node_id>"` /
    /// `"after_<workflow_node_id>"` (spec.md §3/§8 invariants 2 and 3).
    pub context_snapshots: BTreeMap<String, BTreeMap<String, PortValue>>,
    pub metrics: RunMetrics,
    /// Set when the run failed outright (e.g. `UnsatisfiableInputs`,
    /// `NodeProcessingFailed` on a node whose failure was not recoverable by
    /// any downstream edge).
    pub failure: Option<String>,
}

impl OrchestrationReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            intent_detection: None,
            routing: None,
            input_mapping: None,
            node_details: Vec::new(),
            edge_evaluations: Vec::new(),
            port_adaptations: Vec::new(),
            context_snapshots: BTreeMap::new(),
            metrics: RunMetrics::default(),
            failure: None,
        }
    }

    /// Records a full context snapshot under `"before_<id>"` / `"after_<id>"`
    /// (§3 "Observability report", §8 invariants 2 and 3).
    pub fn record_context_snapshot(&mut self, key: impl Into<String>, ctx: &BTreeMap<String, PortValue>) {
        self.context_snapshots.insert(key.into(), ctx.clone());
    }

    /// Folds the intent-detection sub-report's token usage into the
    /// aggregate before attaching it (§6 "plus aggregate token usage").
    pub fn record_intent_detection(&mut self, report: IntentDetectionReport) {
        if let Some(usage) = &report.token_usage {
            self.metrics.total_token_usage.add(usage);
        }
        self.intent_detection = Some(report);
    }

    /// Folds the input-mapping sub-report's token usage into the aggregate
    /// before attaching it.
    pub fn record_input_mapping(&mut self, report: InputMappingReport) {
        if let Some(usage) = &report.token_usage {
            self.metrics.total_token_usage.add(usage);
        }
        self.input_mapping = Some(report);
    }

    pub fn record_node(&mut self, detail: NodeDetail) {
        match detail.outcome {
            NodeOutcome::Succeeded => self.metrics.total_nodes_executed += 1,
            NodeOutcome::Failed => self.metrics.total_nodes_failed += 1,
            NodeOutcome::Skipped => self.metrics.total_nodes_skipped += 1,
        }
        self.metrics.total_duration_ms += detail.duration_ms;
        if let Some(usage) = &detail.token_usage {
            self.metrics.total_token_usage.add(usage);
        }
        self.node_details.push(detail);
    }

    pub fn record_edge(&mut self, record: EdgeEvaluationRecord) {
        self.metrics.total_edges_evaluated += 1;
        self.edge_evaluations.push(record);
    }

    pub fn record_adaptation(&mut self, record: PortAdaptationRecord) {
        self.metrics.total_port_adaptations += 1;
        if let Some(usage) = &record.token_usage {
            self.metrics.total_token_usage.add(usage);
        }
        self.port_adaptations.push(record);
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_detail(outcome: NodeOutcome) -> NodeDetail {
        NodeDetail {
            workflow_node_id: "n1".into(),
            node_metamodel_id: Uuid::new_v4(),
            outcome,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            error: None,
            started_at: Utc::now(),
            duration_ms: 10,
            token_usage: Some(TokenUsage::new(5, 7)),
        }
    }

    #[test]
    fn record_node_updates_metrics_by_outcome() {
        let mut report = OrchestrationReport::new(Uuid::new_v4());
        report.record_node(sample_detail(NodeOutcome::Succeeded));
        report.record_node(sample_detail(NodeOutcome::Failed));
        report.record_node(sample_detail(NodeOutcome::Skipped));

        assert_eq!(report.metrics.total_nodes_executed, 1);
        assert_eq!(report.metrics.total_nodes_failed, 1);
        assert_eq!(report.metrics.total_nodes_skipped, 1);
        assert_eq!(report.metrics.total_duration_ms, 30);
        assert_eq!(report.metrics.total_token_usage.total_tokens, 36);
    }

    #[test]
    fn recording_sub_reports_aggregates_token_usage() {
        let mut report = OrchestrationReport::new(Uuid::new_v4());
        report.record_intent_detection(IntentDetectionReport {
            utterance: "book a flight".into(),
            intent_id: Uuid::new_v4(),
            intent_name: "BOOK_A_FLIGHT".into(),
            created_new_intent: false,
            user_variables: BTreeMap::new(),
            token_usage: Some(TokenUsage::new(10, 5)),
        });
        report.record_input_mapping(InputMappingReport {
            short_circuited: true,
            bindings: BTreeMap::new(),
            token_usage: Some(TokenUsage::new(2, 3)),
        });

        assert!(report.intent_detection.is_some());
        assert!(report.input_mapping.is_some());
        assert_eq!(report.metrics.total_token_usage.total_tokens, 20);
    }

    #[test]
    fn mark_failed_flips_is_success() {
        let mut report = OrchestrationReport::new(Uuid::new_v4());
        assert!(report.is_success());
        report.mark_failed("no workflow for intent");
        assert!(!report.is_success());
    }

    #[test]
    fn record_edge_and_adaptation_increment_counts() {
        let mut report = OrchestrationReport::new(Uuid::new_v4());
        report.record_edge(EdgeEvaluationRecord {
            edge_id: "e1".into(),
            source_node_id: "a".into(),
            target_node_id: "b".into(),
            satisfied: true,
            reason: "no condition".into(),
        });
        report.record_adaptation(PortAdaptationRecord {
            workflow_node_id: "b".into(),
            port_key: "prompt".into(),
            succeeded: true,
            adapted_value: Some(PortValue::from("hello")),
            persisted: false,
            reason: "derived from context".into(),
            token_usage: Some(TokenUsage::new(4, 6)),
        });
        assert_eq!(report.metrics.total_edges_evaluated, 1);
        assert_eq!(report.metrics.total_port_adaptations, 1);
        assert_eq!(report.metrics.total_token_usage.total_tokens, 10);
    }

    #[test]
    fn context_snapshots_are_recorded_by_key() {
        let mut report = OrchestrationReport::new(Uuid::new_v4());
        let mut ctx = BTreeMap::new();
        ctx.insert("inputA_1".to_string(), PortValue::from("x"));
        report.record_context_snapshot("before_A", &ctx);
        ctx.insert("outputA_1".to_string(), PortValue::from("x"));
        report.record_context_snapshot("after_A", &ctx);

        assert_eq!(report.context_snapshots.len(), 2);
        assert!(!report.context_snapshots["before_A"].contains_key("outputA_1"));
        assert!(report.context_snapshots["after_A"].contains_key("outputA_1"));
    }
}
