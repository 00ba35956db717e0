//! # WorkflowExecutor (§4.4–§4.7)
//!
//! Runs a single [`WorkflowInstance`] to completion over a seeded
//! [`ExecutionContext`], producing an [`OrchestrationReport`]. Follows a
//! `workflow::executor` sequential-node-loop shape (one worker per run, FIFO
//! readiness queue), generalized with MERGE/JOIN readiness and run-time port
//! adaptation (§4.5).

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use orchestrator_catalog::workflow_catalog::WorkflowCatalog;
use orchestrator_core::ai::tokens::TokenUsage;
use orchestrator_core::context::ExecutionContext;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::metamodel::ExecutionType;
use orchestrator_core::observability::{EdgeEvaluationRecord, NodeDetail, NodeOutcome, OrchestrationReport, PortAdaptationRecord};
use orchestrator_core::ports::Port;
use uuid::Uuid;

use crate::condition;
use crate::instance::WorkflowInstance;
use crate::llm_client::LlmClient;
use crate::pool::NodeInstancePool;
use crate::port_adapter::{PortAdaptationOutcome, PortAdapter};

/// Per-node bookkeeping the main loop tracks alongside the metamodel's
/// static edge graph (§4.4 "State").
struct NodeState {
    total_incoming: usize,
    satisfied_incoming: usize,
    queued: bool,
    processed: bool,
}

pub struct WorkflowExecutor<'a> {
    llm: &'a dyn LlmClient,
    workflow_catalog: &'a dyn WorkflowCatalog,
    node_pool: &'a NodeInstancePool,
}

impl<'a> WorkflowExecutor<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        workflow_catalog: &'a dyn WorkflowCatalog,
        node_pool: &'a NodeInstancePool,
    ) -> Self {
        Self { llm, workflow_catalog, node_pool }
    }

    /// Runs `instance` to completion over `ctx`, mutating it in place and
    /// returning the assembled [`OrchestrationReport`].
    pub async fn execute(
        &self,
        instance: &WorkflowInstance,
        ctx: &mut ExecutionContext,
    ) -> Result<OrchestrationReport> {
        let mut report = OrchestrationReport::new(Uuid::new_v4());

        if !instance.metamodel.enabled {
            let err = OrchestratorError::WorkflowDisabled { workflow_id: instance.metamodel.id };
            report.mark_failed(err.to_string());
            return Err(err);
        }

        let mut states: HashMap<&str, NodeState> = HashMap::new();
        for node in &instance.metamodel.nodes {
            let total_incoming = instance.metamodel.incoming_edges(&node.id).len();
            states.insert(
                node.id.as_str(),
                NodeState { total_incoming, satisfied_incoming: 0, queued: false, processed: false },
            );
        }

        let mut queue: VecDeque<&str> = VecDeque::new();
        for node in &instance.metamodel.nodes {
            if let Some(state) = states.get_mut(node.id.as_str()) {
                if state.total_incoming == 0 {
                    state.queued = true;
                    queue.push_back(node.id.as_str());
                }
            }
        }

        let mut any_failed = false;

        while let Some(current_id) = queue.pop_front() {
            if states.get(current_id).map(|s| s.processed).unwrap_or(true) {
                continue;
            }

            let Some(workflow_node) = instance.metamodel.node(current_id) else { continue };
            let Some(node_instance) = instance.node_instances.get(&workflow_node.node_metamodel_id) else {
                continue;
            };

            // Prepare inputs: write declared defaults for absent input ports.
            {
                let guard = node_instance.read().await;
                for port in &guard.metamodel.input_ports {
                    if !ctx.contains_key(&port.key) {
                        if let Some(default) = &port.default {
                            ctx.put(&port.key, default.deep_copy());
                        }
                    }
                }
            }

            // Ensure required inputs satisfied (§4.5).
            if let Err(err) = self.ensure_required_inputs(instance, current_id, ctx, &mut report).await {
                report.mark_failed(err.to_string());
                return Err(err);
            }

            let inputs_snapshot: BTreeMap<_, _> = {
                let guard = node_instance.read().await;
                guard
                    .metamodel
                    .input_ports
                    .iter()
                    .filter_map(|p| ctx.get(&p.key).map(|v| (p.key.clone(), v.deep_copy())))
                    .collect()
            };

            let mut detail = NodeDetail {
                workflow_node_id: current_id.to_string(),
                node_metamodel_id: node_instance.read().await.metamodel.id,
                outcome: NodeOutcome::Failed,
                inputs: inputs_snapshot,
                outputs: BTreeMap::new(),
                error: None,
                started_at: Utc::now(),
                duration_ms: 0,
                token_usage: None,
            };

            // Full before/after context snapshots for this node (§3, §8
            // invariants 2 and 3), bracketing markRunning/markFinished, which
            // pair the pool's execution reference counter (§4.3/§4.4 step 5)
            // acquire/release on every path through this block.
            report.record_context_snapshot(format!("before_{current_id}"), ctx.as_map());

            let node_instance_id = node_instance.read().await.id;
            self.node_pool.mark_running(node_instance_id);
            let node_failed = {
                let guard = node_instance.read().await;
                guard.process(ctx, &mut detail).await.is_err()
            };
            self.node_pool.mark_finished(node_instance_id);

            report.record_context_snapshot(format!("after_{current_id}"), ctx.as_map());

            // Apply default outputs (§4.4 step 7), then snapshot outputs.
            {
                let guard = node_instance.read().await;
                for out_port in &guard.metamodel.output_ports {
                    if !ctx.contains_key(&out_port.key) {
                        if let Some(default) = &out_port.default {
                            ctx.put(&out_port.key, default.deep_copy());
                        }
                    }
                    if let Some(value) = ctx.get(&out_port.key) {
                        detail.outputs.insert(out_port.key.clone(), value.deep_copy());
                    }
                }
            }

            if node_failed {
                any_failed = true;
            }

            report.record_node(detail);
            if let Some(state) = states.get_mut(current_id) {
                state.processed = true;
            }

            for edge in instance.metamodel.outgoing_edges(current_id) {
                let satisfied = match condition::evaluate(edge.condition.as_ref(), ctx) {
                    Ok(v) => v,
                    Err(e) => {
                        report.record_edge(EdgeEvaluationRecord {
                            edge_id: edge.id.clone(),
                            source_node_id: edge.source_node_id.clone(),
                            target_node_id: edge.target_node_id.clone(),
                            satisfied: false,
                            reason: format!("condition evaluation error: {e}"),
                        });
                        continue;
                    }
                };

                if !satisfied {
                    report.record_edge(EdgeEvaluationRecord {
                        edge_id: edge.id.clone(),
                        source_node_id: edge.source_node_id.clone(),
                        target_node_id: edge.target_node_id.clone(),
                        satisfied: false,
                        reason: "condition evaluated false".to_string(),
                    });
                    continue;
                }

                apply_bindings(edge, instance, ctx);
                report.record_edge(EdgeEvaluationRecord {
                    edge_id: edge.id.clone(),
                    source_node_id: edge.source_node_id.clone(),
                    target_node_id: edge.target_node_id.clone(),
                    satisfied: true,
                    reason: edge.condition.as_ref().map(|_| "condition evaluated true".to_string()).unwrap_or_else(|| "no condition, always satisfied".to_string()),
                });

                let Some(target_node) = instance.metamodel.node(&edge.target_node_id) else { continue };
                let target_id: &str = target_node.id.as_str();
                let ready = if let Some(state) = states.get_mut(target_id) {
                    state.satisfied_incoming += 1;
                    match target_node.execution_type {
                        ExecutionType::Merge => state.satisfied_incoming >= 1,
                        ExecutionType::Default => state.satisfied_incoming >= state.total_incoming,
                    }
                } else {
                    false
                };

                if ready {
                    if let Some(state) = states.get_mut(target_id) {
                        if !state.queued && !state.processed {
                            state.queued = true;
                            queue.push_back(target_id);
                        }
                    }
                }
            }
        }

        if any_failed {
            report.mark_failed("one or more nodes failed during execution");
        }
        Ok(report)
    }

    /// Port adaptation (§4.5). Invoked when a node's required inputs are not
    /// all present after default application.
    async fn ensure_required_inputs(
        &self,
        instance: &WorkflowInstance,
        current_id: &str,
        ctx: &mut ExecutionContext,
        report: &mut OrchestrationReport,
    ) -> Result<()> {
        let Some(workflow_node) = instance.metamodel.node(current_id) else { return Ok(()) };
        let Some(node_instance) = instance.node_instances.get(&workflow_node.node_metamodel_id) else {
            return Ok(());
        };

        let missing: Vec<Port> = {
            let guard = node_instance.read().await;
            guard
                .metamodel
                .required_input_ports()
                .filter(|p| !ctx.contains_key(&p.key))
                .cloned()
                .collect()
        };

        if missing.is_empty() {
            return Ok(());
        }

        // Collect source (output) ports from all incoming edges' source
        // nodes, keeping the edge that owns each output key (last wins).
        let mut source_ports: Vec<Port> = Vec::new();
        let mut owning_edge: HashMap<String, String> = HashMap::new();
        for edge in instance.metamodel.incoming_edges(current_id) {
            let Some(source_node) = instance.metamodel.node(&edge.source_node_id) else { continue };
            let Some(source_instance) = instance.node_instances.get(&source_node.node_metamodel_id) else { continue };
            let guard = source_instance.read().await;
            for port in &guard.metamodel.output_ports {
                if owning_edge.contains_key(&port.key) {
                    tracing::warn!(port = %port.key, "duplicate output port across incoming edges; last edge wins");
                }
                owning_edge.insert(port.key.clone(), edge.id.clone());
                source_ports.push(port.clone());
            }
        }

        let node_metamodel_id = node_instance.read().await.metamodel.id;

        if source_ports.is_empty() {
            return Err(OrchestratorError::UnsatisfiableInputs {
                node_id: node_metamodel_id,
                missing_keys: missing.iter().map(|p| p.key.clone()).collect(),
            });
        }

        let adapter = PortAdapter::new(self.llm);
        let outcome = adapter
            .adapt(&source_ports, &missing)
            .await
            .unwrap_or(PortAdaptationOutcome { bindings: BTreeMap::new(), token_usage: TokenUsage::default() });
        let bindings = outcome.bindings;
        let token_usage = outcome.token_usage;

        // The adapter's token usage describes the single LLM call that
        // produced `bindings`, not any one binding; attribute it to the
        // first resulting record so it is folded into the run's aggregate
        // exactly once (§6 "the bridge MUST return token usage").
        let mut usage_recorded = false;
        let mut learned_by_edge: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        for (source_path, target_path) in &bindings {
            let relevant = missing.iter().any(|p| {
                target_path == &p.key || target_path.starts_with(&format!("{}.", p.key)) || p.key.starts_with(&format!("{target_path}."))
            });
            if !relevant {
                continue;
            }
            if let Some(value) = ctx.get(source_path).map(|v| v.deep_copy()) {
                ctx.put(target_path, value.clone());
                if let Some(edge_id) = owning_edge.get(source_path) {
                    learned_by_edge.entry(edge_id.clone()).or_default().insert(source_path.clone(), target_path.clone());
                }
                report.record_adaptation(PortAdaptationRecord {
                    workflow_node_id: current_id.to_string(),
                    port_key: target_path.clone(),
                    succeeded: true,
                    adapted_value: Some(value),
                    persisted: false,
                    reason: format!("adapted from '{source_path}'"),
                    token_usage: if usage_recorded { None } else { Some(token_usage) },
                });
                usage_recorded = true;
            }
        }

        let still_missing: Vec<&Port> = missing.iter().filter(|p| !ctx.contains_key(&p.key)).collect();
        if !still_missing.is_empty() {
            let missing_keys: Vec<String> = still_missing.iter().map(|p| p.key.clone()).collect();
            report.record_adaptation(PortAdaptationRecord {
                workflow_node_id: current_id.to_string(),
                port_key: missing_keys.join(", "),
                succeeded: false,
                adapted_value: None,
                persisted: false,
                reason: "adapter could not supply all required inputs".to_string(),
                token_usage: if usage_recorded { None } else { Some(token_usage) },
            });
            return Err(OrchestratorError::UnsatisfiableInputs {
                node_id: node_metamodel_id,
                missing_keys,
            });
        }

        if !learned_by_edge.is_empty() {
            let mut persisted_bindings = BTreeMap::new();
            for (edge_id, pairs) in &learned_by_edge {
                if let Some(edge) = instance.metamodel.edges.iter().find(|e| &e.id == edge_id) {
                    let mut merged = edge.bindings.clone();
                    merged.extend(pairs.clone());
                    persisted_bindings.insert(edge_id.clone(), merged);
                }
            }
            if let Err(e) = self
                .workflow_catalog
                .update_multiple_edge_bindings(instance.metamodel.id, persisted_bindings)
                .await
            {
                tracing::warn!(error = %e, "failed to persist learned port-adaptation bindings");
            } else {
                for record in report.port_adaptations.iter_mut().rev().take(learned_by_edge.values().map(|m| m.len()).sum()) {
                    record.persisted = true;
                }
            }
        }

        Ok(())
    }
}

/// Edge binding application (§4.7).
fn apply_bindings(edge: &orchestrator_core::metamodel::WorkflowEdge, instance: &WorkflowInstance, ctx: &mut ExecutionContext) {
    for (source_path, target_path) in &edge.bindings {
        if let Some(value) = ctx.get(source_path).map(|v| v.deep_copy()) {
            ctx.put(target_path, value);
            continue;
        }

        let root_key = target_path.split('.').next().unwrap_or(target_path);
        let Some(target_node) = instance.metamodel.node(&edge.target_node_id) else { continue };
        let Some(node_instance) = instance.node_instances.get(&target_node.node_metamodel_id) else { continue };

        let default = read_input_port_default_sync(node_instance, root_key);
        if let Some(default) = default {
            // Deliberate, documented limitation (§4.7): the root port's
            // default is applied to the full nested path, not just the root.
            ctx.put(target_path, default);
        } else {
            tracing::debug!(source_path, target_path, "edge binding source absent and no default; skipping");
        }
    }
}

/// Reads a node instance's matching input port default without requiring
/// this helper to be async (the metamodel is behind an `Arc` snapshot that
/// does not change mid-process, so a blocking try-read is safe here since
/// this runs synchronously within `apply_bindings`).
fn read_input_port_default_sync(
    node_instance: &Arc<tokio::sync::RwLock<crate::instance::NodeInstance>>,
    root_key: &str,
) -> Option<orchestrator_core::ports::PortValue> {
    node_instance
        .try_read()
        .ok()
        .and_then(|guard| guard.metamodel.input_port(root_key).and_then(|p| p.default.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockLlmClient;
    use crate::pool::{NodeInstancePool, WorkflowInstancePool};
    use crate::testing::{linear_workflow_metamodel, llm_node_metamodel, noop_factory};
    use orchestrator_catalog::event_bus::EventBus;
    use orchestrator_catalog::node_catalog::InMemoryNodeCatalog;
    use orchestrator_catalog::workflow_catalog::InMemoryWorkflowCatalog;
    use orchestrator_core::ports::PortValue;

    #[tokio::test]
    async fn linear_workflow_propagates_output_to_next_input() {
        let events = EventBus::new();
        let node_catalog = InMemoryNodeCatalog::new(events.clone());

        let mut start = llm_node_metamodel("start");
        start.output_ports[0].key = "response".to_string();
        let start = node_catalog.create(start).await.unwrap();

        let mut end = llm_node_metamodel("end");
        end.input_ports[0].key = "prompt".to_string();
        let end = node_catalog.create(end).await.unwrap();

        let mut wf = linear_workflow_metamodel(&start, &end, Uuid::new_v4(), 1.0);
        wf.edges[0].bindings.insert("response".to_string(), "prompt".to_string());
        let workflow_catalog = InMemoryWorkflowCatalog::new(events.clone(), &node_catalog);
        let wf = workflow_catalog.create(wf).await.unwrap();

        let node_pool = NodeInstancePool::new(noop_factory(), &events);
        let workflow_pool = WorkflowInstancePool::new(node_pool.clone(), &events);
        let instance_lock = workflow_pool.get_or_create(&wf, &node_catalog).await.unwrap();
        let instance = instance_lock.read().await;

        let mut llm = MockLlmClient::new();
        llm.expect_complete().returning(|_| Ok("hello".to_string()));
        let executor = WorkflowExecutor::new(&llm, &workflow_catalog, &node_pool);

        let mut ctx = ExecutionContext::new();
        ctx.put("prompt", PortValue::String("hi".to_string()));
        let report = executor.execute(&instance, &mut ctx).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.metrics.total_nodes_executed, 2);
        assert_eq!(ctx.get("prompt").and_then(|v| v.as_str()), Some("hello"));
    }
}
