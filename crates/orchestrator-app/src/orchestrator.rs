//! The composition root's top-level facade: wires intent detection, routing,
//! input mapping, and workflow execution into the single
//! `orchestrate(request)` entry point that is the system's one externally
//! visible operation (§1).

use std::collections::BTreeMap;
use std::sync::Arc;

use orchestrator_catalog::event_bus::EventBus;
use orchestrator_catalog::intent_catalog::InMemoryIntentCatalog;
use orchestrator_catalog::node_catalog::InMemoryNodeCatalog;
use orchestrator_catalog::workflow_catalog::InMemoryWorkflowCatalog;
use orchestrator_core::config::OrchestratorConfig;
use orchestrator_core::context::ExecutionContext;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::observability::{IntentDetectionReport, InputMappingReport, OrchestrationReport};
use orchestrator_core::ports::PortValue;
use orchestrator_engine::factory::NodeFactory;
use orchestrator_engine::input_mapper::{InputMapper, RequiredPort};
use orchestrator_engine::instance::{RestCaller, VectorSearcher};
use orchestrator_engine::intent_detector::IntentDetector;
use orchestrator_engine::llm_client::LlmClient;
use orchestrator_engine::pool::{NodeInstancePool, WorkflowInstancePool};
use orchestrator_engine::routing::{Router, SamplingConfig};
use orchestrator_engine::executor::WorkflowExecutor;

/// Owns the process-lifetime catalogs, instance pools, and collaborators.
/// The catalogs are leaked deliberately (see [`WorkflowOrchestrator::bootstrap`]):
/// there is one of these per process and it lives until the process exits,
/// the same lifetime a global logger or connection pool gets in a typical
/// composition root.
pub struct WorkflowOrchestrator {
    llm: Arc<dyn LlmClient>,
    node_catalog: &'static InMemoryNodeCatalog,
    workflow_catalog: &'static InMemoryWorkflowCatalog<'static>,
    intent_catalog: &'static InMemoryIntentCatalog,
    node_pool: Arc<NodeInstancePool>,
    workflow_pool: Arc<WorkflowInstancePool>,
    config: OrchestratorConfig,
}

impl WorkflowOrchestrator {
    /// Boots the event bus, catalogs, and instance pools, and binds them to
    /// the supplied out-of-scope collaborators (§1: LLM bridge, REST caller,
    /// vector searcher). Must be called from within a Tokio runtime.
    pub fn bootstrap(
        config: OrchestratorConfig,
        llm: Arc<dyn LlmClient>,
        rest_caller: Arc<dyn RestCaller>,
        vector_searcher: Arc<dyn VectorSearcher>,
    ) -> Self {
        let events = EventBus::new();

        let node_catalog: &'static InMemoryNodeCatalog =
            Box::leak(Box::new(InMemoryNodeCatalog::new(events.clone())));
        let intent_catalog: &'static InMemoryIntentCatalog =
            Box::leak(Box::new(InMemoryIntentCatalog::new()));
        let workflow_catalog: &'static InMemoryWorkflowCatalog<'static> =
            Box::leak(Box::new(InMemoryWorkflowCatalog::new(events.clone(), node_catalog)));

        let factory = Arc::new(NodeFactory::new(llm.clone(), rest_caller, vector_searcher));
        let node_pool = NodeInstancePool::new(factory, &events);
        let workflow_pool = WorkflowInstancePool::new(node_pool.clone(), &events);

        Self { llm, node_catalog, workflow_catalog, intent_catalog, node_pool, workflow_pool, config }
    }

    pub fn node_catalog(&self) -> &'static InMemoryNodeCatalog {
        self.node_catalog
    }

    pub fn workflow_catalog(&self) -> &'static InMemoryWorkflowCatalog<'static> {
        self.workflow_catalog
    }

    pub fn intent_catalog(&self) -> &'static InMemoryIntentCatalog {
        self.intent_catalog
    }

    /// `orchestrate(request)` (§1, §5): detect the intent, route to a
    /// workflow, map inputs, execute, and return both the final context's
    /// output and the full observability trace. Bounded by
    /// `request_time_budget_seconds` (§5).
    pub async fn orchestrate(&self, request: &str) -> Result<(BTreeMap<String, PortValue>, OrchestrationReport)> {
        let budget = self.config.request_time_budget();
        match tokio::time::timeout(budget, self.orchestrate_inner(request)).await {
            Ok(result) => result,
            Err(_) => Err(OrchestratorError::Timeout {
                operation: "orchestrate".to_string(),
                elapsed_ms: budget.as_millis() as u64,
            }),
        }
    }

    async fn orchestrate_inner(
        &self,
        request: &str,
    ) -> Result<(BTreeMap<String, PortValue>, OrchestrationReport)> {
        let mut report = OrchestrationReport::new(uuid::Uuid::new_v4());

        let detector = IntentDetector::new(self.llm.as_ref(), self.intent_catalog);
        let detected = match detector.detect(request).await {
            Ok(detected) => detected,
            Err(err) => {
                report.mark_failed(err.to_string());
                return Err(err);
            }
        };
        report.record_intent_detection(IntentDetectionReport {
            utterance: request.to_string(),
            intent_id: detected.intent_id,
            intent_name: detected.intent_name.clone(),
            created_new_intent: detected.created_new_intent,
            user_variables: detected.user_variables.clone(),
            token_usage: Some(detected.token_usage),
        });

        let router = Router::new(
            &self.workflow_pool,
            self.workflow_catalog,
            self.node_catalog,
            SamplingConfig { temperature: self.config.routing.temperature, top_n: self.config.routing.top_n },
        );
        let routed = match router.route(detected.intent_id, Some(detected.intent_name.clone())).await {
            Ok(routed) => routed,
            Err(err) => {
                report.mark_failed(err.to_string());
                return Err(err);
            }
        };
        report.routing = Some(routed.decision);

        let instance = self.workflow_pool.get_or_create(&routed.metamodel, self.node_catalog).await?;
        let instance = instance.read().await;

        // Read each entry node's metamodel from the catalog directly
        // (cheaper than locking every node instance) to build the required
        // input ports `InputMapper` must satisfy before a run starts.
        let mut entry_node_metamodels = Vec::new();
        for entry_node in routed.metamodel.entry_nodes() {
            if let Some(node_metamodel) = self.node_catalog.find_by_id(entry_node.node_metamodel_id).await? {
                entry_node_metamodels.push((entry_node.id.clone(), node_metamodel));
            }
        }

        // Port paths are the flat port key, not prefixed by workflow-node id:
        // the executor addresses every port that way (§4.1/§4.4), so the
        // bindings this produces must land where `WorkflowExecutor` looks.
        let mut required_ports = Vec::new();
        for (_workflow_node_id, node_metamodel) in &entry_node_metamodels {
            for port in &node_metamodel.input_ports {
                if port.schema.required {
                    required_ports.push(RequiredPort {
                        port_path: port.key.clone(),
                        node: node_metamodel,
                        port_key: port.key.clone(),
                    });
                }
            }
        }

        let mapper = InputMapper::new(self.llm.as_ref());
        let outcome = match mapper.map_inputs(&detected.user_variables, request, &required_ports).await {
            Ok(outcome) => outcome,
            Err(err) => {
                report.mark_failed(err.to_string());
                return Err(err);
            }
        };
        report.record_input_mapping(InputMappingReport {
            short_circuited: outcome.short_circuited,
            bindings: outcome.bindings.clone(),
            token_usage: outcome.token_usage,
        });

        let mut ctx = ExecutionContext::from_map(outcome.bindings);

        let executor = WorkflowExecutor::new(self.llm.as_ref(), self.workflow_catalog, &self.node_pool);
        let exec_report = executor.execute(&instance, &mut ctx).await?;

        report.node_details = exec_report.node_details;
        report.edge_evaluations = exec_report.edge_evaluations;
        report.port_adaptations = exec_report.port_adaptations;
        report.metrics.total_nodes_executed = exec_report.metrics.total_nodes_executed;
        report.metrics.total_nodes_failed = exec_report.metrics.total_nodes_failed;
        report.metrics.total_nodes_skipped = exec_report.metrics.total_nodes_skipped;
        report.metrics.total_edges_evaluated = exec_report.metrics.total_edges_evaluated;
        report.metrics.total_port_adaptations = exec_report.metrics.total_port_adaptations;
        report.metrics.total_duration_ms += exec_report.metrics.total_duration_ms;
        report.metrics.total_token_usage.add(&exec_report.metrics.total_token_usage);
        report.failure = exec_report.failure;

        Ok((ctx.into_map(), report))
    }
}
