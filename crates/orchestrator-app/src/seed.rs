//! Loads a JSON seed file into the in-memory catalogs at process startup.
//!
//! The catalog layer's durable backing store is out of scope (spec §1/§6):
//! [`orchestrator_catalog::node_catalog::InMemoryNodeCatalog`] and its
//! siblings hold everything in memory for the life of the process. A CLI
//! invocation therefore needs a way to populate them before routing a
//! request, analogous to a migration/fixture-seed script. `create()` on
//! every catalog reassigns a fresh id, so nodes/intents referenced by a
//! workflow are declared inline within it rather than by a stable id the
//! seed file can't predict.

use orchestrator_catalog::intent_catalog::IntentCatalog;
use orchestrator_catalog::node_catalog::NodeCatalog;
use orchestrator_catalog::workflow_catalog::WorkflowCatalog;
use orchestrator_core::error::Result;
use orchestrator_core::metamodel::{
    ControlType, ExecutionType, HandledIntent, ModelType, NodeConfigPayload, NodeMetamodel, NodeType,
    ToolType, Version, WorkflowEdge, WorkflowMetamodel, WorkflowNode,
};
use orchestrator_core::ports::Port;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub workflows: Vec<SeedWorkflow>,
}

#[derive(Debug, Deserialize)]
pub struct SeedWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<SeedNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
    #[serde(default)]
    pub handled_intents: Vec<SeedHandledIntent>,
}

/// A node declared inline within a workflow. `workflow_node_id` is the
/// workflow-local id edges reference; `node_type`/`model_type`/etc. mirror
/// [`NodeMetamodel`] minus the fields the node catalog assigns on create
/// (`id`, `family_id`, `embedding`, timestamps).
#[derive(Debug, Deserialize)]
pub struct SeedNode {
    pub workflow_node_id: String,
    #[serde(default = "default_execution_type")]
    pub execution_type: ExecutionType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default)]
    pub qualitative_descriptor: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub model_type: Option<ModelType>,
    #[serde(default)]
    pub tool_type: Option<ToolType>,
    #[serde(default)]
    pub control_type: Option<ControlType>,
    #[serde(default)]
    pub input_ports: Vec<Port>,
    #[serde(default)]
    pub output_ports: Vec<Port>,
    pub config: NodeConfigPayload,
}

fn default_author() -> String {
    "seed".to_string()
}

fn default_execution_type() -> ExecutionType {
    ExecutionType::Default
}

#[derive(Debug, Deserialize)]
pub struct SeedHandledIntent {
    pub intent_name: String,
    #[serde(default)]
    pub intent_description: String,
    pub score: f64,
}

/// Loads `seed` into the three catalogs, returning the number of
/// workflows created.
pub async fn load(
    seed: SeedFile,
    node_catalog: &dyn NodeCatalog,
    workflow_catalog: &dyn WorkflowCatalog,
    intent_catalog: &dyn IntentCatalog,
) -> Result<usize> {
    let mut created = 0;
    for workflow in seed.workflows {
        let mut workflow_nodes = Vec::with_capacity(workflow.nodes.len());

        for seed_node in workflow.nodes {
            let now = chrono::Utc::now();
            let metamodel = NodeMetamodel {
                id: Uuid::nil(),
                family_id: Uuid::new_v4(),
                version: Version::new(1, 0, 0),
                is_latest: true,
                name: seed_node.name,
                description: seed_node.description,
                author: seed_node.author,
                qualitative_descriptor: seed_node.qualitative_descriptor,
                node_type: seed_node.node_type,
                model_type: seed_node.model_type,
                tool_type: seed_node.tool_type,
                control_type: seed_node.control_type,
                input_ports: seed_node.input_ports,
                output_ports: seed_node.output_ports,
                config: seed_node.config,
                embedding: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            let created_node = node_catalog.create(metamodel).await?;
            workflow_nodes.push(WorkflowNode {
                id: seed_node.workflow_node_id,
                node_metamodel_id: created_node.id,
                execution_type: seed_node.execution_type,
            });
        }

        let mut handled_intents = Vec::with_capacity(workflow.handled_intents.len());
        for handled in workflow.handled_intents {
            let intent = match intent_catalog.find_by_name(&handled.intent_name).await? {
                Some(existing) => existing,
                None => intent_catalog.create(handled.intent_name, handled.intent_description, false).await?,
            };
            handled_intents.push(HandledIntent { intent_id: intent.id, score: handled.score });
        }

        let metamodel = WorkflowMetamodel {
            id: Uuid::nil(),
            name: workflow.name,
            description: workflow.description,
            version: Version::new(1, 0, 0),
            enabled: true,
            created_at: chrono::Utc::now(),
            nodes: workflow_nodes,
            edges: workflow.edges,
            handled_intents,
        };
        workflow_catalog.create(metamodel).await?;
        created += 1;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use orchestrator_catalog::event_bus::EventBus;
    use orchestrator_catalog::intent_catalog::InMemoryIntentCatalog;
    use orchestrator_catalog::node_catalog::InMemoryNodeCatalog;
    use orchestrator_catalog::workflow_catalog::InMemoryWorkflowCatalog;
    use orchestrator_core::metamodel::HttpMethod;

    use super::*;

    fn sample_seed_json() -> &'static str {
        r#"{
            "workflows": [
                {
                    "name": "greeter",
                    "description": "says hello",
                    "nodes": [
                        {
                            "workflow_node_id": "greet",
                            "name": "greeter",
                            "node_type": "Ai",
                            "model_type": "Llm",
                            "input_ports": [],
                            "output_ports": [],
                            "config": {
                                "Llm": {
                                    "provider": "OpenAi",
                                    "model": "gpt-4",
                                    "system_prompt": "say hi",
                                    "parameters": {}
                                }
                            }
                        }
                    ],
                    "edges": [],
                    "handled_intents": [
                        { "intent_name": "greeting", "score": 0.9 }
                    ]
                }
            ]
        }"#
    }

    #[tokio::test]
    async fn load_parses_and_creates_one_workflow_with_its_node_and_intent() {
        let seed: SeedFile = serde_json::from_str(sample_seed_json()).unwrap();

        let events = EventBus::new();
        let node_catalog = InMemoryNodeCatalog::new(events.clone());
        let intent_catalog = InMemoryIntentCatalog::new();
        let workflow_catalog = InMemoryWorkflowCatalog::new(events, &node_catalog);

        let created = load(seed, &node_catalog, &workflow_catalog, &intent_catalog).await.unwrap();
        assert_eq!(created, 1);

        let nodes = node_catalog.find_all().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "greeter");

        let workflows = workflow_catalog.find_all().await.unwrap();
        assert_eq!(workflows.len(), 1);
        let workflow = &workflows[0];
        assert_eq!(workflow.nodes.len(), 1);
        assert_eq!(workflow.nodes[0].id, "greet");
        assert_eq!(workflow.nodes[0].node_metamodel_id, nodes[0].id);
        assert_eq!(workflow.handled_intents.len(), 1);

        let intent = intent_catalog.find_by_name("greeting").await.unwrap().unwrap();
        assert_eq!(workflow.handled_intents[0].intent_id, intent.id);
        assert_eq!(workflow.handled_intents[0].score, 0.9);
    }

    #[tokio::test]
    async fn load_reuses_an_existing_intent_by_name_instead_of_duplicating_it() {
        let events = EventBus::new();
        let node_catalog = InMemoryNodeCatalog::new(events.clone());
        let intent_catalog = InMemoryIntentCatalog::new();
        let workflow_catalog = InMemoryWorkflowCatalog::new(events, &node_catalog);

        let existing = intent_catalog.create("greeting".to_string(), "pre-existing".to_string(), false).await.unwrap();

        let seed: SeedFile = serde_json::from_str(sample_seed_json()).unwrap();
        load(seed, &node_catalog, &workflow_catalog, &intent_catalog).await.unwrap();

        assert_eq!(intent_catalog.find_all().await.unwrap().len(), 1);
        let workflows = workflow_catalog.find_all().await.unwrap();
        assert_eq!(workflows[0].handled_intents[0].intent_id, existing.id);
    }

    #[test]
    fn seed_node_defaults_author_and_execution_type_when_omitted() {
        let node: SeedNode = serde_json::from_str(
            r#"{
                "workflow_node_id": "n1",
                "name": "tool",
                "node_type": "Tool",
                "tool_type": "Rest",
                "config": { "Rest": { "uri": "https://example.com", "method": "Get", "headers": {} } }
            }"#,
        )
        .unwrap();

        assert_eq!(node.author, "seed");
        assert_eq!(node.execution_type, ExecutionType::Default);
        assert!(matches!(
            node.config,
            NodeConfigPayload::Rest { method: HttpMethod::Get, .. }
        ));
    }
}
