//! Fixture builders and no-op collaborators for this crate's own unit tests,
//! in the style of `orchestrator_catalog::testing`. Kept local since
//! `#[cfg(test)]` items don't cross a crate boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::error::Result;
use orchestrator_core::metamodel::{
    ControlType, ExecutionType, HandledIntent, ModelProvider, ModelType, NodeConfigPayload,
    NodeMetamodel, NodeType, ToolType, Version, WorkflowEdge, WorkflowMetamodel, WorkflowNode,
};
use orchestrator_core::ports::{Port, PortRole, PortSchema, PortSchemaKind, PortValue};
use uuid::Uuid;

use crate::factory::NodeFactory;
use crate::instance::{RestCaller, RestResponse, VectorSearcher};
use crate::llm_client::MockLlmClient;

pub fn llm_node_metamodel(name: &str) -> NodeMetamodel {
    let now = Utc::now();
    NodeMetamodel {
        id: Uuid::new_v4(),
        family_id: Uuid::new_v4(),
        version: Version::new(1, 0, 0),
        is_latest: true,
        name: name.to_string(),
        description: format!("fixture node {name}"),
        author: "fixtures".to_string(),
        qualitative_descriptor: "fast".to_string(),
        node_type: NodeType::Ai,
        model_type: Some(ModelType::Llm),
        tool_type: None,
        control_type: None,
        input_ports: vec![Port::new("prompt", PortSchema::new(PortSchemaKind::String, true), PortRole::UserPrompt)],
        output_ports: vec![Port::new(
            "response",
            PortSchema::new(PortSchemaKind::String, true),
            PortRole::Response,
        )],
        config: NodeConfigPayload::Llm {
            provider: ModelProvider::OpenAi,
            model: "gpt-4".to_string(),
            system_prompt: "fixture".to_string(),
            parameters: BTreeMap::new(),
        },
        embedding: vec![0.1, 0.2, 0.3],
        created_at: now,
        updated_at: now,
    }
}

pub fn gateway_node_metamodel(name: &str) -> NodeMetamodel {
    let mut node = llm_node_metamodel(name);
    node.node_type = NodeType::Flow;
    node.model_type = None;
    node.control_type = Some(ControlType::Gateway);
    node.config = NodeConfigPayload::Gateway;
    node.input_ports.clear();
    node.output_ports.clear();
    node
}

pub fn rest_node_metamodel(name: &str) -> NodeMetamodel {
    let mut node = llm_node_metamodel(name);
    node.node_type = NodeType::Tool;
    node.model_type = None;
    node.tool_type = Some(ToolType::Rest);
    node.config = NodeConfigPayload::Rest {
        uri: "https://example.invalid".to_string(),
        method: orchestrator_core::metamodel::HttpMethod::Get,
        headers: BTreeMap::new(),
    };
    node
}

pub fn linear_workflow_metamodel(
    start: &NodeMetamodel,
    end: &NodeMetamodel,
    handled_intent: Uuid,
    score: f64,
) -> WorkflowMetamodel {
    WorkflowMetamodel {
        id: Uuid::new_v4(),
        name: "fixture-workflow".to_string(),
        description: String::new(),
        version: Version::new(1, 0, 0),
        enabled: true,
        created_at: Utc::now(),
        nodes: vec![
            WorkflowNode { id: "start".to_string(), node_metamodel_id: start.id, execution_type: ExecutionType::Default },
            WorkflowNode { id: "end".to_string(), node_metamodel_id: end.id, execution_type: ExecutionType::Default },
        ],
        edges: vec![WorkflowEdge {
            id: "start-end".to_string(),
            source_node_id: "start".to_string(),
            target_node_id: "end".to_string(),
            condition: None,
            bindings: BTreeMap::new(),
        }],
        handled_intents: vec![HandledIntent { intent_id: handled_intent, score }],
    }
}

pub struct NoopRestCaller;

#[async_trait]
impl RestCaller for NoopRestCaller {
    async fn call(&self, _ctx: &orchestrator_core::context::ExecutionContext) -> Result<RestResponse> {
        Ok(RestResponse { status: 200, body: PortValue::Null })
    }
}

pub struct NoopVectorSearcher;

#[async_trait]
impl VectorSearcher for NoopVectorSearcher {
    async fn search(&self, _vector: &[f32]) -> Result<Vec<PortValue>> {
        Ok(vec![])
    }
}

pub fn noop_factory() -> Arc<NodeFactory> {
    Arc::new(NodeFactory::new(Arc::new(MockLlmClient::new()), Arc::new(NoopRestCaller), Arc::new(NoopVectorSearcher)))
}
