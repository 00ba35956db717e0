//! Fixture builders for this crate's own unit tests, in the style of a
//! per-crate `testing::fixtures` module. Kept local (rather than reused from
//! `orchestrator_core::testing`) because `#[cfg(test)]` items don't cross a
//! crate boundary.

use std::collections::BTreeMap;

use chrono::Utc;
use orchestrator_core::metamodel::{
    ExecutionType, HandledIntent, IntentMetamodel, ModelProvider, ModelType, NodeConfigPayload,
    NodeMetamodel, NodeType, Version, WorkflowEdge, WorkflowMetamodel, WorkflowNode,
};
use orchestrator_core::ports::{Port, PortRole, PortSchema, PortSchemaKind};
use uuid::Uuid;

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
        input_ports: vec![Port::new(
            "prompt",
            PortSchema::new(PortSchemaKind::String, true),
            PortRole::UserPrompt,
        )],
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

pub fn intent_metamodel(name: &str) -> IntentMetamodel {
    IntentMetamodel {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("fixture intent {name}"),
        embedding: vec![0.1, 0.2, 0.3],
        ai_generated: false,
        created_at: Utc::now(),
    }
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
            WorkflowNode {
                id: "start".to_string(),
                node_metamodel_id: start.id,
                execution_type: ExecutionType::Default,
            },
            WorkflowNode {
                id: "end".to_string(),
                node_metamodel_id: end.id,
                execution_type: ExecutionType::Default,
            },
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
