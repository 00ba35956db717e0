//! Fixture builders for `orchestrator-core`'s own unit tests. Downstream
//! crates (`orchestrator-catalog`, `orchestrator-engine`) keep their own
//! `testing` modules in the same style rather than depending on this one,
//! since `#[cfg(test)]` items don't cross a crate boundary.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::metamodel::{
    ExecutionType, ModelProvider, NodeConfigPayload, NodeMetamodel, NodeType, Version,
    WorkflowEdge, WorkflowMetamodel, WorkflowNode,
};
use crate::ports::{Port, PortRole, PortSchema, PortSchemaKind};

/// A minimal single-input/single-output LLM node, version 1.0.0, latest.
pub fn llm_node_metamodel(name: &str) -> NodeMetamodel {
    let now = Utc::now();
    NodeMetamodel {
        id: Uuid::new_v4(),
        family_id: Uuid::new_v4(),
        version: Version::new(1, 0, 0),
        is_latest: true,
        name: name.to_string(),
        description: format!("test fixture node {name}"),
        author: "fixtures".to_string(),
        qualitative_descriptor: "fast".to_string(),
        node_type: NodeType::Ai,
        model_type: Some(crate::metamodel::ModelType::Llm),
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
            system_prompt: "You are a test fixture.".to_string(),
            parameters: BTreeMap::new(),
        },
        embedding: vec![0.0; 8],
        created_at: now,
        updated_at: now,
    }
}

/// A two-node linear workflow `start -> end` with no edge condition,
/// matching the implicit-binding scenario.
pub fn linear_workflow_metamodel(start: &NodeMetamodel, end: &NodeMetamodel) -> WorkflowMetamodel {
    WorkflowMetamodel {
        id: Uuid::new_v4(),
        name: "linear-test-workflow".to_string(),
        description: "two-node linear fixture workflow".to_string(),
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
        handled_intents: vec![],
    }
}

/// An `ExecutionContext` seeded with a single top-level string value.
pub fn context_with(key: &str, value: &str) -> ExecutionContext {
    let mut ctx = ExecutionContext::new();
    ctx.put(key, value.into());
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_workflow_fixture_has_one_edge() {
        let start = llm_node_metamodel("start");
        let end = llm_node_metamodel("end");
        let wf = linear_workflow_metamodel(&start, &end);
        assert_eq!(wf.edges.len(), 1);
        assert_eq!(wf.nodes.len(), 2);
    }

    #[test]
    fn context_with_seeds_single_key() {
        let ctx = context_with("input.text", "hello");
        assert_eq!(ctx.get("input.text").unwrap().as_str(), Some("hello"));
    }
}
