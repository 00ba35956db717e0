//! # NodeFactory
//!
//! Constructs a [`NodeBehavior`] from a [`NodeMetamodel`], dispatching on its
//! `type`/`modelType`/`toolType`/`controlType` discriminators (§9
//! "Polymorphism over node families"). Follows a `nodes::agent::AgentNode`
//! construction path (provider-specific model instance behind one trait),
//! generalized to the full node-family lattice.

use std::sync::Arc;

use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::metamodel::{ModelType, NodeMetamodel, NodeType, ToolType};

use crate::instance::{EmbeddingsNode, GatewayNode, LlmNode, NodeBehavior, RestCaller, RestNode, VectorDbNode, VectorSearcher};
use crate::llm_client::LlmClient;

/// Constructs node behaviors for a given metamodel. The REST/vector-DB
/// collaborators (the actual HTTP client and vector-DB driver) are supplied
/// by the caller since they are out of scope for this crate (spec §1).
pub struct NodeFactory {
    llm_client: Arc<dyn LlmClient>,
    rest_caller: Arc<dyn RestCaller>,
    vector_searcher: Arc<dyn VectorSearcher>,
}

impl NodeFactory {
    pub fn new(
        llm_client: Arc<dyn LlmClient>,
        rest_caller: Arc<dyn RestCaller>,
        vector_searcher: Arc<dyn VectorSearcher>,
    ) -> Self {
        Self { llm_client, rest_caller, vector_searcher }
    }

    pub fn build(&self, metamodel: &NodeMetamodel) -> Result<NodeBehavior> {
        match metamodel.node_type {
            NodeType::Ai => match metamodel.model_type {
                Some(ModelType::Llm) => Ok(NodeBehavior::Llm(LlmNode { client: self.llm_client.clone() })),
                Some(ModelType::Embeddings) => {
                    Ok(NodeBehavior::Embeddings(EmbeddingsNode { client: self.llm_client.clone() }))
                }
                None => Err(OrchestratorError::validation_error(format!(
                    "node {} is type AI but carries no modelType",
                    metamodel.id
                ))),
            },
            NodeType::Tool => match metamodel.tool_type {
                Some(ToolType::Rest) => Ok(NodeBehavior::Rest(RestNode { caller: self.rest_caller.clone() })),
                Some(ToolType::VectorDb) => {
                    Ok(NodeBehavior::VectorDb(VectorDbNode { searcher: self.vector_searcher.clone() }))
                }
                None => Err(OrchestratorError::validation_error(format!(
                    "node {} is type TOOL but carries no toolType",
                    metamodel.id
                ))),
            },
            NodeType::Flow => Ok(NodeBehavior::Gateway(GatewayNode)),
        }
    }
}
