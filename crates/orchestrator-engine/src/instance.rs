//! # Live instances
//!
//! A [`NodeInstance`] is the executable counterpart of a [`NodeMetamodel`]
//! (§3, §9 "Polymorphism over node families"): modeled elsewhere with
//! inheritance (`NodeInstance <- AiNodeInstance <- LlmNodeInstance`, etc.);
//! here it is a sum type with a single `process` capability, matching a
//! `nodes::agent::{AgentNode, ModelInstance}` trait-object split generalized
//! into an enum dispatch since the node families are closed and known
//! (`Llm | Embeddings | Rest | VectorDb | Gateway`), not open for
//! third-party extension the way a live agent registry is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::context::ExecutionContext;
use orchestrator_core::error::Result;
use orchestrator_core::metamodel::{NodeMetamodel, WorkflowMetamodel, WorkflowNode};
use orchestrator_core::observability::{NodeDetail, NodeOutcome};
use uuid::Uuid;

use crate::llm_client::LlmClient;

/// A single unit of work a node family knows how to perform. Implementors
/// read their inputs from `ctx` and write their outputs back into it;
/// `process` never mutates edges or pool bookkeeping — that is the
/// executor's job.
#[async_trait]
pub trait NodeProcess: Send + Sync {
    async fn process(&self, ctx: &mut ExecutionContext) -> Result<()>;
}

/// LLM chat node. Holds the provider client behind an `Arc<dyn LlmClient>` so
/// `refresh()` (§4.3 hot-swap) can drop and rebuild it without touching the
/// pool's bookkeeping.
pub struct LlmNode {
    pub client: Arc<dyn LlmClient>,
}

#[async_trait]
impl NodeProcess for LlmNode {
    async fn process(&self, ctx: &mut ExecutionContext) -> Result<()> {
        // The concrete LLM node family is an out-of-scope collaborator
        // (spec §1 "the concrete node implementations"); this orchestrates
        // the port <-> prompt plumbing a real implementation would do, via
        // the same `LlmClient` seam used by intent detection/input mapping.
        let prompt = ctx.get("prompt").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let response = self.client.complete(&prompt).await?;
        ctx.put("response", orchestrator_core::ports::PortValue::String(response));
        Ok(())
    }
}

/// Embeddings node.
pub struct EmbeddingsNode {
    pub client: Arc<dyn LlmClient>,
}

#[async_trait]
impl NodeProcess for EmbeddingsNode {
    async fn process(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let text = ctx.get("input_text").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let embedding = self.client.embed(&text).await?;
        let seq = embedding
            .into_iter()
            .map(|f| orchestrator_core::ports::PortValue::Float(f as f64))
            .collect();
        ctx.put("output_vector", orchestrator_core::ports::PortValue::Seq(seq));
        Ok(())
    }
}

/// REST tool node. The HTTP call itself is an out-of-scope collaborator;
/// this is the seam a concrete implementation plugs into.
pub struct RestNode {
    pub caller: Arc<dyn RestCaller>,
}

#[async_trait]
pub trait RestCaller: Send + Sync {
    async fn call(&self, ctx: &ExecutionContext) -> Result<RestResponse>;
}

pub struct RestResponse {
    pub status: i64,
    pub body: orchestrator_core::ports::PortValue,
}

#[async_trait]
impl NodeProcess for RestNode {
    async fn process(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let response = self.caller.call(ctx).await?;
        ctx.put("res_status", orchestrator_core::ports::PortValue::Int(response.status));
        ctx.put("res_full_body", response.body);
        Ok(())
    }
}

/// Vector-DB tool node.
pub struct VectorDbNode {
    pub searcher: Arc<dyn VectorSearcher>,
}

#[async_trait]
pub trait VectorSearcher: Send + Sync {
    async fn search(&self, vector: &[f32]) -> Result<Vec<orchestrator_core::ports::PortValue>>;
}

#[async_trait]
impl NodeProcess for VectorDbNode {
    async fn process(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let vector: Vec<f32> = match ctx.get("input_vector") {
            Some(orchestrator_core::ports::PortValue::Seq(items)) => items
                .iter()
                .filter_map(|v| match v {
                    orchestrator_core::ports::PortValue::Float(f) => Some(*f as f32),
                    orchestrator_core::ports::PortValue::Int(i) => Some(*i as f32),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        let results = self.searcher.search(&vector).await?;
        ctx.put("first_result", results.first().cloned().unwrap_or(orchestrator_core::ports::PortValue::Null));
        ctx.put("results", orchestrator_core::ports::PortValue::Seq(results));
        Ok(())
    }
}

/// Gateway (FLOW) node: pure control flow, no ports, no-op process body.
pub struct GatewayNode;

#[async_trait]
impl NodeProcess for GatewayNode {
    async fn process(&self, _ctx: &mut ExecutionContext) -> Result<()> {
        Ok(())
    }
}

/// Sum type over node families (§9). `process` dispatches to the variant's
/// implementation; `refresh()` is the hot-swap hook the pool calls after an
/// in-place metamodel pointer replacement (type-specific — e.g. an LLM node
/// drops its cached chat client so the next run picks up the new model).
pub enum NodeBehavior {
    Llm(LlmNode),
    Embeddings(EmbeddingsNode),
    Rest(RestNode),
    VectorDb(VectorDbNode),
    Gateway(GatewayNode),
}

impl NodeBehavior {
    pub async fn process(&self, ctx: &mut ExecutionContext) -> Result<()> {
        match self {
            NodeBehavior::Llm(n) => n.process(ctx).await,
            NodeBehavior::Embeddings(n) => n.process(ctx).await,
            NodeBehavior::Rest(n) => n.process(ctx).await,
            NodeBehavior::VectorDb(n) => n.process(ctx).await,
            NodeBehavior::Gateway(n) => n.process(ctx).await,
        }
    }
}

/// Monotonic counter so a reader that captured a metamodel pointer before a
/// hot-swap can detect it lost the race (§9 design notes on cyclic
/// references; not required for correctness since swaps only happen while
/// idle, but cheap to carry).
static METAMODEL_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Live, executable counterpart of a [`NodeMetamodel`] (§3). Shares its
/// metamodel pointer with the catalog cache via `Arc`; on hot-swap the whole
/// `Arc` is replaced atomically under the pool's lock.
pub struct NodeInstance {
    pub id: Uuid,
    pub metamodel: Arc<NodeMetamodel>,
    pub behavior: NodeBehavior,
    pub generation: u64,
}

impl NodeInstance {
    pub fn new(metamodel: Arc<NodeMetamodel>, behavior: NodeBehavior) -> Self {
        Self {
            id: Uuid::new_v4(),
            metamodel,
            behavior,
            generation: METAMODEL_GENERATION.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Hot-swap hook (§4.3): the pool calls this after atomically replacing
    /// `self.metamodel`. For an LLM/embeddings node this would drop the
    /// cached chat client so a provider/model change takes effect on the
    /// next run; the in-memory sum type here carries no such cache to drop,
    /// so this only bumps the generation counter.
    pub fn refresh(&mut self, new_metamodel: Arc<NodeMetamodel>) {
        self.metamodel = new_metamodel;
        self.generation = METAMODEL_GENERATION.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn process(&self, ctx: &mut ExecutionContext, detail: &mut NodeDetail) -> Result<()> {
        let started = Utc::now();
        detail.started_at = started;
        let result = self.behavior.process(ctx).await;
        detail.duration_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;
        match &result {
            Ok(()) => detail.outcome = NodeOutcome::Succeeded,
            Err(e) => {
                detail.outcome = NodeOutcome::Failed;
                detail.error = Some(e.to_string());
            }
        }
        result
    }
}

/// Live, executable counterpart of a [`WorkflowMetamodel`] (§3). Owns the
/// two lookup maps the pool refreshes on metamodel or node-list changes:
/// `workflowNodeId -> WorkflowNode` and `nodeMetamodelId -> NodeInstance`.
pub struct WorkflowInstance {
    pub id: Uuid,
    pub metamodel: Arc<WorkflowMetamodel>,
    /// `workflowNodeId -> WorkflowNode`, rebuilt whenever the metamodel
    /// pointer is swapped.
    pub node_lookup: std::collections::HashMap<String, WorkflowNode>,
    /// `nodeMetamodelId -> NodeInstance`, one entry per distinct node
    /// metamodel referenced by the workflow.
    pub node_instances: std::collections::HashMap<Uuid, Arc<tokio::sync::RwLock<NodeInstance>>>,
}

impl WorkflowInstance {
    pub fn new(
        metamodel: Arc<WorkflowMetamodel>,
        node_instances: std::collections::HashMap<Uuid, Arc<tokio::sync::RwLock<NodeInstance>>>,
    ) -> Self {
        let node_lookup = metamodel.nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
        Self { id: Uuid::new_v4(), metamodel, node_lookup, node_instances }
    }

    /// Rebuild the two lookup maps after a metamodel pointer swap (§4.3
    /// hot-swap path for workflows).
    pub fn refresh(
        &mut self,
        new_metamodel: Arc<WorkflowMetamodel>,
        node_instances: std::collections::HashMap<Uuid, Arc<tokio::sync::RwLock<NodeInstance>>>,
    ) {
        self.node_lookup = new_metamodel.nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
        self.metamodel = new_metamodel;
        self.node_instances = node_instances;
    }
}
