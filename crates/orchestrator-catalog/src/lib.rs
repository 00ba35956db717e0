//! # orchestrator-catalog
//!
//! The knowledge-layer half of the two-layer metamodel architecture (§1/§4.2):
//! versioned catalogs of [`orchestrator_core::metamodel::IntentMetamodel`],
//! [`orchestrator_core::metamodel::NodeMetamodel`], and
//! [`orchestrator_core::metamodel::WorkflowMetamodel`] documents, an
//! in-process event bus that notifies the operational layer (instance pools,
//! in `orchestrator-engine`) of catalog writes, and the hybrid search
//! pipeline routing uses to shortlist candidate nodes.
//!
//! Shaped like a `registry` module: one trait per catalog with a `mockall`
//! automock for consumer unit tests, and an in-memory reference
//! implementation playing the `AgentRegistry` role — swap the backing store
//! without touching callers.

pub mod cache;
pub mod embedding;
pub mod event_bus;
pub mod intent_catalog;
pub mod node_catalog;
pub mod search;
pub mod workflow_catalog;

#[cfg(test)]
pub mod testing;

pub mod prelude {
    pub use crate::event_bus::{CatalogEvent, EventBus};
    pub use crate::intent_catalog::{delete_intent_cascading, IntentCatalog, InMemoryIntentCatalog};
    pub use crate::node_catalog::{InMemoryNodeCatalog, NodeCatalog};
    pub use crate::search::{hybrid_search, InMemoryNodeSearchIndex, NodeSearchIndex, ScoredNode, SearchFilter};
    pub use crate::workflow_catalog::{InMemoryWorkflowCatalog, WorkflowCatalog};
}
