//! # Workflow catalog
//!
//! Stores [`WorkflowMetamodel`] documents. Unlike the node catalog, a
//! `WorkflowMetamodel` carries no `familyId`/`isLatest` pair (§4.2/§4.3):
//! updates save in place after cross-validating against the node catalog.
//! "Breaking" is a classification the *instance pool* (orchestrator-engine)
//! applies to decide whether to deprecate a running `WorkflowInstance`, not
//! something the catalog branches on.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::metamodel::WorkflowMetamodel;
use uuid::Uuid;

use crate::cache::{CacheKey, InvalidatingCache};
use crate::event_bus::{CatalogEvent, EventBus};
use crate::node_catalog::NodeCatalog;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait WorkflowCatalog: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkflowMetamodel>>;
    async fn find_all(&self) -> Result<Vec<WorkflowMetamodel>>;
    async fn exists_by_id(&self, id: Uuid) -> Result<bool>;
    /// Validates structurally and against the node catalog (every
    /// `WorkflowNode::node_metamodel_id` must resolve), assigns a fresh id
    /// and timestamp, inserts.
    async fn create(&self, metamodel: WorkflowMetamodel) -> Result<WorkflowMetamodel>;
    /// Validates (structurally and against the node catalog), then saves
    /// in place (§4.2: "Workflows: validate against the node catalog, then
    /// save").
    async fn update(&self, id: Uuid, metamodel: WorkflowMetamodel) -> Result<WorkflowMetamodel>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Top-scored workflows handling `intent_id`, descending by score,
    /// limited to `n` (§4.2, feeds routing §4.8).
    async fn find_top_n_handling_intent(&self, intent_id: Uuid, n: usize) -> Result<Vec<WorkflowMetamodel>>;
    /// Persists learned edge bindings from the executor (§4.4/§4.9).
    /// `bindings` maps `edgeId -> newBindings`.
    async fn update_multiple_edge_bindings(
        &self,
        workflow_id: Uuid,
        bindings: BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<WorkflowMetamodel>;
    /// Cascade support for intent deletion (§4.2): removes `intent_id` from
    /// every workflow's `handledIntents`, returning the number of workflows
    /// touched.
    async fn remove_handled_intent_everywhere(&self, intent_id: Uuid) -> Result<usize>;
}

pub struct InMemoryWorkflowCatalog<'a> {
    store: RwLock<HashMap<Uuid, WorkflowMetamodel>>,
    all_cache: InvalidatingCache<CacheKey, Vec<WorkflowMetamodel>>,
    by_intent_cache: InvalidatingCache<CacheKey, Vec<WorkflowMetamodel>>,
    events: EventBus,
    nodes: &'a dyn NodeCatalog,
}

impl<'a> InMemoryWorkflowCatalog<'a> {
    pub fn new(events: EventBus, nodes: &'a dyn NodeCatalog) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            all_cache: InvalidatingCache::default(),
            by_intent_cache: InvalidatingCache::default(),
            events,
            nodes,
        }
    }

    /// Startup hook (§4.2): run [`WorkflowMetamodel::validate`] over every
    /// stored workflow and log valid/invalid counts.
    pub fn validate_all(&self) -> (usize, usize) {
        let store = self.store.read().expect("workflow catalog lock poisoned");
        let mut valid = 0;
        let mut invalid = 0;
        for workflow in store.values() {
            match workflow.validate() {
                Ok(()) => valid += 1,
                Err(e) => {
                    invalid += 1;
                    tracing::warn!(
                        workflow_id = %workflow.id, error = %e,
                        "workflow metamodel failed startup validation"
                    );
                }
            }
        }
        tracing::info!(valid, invalid, "workflow catalog startup validation complete");
        (valid, invalid)
    }

    async fn validate_against_node_catalog(&self, workflow: &WorkflowMetamodel) -> Result<()> {
        workflow.validate()?;
        for node in &workflow.nodes {
            if !self.nodes.exists_by_id(node.node_metamodel_id).await? {
                return Err(OrchestratorError::catalog_error(format!(
                    "workflow node '{}' references unknown node metamodel {}",
                    node.id, node.node_metamodel_id
                )));
            }
        }
        Ok(())
    }

    fn invalidate_all(&self) {
        self.all_cache.invalidate(&CacheKey::All);
        self.by_intent_cache.invalidate_all();
    }
}

#[async_trait]
impl<'a> WorkflowCatalog for InMemoryWorkflowCatalog<'a> {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkflowMetamodel>> {
        Ok(self.store.read().expect("workflow catalog lock poisoned").get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<WorkflowMetamodel>> {
        if let Some(cached) = self.all_cache.get(&CacheKey::All) {
            return Ok(cached);
        }
        let all: Vec<WorkflowMetamodel> =
            self.store.read().expect("workflow catalog lock poisoned").values().cloned().collect();
        self.all_cache.put(CacheKey::All, all.clone());
        Ok(all)
    }

    async fn exists_by_id(&self, id: Uuid) -> Result<bool> {
        Ok(self.store.read().expect("workflow catalog lock poisoned").contains_key(&id))
    }

    async fn create(&self, mut metamodel: WorkflowMetamodel) -> Result<WorkflowMetamodel> {
        self.validate_against_node_catalog(&metamodel).await?;
        metamodel.id = Uuid::new_v4();
        metamodel.created_at = Utc::now();

        self.store
            .write()
            .expect("workflow catalog lock poisoned")
            .insert(metamodel.id, metamodel.clone());
        self.invalidate_all();
        self.events
            .publish(CatalogEvent::WorkflowMetamodelUpdated {
                metamodel_id: metamodel.id,
                updated_metamodel: metamodel.clone(),
            })
            .await;

        Ok(metamodel)
    }

    async fn update(&self, id: Uuid, mut metamodel: WorkflowMetamodel) -> Result<WorkflowMetamodel> {
        self.validate_against_node_catalog(&metamodel).await?;

        {
            let mut store = self.store.write().expect("workflow catalog lock poisoned");
            let existing = store
                .get(&id)
                .ok_or_else(|| OrchestratorError::catalog_error(format!("workflow {id} not found")))?;
            metamodel.id = id;
            metamodel.created_at = existing.created_at;
            store.insert(id, metamodel.clone());
        }

        self.invalidate_all();
        self.events
            .publish(CatalogEvent::WorkflowMetamodelUpdated {
                metamodel_id: metamodel.id,
                updated_metamodel: metamodel.clone(),
            })
            .await;

        Ok(metamodel)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.store.write().expect("workflow catalog lock poisoned").remove(&id);
        self.invalidate_all();
        Ok(())
    }

    async fn find_top_n_handling_intent(&self, intent_id: Uuid, n: usize) -> Result<Vec<WorkflowMetamodel>> {
        let cache_key = CacheKey::ByIntent(intent_id);
        if let Some(cached) = self.by_intent_cache.get(&cache_key) {
            return Ok(cached.into_iter().take(n).collect());
        }

        let store = self.store.read().expect("workflow catalog lock poisoned");
        let mut matches: Vec<(f64, WorkflowMetamodel)> = store
            .values()
            .filter(|w| w.enabled)
            .filter_map(|w| w.handles_intent(intent_id).map(|score| (score, w.clone())))
            .collect();
        drop(store);

        matches.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
        let ranked: Vec<WorkflowMetamodel> = matches.into_iter().map(|(_, w)| w).collect();
        self.by_intent_cache.put(cache_key, ranked.clone());

        Ok(ranked.into_iter().take(n).collect())
    }

    async fn update_multiple_edge_bindings(
        &self,
        workflow_id: Uuid,
        bindings: BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<WorkflowMetamodel> {
        let updated = {
            let mut store = self.store.write().expect("workflow catalog lock poisoned");
            let workflow = store.get_mut(&workflow_id).ok_or_else(|| {
                OrchestratorError::catalog_error(format!("workflow {workflow_id} not found"))
            })?;
            for edge in &mut workflow.edges {
                if let Some(new_bindings) = bindings.get(&edge.id) {
                    edge.bindings = new_bindings.clone();
                }
            }
            workflow.clone()
        };

        self.invalidate_all();
        self.events
            .publish(CatalogEvent::WorkflowMetamodelUpdated {
                metamodel_id: updated.id,
                updated_metamodel: updated.clone(),
            })
            .await;

        Ok(updated)
    }

    async fn remove_handled_intent_everywhere(&self, intent_id: Uuid) -> Result<usize> {
        let mut touched = Vec::new();
        {
            let mut store = self.store.write().expect("workflow catalog lock poisoned");
            for workflow in store.values_mut() {
                let before = workflow.handled_intents.len();
                workflow.handled_intents.retain(|h| h.intent_id != intent_id);
                if workflow.handled_intents.len() != before {
                    touched.push(workflow.clone());
                }
            }
        }

        if !touched.is_empty() {
            self.invalidate_all();
            for workflow in &touched {
                self.events
                    .publish(CatalogEvent::WorkflowMetamodelUpdated {
                        metamodel_id: workflow.id,
                        updated_metamodel: workflow.clone(),
                    })
                    .await;
            }
        }

        Ok(touched.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_catalog::InMemoryNodeCatalog;
    use crate::testing::{linear_workflow_metamodel, llm_node_metamodel};
    use orchestrator_core::metamodel::NodeMetamodel;

    async fn node_catalog_with_two_nodes() -> (InMemoryNodeCatalog, NodeMetamodel, NodeMetamodel) {
        let catalog = InMemoryNodeCatalog::new(EventBus::new());
        let start = catalog.create(llm_node_metamodel("start")).await.unwrap();
        let end = catalog.create(llm_node_metamodel("end")).await.unwrap();
        (catalog, start, end)
    }

    #[tokio::test]
    async fn create_rejects_unknown_node_reference() {
        let node_catalog = InMemoryNodeCatalog::new(EventBus::new());
        let workflow_catalog = InMemoryWorkflowCatalog::new(EventBus::new(), &node_catalog);
        let bogus_start = llm_node_metamodel("start");
        let bogus_end = llm_node_metamodel("end");
        let wf = linear_workflow_metamodel(&bogus_start, &bogus_end, Uuid::new_v4(), 1.0);
        assert!(workflow_catalog.create(wf).await.is_err());
    }

    #[tokio::test]
    async fn create_succeeds_when_nodes_resolve() {
        let (node_catalog, start, end) = node_catalog_with_two_nodes().await;
        let workflow_catalog = InMemoryWorkflowCatalog::new(EventBus::new(), &node_catalog);
        let wf = linear_workflow_metamodel(&start, &end, Uuid::new_v4(), 1.0);
        let created = workflow_catalog.create(wf).await.unwrap();
        assert!(workflow_catalog.exists_by_id(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn find_top_n_handling_intent_ranks_by_score() {
        let (node_catalog, start, end) = node_catalog_with_two_nodes().await;
        let workflow_catalog = InMemoryWorkflowCatalog::new(EventBus::new(), &node_catalog);
        let intent_id = Uuid::new_v4();

        let low = linear_workflow_metamodel(&start, &end, intent_id, 0.2);
        workflow_catalog.create(low).await.unwrap();

        let high = linear_workflow_metamodel(&start, &end, intent_id, 0.9);
        let high = workflow_catalog.create(high).await.unwrap();

        let top = workflow_catalog.find_top_n_handling_intent(intent_id, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, high.id);
    }

    #[tokio::test]
    async fn remove_handled_intent_everywhere_strips_all_occurrences() {
        let (node_catalog, start, end) = node_catalog_with_two_nodes().await;
        let workflow_catalog = InMemoryWorkflowCatalog::new(EventBus::new(), &node_catalog);
        let intent_id = Uuid::new_v4();

        let wf = linear_workflow_metamodel(&start, &end, intent_id, 0.5);
        let created = workflow_catalog.create(wf).await.unwrap();

        let touched = workflow_catalog.remove_handled_intent_everywhere(intent_id).await.unwrap();
        assert_eq!(touched, 1);

        let reloaded = workflow_catalog.find_by_id(created.id).await.unwrap().unwrap();
        assert!(reloaded.handled_intents.is_empty());
    }

    #[tokio::test]
    async fn update_multiple_edge_bindings_persists_new_bindings() {
        let (node_catalog, start, end) = node_catalog_with_two_nodes().await;
        let workflow_catalog = InMemoryWorkflowCatalog::new(EventBus::new(), &node_catalog);
        let wf = linear_workflow_metamodel(&start, &end, Uuid::new_v4(), 1.0);
        let created = workflow_catalog.create(wf).await.unwrap();
        let edge_id = created.edges[0].id.clone();

        let mut new_bindings = BTreeMap::new();
        new_bindings.insert("output.value".to_string(), "input.value".to_string());
        let mut map = BTreeMap::new();
        map.insert(edge_id.clone(), new_bindings.clone());

        let updated = workflow_catalog.update_multiple_edge_bindings(created.id, map).await.unwrap();
        assert_eq!(updated.edges[0].bindings, new_bindings);
    }
}
