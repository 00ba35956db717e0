//! # Node catalog
//!
//! Stores [`NodeMetamodel`] documents, versioned by `familyId`. Shaped like
//! a `registry::agent_registry::AgentRegistry` trait, with the
//! breaking-update / hot-swap split from §4.2 layered on top of plain CRUD.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::metamodel::NodeMetamodel;
use uuid::Uuid;

use crate::cache::{CacheKey, InvalidatingCache};
use crate::embedding::compute_node_embedding;
use crate::event_bus::{CatalogEvent, EventBus};

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait NodeCatalog: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<NodeMetamodel>>;
    async fn find_all(&self) -> Result<Vec<NodeMetamodel>>;
    async fn exists_by_id(&self, id: Uuid) -> Result<bool>;
    async fn find_by_family_id_latest(&self, family_id: Uuid) -> Result<Option<NodeMetamodel>>;
    /// Validates and inserts a brand-new node family (a fresh `familyId`).
    async fn create(&self, metamodel: NodeMetamodel) -> Result<NodeMetamodel>;
    /// Updates an existing node. Breaking (major version bump) updates
    /// clone into a new document with a fresh id and `isLatest=true`,
    /// flipping the prior latest version's flag off (§4.2/§4.3).
    async fn update(&self, id: Uuid, metamodel: NodeMetamodel) -> Result<NodeMetamodel>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

pub struct InMemoryNodeCatalog {
    store: RwLock<HashMap<Uuid, NodeMetamodel>>,
    all_cache: InvalidatingCache<CacheKey, Vec<NodeMetamodel>>,
    latest_cache: InvalidatingCache<CacheKey, NodeMetamodel>,
    events: EventBus,
}

impl InMemoryNodeCatalog {
    pub fn new(events: EventBus) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            all_cache: InvalidatingCache::default(),
            latest_cache: InvalidatingCache::default(),
            events,
        }
    }

    /// Startup hook (§4.2): run [`NodeMetamodel::validate`] over every
    /// stored node and log valid/invalid counts.
    pub fn validate_all(&self) -> (usize, usize) {
        let store = self.store.read().expect("node catalog lock poisoned");
        let mut valid = 0;
        let mut invalid = 0;
        for node in store.values() {
            match node.validate() {
                Ok(()) => valid += 1,
                Err(e) => {
                    invalid += 1;
                    tracing::warn!(node_id = %node.id, error = %e, "node metamodel failed startup validation");
                }
            }
        }
        tracing::info!(valid, invalid, "node catalog startup validation complete");
        (valid, invalid)
    }

    fn invalidate_for(&self, family_id: Uuid) {
        self.all_cache.invalidate(&CacheKey::All);
        self.latest_cache.invalidate(&CacheKey::ByFamilyIdLatest(family_id));
    }
}

#[async_trait]
impl NodeCatalog for InMemoryNodeCatalog {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<NodeMetamodel>> {
        Ok(self.store.read().expect("node catalog lock poisoned").get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<NodeMetamodel>> {
        if let Some(cached) = self.all_cache.get(&CacheKey::All) {
            return Ok(cached);
        }
        let all: Vec<NodeMetamodel> =
            self.store.read().expect("node catalog lock poisoned").values().cloned().collect();
        self.all_cache.put(CacheKey::All, all.clone());
        Ok(all)
    }

    async fn exists_by_id(&self, id: Uuid) -> Result<bool> {
        Ok(self.store.read().expect("node catalog lock poisoned").contains_key(&id))
    }

    async fn find_by_family_id_latest(&self, family_id: Uuid) -> Result<Option<NodeMetamodel>> {
        if let Some(cached) = self.latest_cache.get(&CacheKey::ByFamilyIdLatest(family_id)) {
            return Ok(Some(cached));
        }
        let found = self
            .store
            .read()
            .expect("node catalog lock poisoned")
            .values()
            .find(|n| n.family_id == family_id && n.is_latest)
            .cloned();
        if let Some(node) = &found {
            self.latest_cache.put(CacheKey::ByFamilyIdLatest(family_id), node.clone());
        }
        Ok(found)
    }

    async fn create(&self, mut metamodel: NodeMetamodel) -> Result<NodeMetamodel> {
        metamodel.id = Uuid::new_v4();
        let now = Utc::now();
        metamodel.created_at = now;
        metamodel.updated_at = now;
        metamodel.embedding = compute_node_embedding(&metamodel);
        metamodel.validate()?;

        let family_id = metamodel.family_id;
        self.store
            .write()
            .expect("node catalog lock poisoned")
            .insert(metamodel.id, metamodel.clone());
        self.invalidate_for(family_id);
        self.events
            .publish(CatalogEvent::NodeMetamodelUpdated {
                metamodel_id: metamodel.id,
                updated_metamodel: metamodel.clone(),
            })
            .await;

        Ok(metamodel)
    }

    async fn update(&self, id: Uuid, mut metamodel: NodeMetamodel) -> Result<NodeMetamodel> {
        metamodel.embedding = compute_node_embedding(&metamodel);
        metamodel.validate()?;

        let (result, family_id) = {
            let mut store = self.store.write().expect("node catalog lock poisoned");
            let existing = store
                .get(&id)
                .ok_or_else(|| OrchestratorError::catalog_error(format!("node {id} not found")))?
                .clone();

            if existing.version.is_breaking_update_to(&metamodel.version) {
                // Clone as a new document; the old one stops being latest.
                let mut new_doc = metamodel;
                new_doc.id = Uuid::new_v4();
                new_doc.family_id = existing.family_id;
                new_doc.is_latest = true;
                new_doc.created_at = Utc::now();
                new_doc.updated_at = Utc::now();

                if let Some(old) = store.get_mut(&id) {
                    old.is_latest = false;
                }
                store.insert(new_doc.id, new_doc.clone());
                (new_doc, existing.family_id)
            } else {
                let mut updated = metamodel;
                updated.id = id;
                updated.family_id = existing.family_id;
                updated.created_at = existing.created_at;
                updated.updated_at = Utc::now();
                updated.is_latest = existing.is_latest;
                store.insert(id, updated.clone());
                (updated, existing.family_id)
            }
        };

        self.invalidate_for(family_id);
        self.events
            .publish(CatalogEvent::NodeMetamodelUpdated {
                metamodel_id: result.id,
                updated_metamodel: result.clone(),
            })
            .await;

        Ok(result)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let family_id = self
            .store
            .write()
            .expect("node catalog lock poisoned")
            .remove(&id)
            .map(|n| n.family_id);
        if let Some(family_id) = family_id {
            self.invalidate_for(family_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::llm_node_metamodel;

    #[tokio::test]
    async fn create_assigns_fresh_id_and_embedding() {
        let catalog = InMemoryNodeCatalog::new(EventBus::new());
        let node = catalog.create(llm_node_metamodel("n1")).await.unwrap();
        assert!(!node.embedding.is_empty());
        assert!(catalog.exists_by_id(node.id).await.unwrap());
    }

    #[tokio::test]
    async fn minor_update_is_in_place() {
        let catalog = InMemoryNodeCatalog::new(EventBus::new());
        let created = catalog.create(llm_node_metamodel("n1")).await.unwrap();

        let mut minor = created.clone();
        minor.version = created.version.bump_minor();
        minor.description = "updated".to_string();
        let updated = catalog.update(created.id, minor).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.description, "updated");
        assert!(updated.is_latest);
    }

    #[tokio::test]
    async fn major_update_clones_new_document_and_flips_latest() {
        let catalog = InMemoryNodeCatalog::new(EventBus::new());
        let created = catalog.create(llm_node_metamodel("n1")).await.unwrap();

        let mut major = created.clone();
        major.version = created.version.bump_major();
        let updated = catalog.update(created.id, major).await.unwrap();

        assert_ne!(updated.id, created.id);
        assert!(updated.is_latest);

        let old = catalog.find_by_id(created.id).await.unwrap().unwrap();
        assert!(!old.is_latest);

        let latest = catalog.find_by_family_id_latest(created.family_id).await.unwrap().unwrap();
        assert_eq!(latest.id, updated.id);
    }

    #[tokio::test]
    async fn create_rejects_invalid_node() {
        let catalog = InMemoryNodeCatalog::new(EventBus::new());
        let mut node = llm_node_metamodel("bad");
        node.input_ports.push(node.input_ports[0].clone()); // duplicate key
        assert!(catalog.create(node).await.is_err());
    }
}
