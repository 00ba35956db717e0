//! # Intent catalog
//!
//! Stores [`IntentMetamodel`] documents. Shaped like a
//! `registry::agent_registry::AgentRegistry` trait: an async trait with
//! `#[cfg_attr(test, mockall::automock)]` for unit-testing consumers without
//! a real backing store, plus an in-memory reference implementation that
//! lets the backing store be swapped without touching the core.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::metamodel::{normalize_intent_name, IntentMetamodel};
use uuid::Uuid;

use crate::cache::{CacheKey, InvalidatingCache};
use crate::embedding::compute_intent_embedding;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait IntentCatalog: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<IntentMetamodel>>;
    async fn find_all(&self) -> Result<Vec<IntentMetamodel>>;
    async fn exists_by_id(&self, id: Uuid) -> Result<bool>;
    /// Used by the intent detector's name-match fallback (§4.10 step 3).
    async fn find_by_name(&self, name: &str) -> Result<Option<IntentMetamodel>>;
    async fn create(&self, name: String, description: String, ai_generated: bool)
        -> Result<IntentMetamodel>;
    async fn update(&self, id: Uuid, name: String, description: String) -> Result<IntentMetamodel>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// In-memory reference implementation. Stands in for the out-of-scope
/// durable catalog persistence layer named in spec §1/§6.
pub struct InMemoryIntentCatalog {
    store: RwLock<HashMap<Uuid, IntentMetamodel>>,
    all_cache: InvalidatingCache<CacheKey, Vec<IntentMetamodel>>,
}

impl InMemoryIntentCatalog {
    /// Intents have no operational/pooled counterpart (§6 defines the event
    /// bus for node and workflow metamodels only), so unlike its siblings
    /// this catalog has no [`crate::event_bus::EventBus`] to publish to.
    pub fn new() -> Self {
        Self { store: RwLock::new(HashMap::new()), all_cache: InvalidatingCache::default() }
    }

    /// Startup hook (§4.2): iterate the catalog, counting entries with a
    /// non-empty normalized name as "valid". Intents have no structural
    /// validator beyond name normalization, unlike nodes.
    pub fn validate_all(&self) -> (usize, usize) {
        let store = self.store.read().expect("intent catalog lock poisoned");
        let mut valid = 0;
        let mut invalid = 0;
        for intent in store.values() {
            if intent.name.trim().is_empty() {
                invalid += 1;
            } else {
                valid += 1;
            }
        }
        tracing::info!(valid, invalid, "intent catalog startup validation complete");
        (valid, invalid)
    }

    /// Cascade helper used by the workflow catalog when an intent is
    /// deleted (§4.2 "delete ... for intents additionally cascades").
    /// Lives here rather than as a trait method since it only needs read
    /// access to this store's ids, not a `WorkflowCatalog` dependency.
    pub fn all_ids(&self) -> Vec<Uuid> {
        self.store.read().expect("intent catalog lock poisoned").keys().copied().collect()
    }
}

#[async_trait]
impl IntentCatalog for InMemoryIntentCatalog {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<IntentMetamodel>> {
        Ok(self.store.read().expect("intent catalog lock poisoned").get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<IntentMetamodel>> {
        if let Some(cached) = self.all_cache.get(&CacheKey::All) {
            return Ok(cached);
        }
        let all: Vec<IntentMetamodel> =
            self.store.read().expect("intent catalog lock poisoned").values().cloned().collect();
        self.all_cache.put(CacheKey::All, all.clone());
        Ok(all)
    }

    async fn exists_by_id(&self, id: Uuid) -> Result<bool> {
        Ok(self.store.read().expect("intent catalog lock poisoned").contains_key(&id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<IntentMetamodel>> {
        let normalized = normalize_intent_name(name);
        Ok(self
            .store
            .read()
            .expect("intent catalog lock poisoned")
            .values()
            .find(|i| i.name == normalized)
            .cloned())
    }

    async fn create(
        &self,
        name: String,
        description: String,
        ai_generated: bool,
    ) -> Result<IntentMetamodel> {
        let mut intent = IntentMetamodel {
            id: Uuid::new_v4(),
            name: normalize_intent_name(&name),
            description,
            embedding: Vec::new(),
            ai_generated,
            created_at: Utc::now(),
        };
        intent.embedding = compute_intent_embedding(&intent);

        self.store
            .write()
            .expect("intent catalog lock poisoned")
            .insert(intent.id, intent.clone());
        self.all_cache.invalidate(&CacheKey::All);

        Ok(intent)
    }

    async fn update(&self, id: Uuid, name: String, description: String) -> Result<IntentMetamodel> {
        let mut store = self.store.write().expect("intent catalog lock poisoned");
        let existing = store
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::catalog_error(format!("intent {id} not found")))?;
        existing.name = normalize_intent_name(&name);
        existing.description = description;
        existing.embedding = compute_intent_embedding(existing);
        let updated = existing.clone();
        drop(store);
        self.all_cache.invalidate(&CacheKey::All);
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.store.write().expect("intent catalog lock poisoned").remove(&id);
        self.all_cache.invalidate(&CacheKey::All);
        Ok(())
    }
}

/// Deletes an intent and cascades the removal into every workflow's
/// `handledIntents` (§4.2). Kept as a free function rather than a trait
/// method on either catalog because it needs both.
pub async fn delete_intent_cascading(
    intents: &dyn IntentCatalog,
    workflows: &dyn crate::workflow_catalog::WorkflowCatalog,
    id: Uuid,
) -> Result<()> {
    intents.delete(id).await?;
    workflows.remove_handled_intent_everywhere(id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_normalizes_name_and_computes_embedding() {
        let catalog = InMemoryIntentCatalog::new();
        let intent = catalog.create("book a flight".to_string(), "desc".to_string(), false).await.unwrap();
        assert_eq!(intent.name, "BOOK_A_FLIGHT");
        assert!(!intent.embedding.is_empty());
    }

    #[tokio::test]
    async fn find_by_name_matches_normalized_form() {
        let catalog = InMemoryIntentCatalog::new();
        catalog.create("Reset Password".to_string(), String::new(), false).await.unwrap();
        let found = catalog.find_by_name("reset_password").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn write_paths_invalidate_all_cache() {
        let catalog = InMemoryIntentCatalog::new();
        catalog.create("a".to_string(), String::new(), false).await.unwrap();
        assert_eq!(catalog.find_all().await.unwrap().len(), 1);
        catalog.create("b".to_string(), String::new(), false).await.unwrap();
        assert_eq!(catalog.find_all().await.unwrap().len(), 2);
    }
}
