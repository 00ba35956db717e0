//! # Instance pools (§4.3)
//!
//! A pool maps *metamodel id* to *live instance*, hot-swapping or
//! deprecating entries as catalog-updated events arrive. Shaped like a
//! `NodeRegistry`-style `RwLock`-guarded map, generalized with the
//! `(deprecated, refCount)` state machine from §9 design notes.

use std::collections::HashMap;
use std::sync::Arc;

use orchestrator_catalog::event_bus::{CatalogEvent, EventBus};
use orchestrator_catalog::node_catalog::NodeCatalog;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::metamodel::{NodeMetamodel, WorkflowMetamodel};
use tokio::sync::RwLock as AsyncRwLock;
use uuid::Uuid;

use crate::factory::NodeFactory;
use crate::instance::{NodeInstance, WorkflowInstance};

/// The `(deprecated, refCount)` pair collapsed into a total-function state
/// machine (§9 design notes), rather than two independently-mutated fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Fresh,
    Deprecated,
    DeprecatedInFlight,
}

impl Lifecycle {
    fn classify(deprecated: bool, ref_count: usize) -> Self {
        match (deprecated, ref_count > 0) {
            (false, _) => Lifecycle::Fresh,
            (true, false) => Lifecycle::Deprecated,
            (true, true) => Lifecycle::DeprecatedInFlight,
        }
    }
}

/// Execution reference counter (§4.3): `markRunning`/`markFinished` are
/// acquire/release-paired; the key is removed at zero so `is_running` is a
/// single `contains_key` read.
#[derive(Default)]
struct RefCounter {
    counts: std::sync::Mutex<HashMap<Uuid, usize>>,
}

impl RefCounter {
    fn mark_running(&self, id: Uuid) {
        let mut counts = self.counts.lock().expect("ref counter lock poisoned");
        *counts.entry(id).or_insert(0) += 1;
    }

    fn mark_finished(&self, id: Uuid) {
        let mut counts = self.counts.lock().expect("ref counter lock poisoned");
        if let Some(count) = counts.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                counts.remove(&id);
            }
        }
    }

    fn ref_count(&self, id: Uuid) -> usize {
        self.counts.lock().expect("ref counter lock poisoned").get(&id).copied().unwrap_or(0)
    }

    fn is_running(&self, id: Uuid) -> bool {
        self.ref_count(id) > 0
    }
}

struct NodePoolEntry {
    instance: Arc<AsyncRwLock<NodeInstance>>,
    deprecated: bool,
}

/// Pool of live [`NodeInstance`]s keyed by node metamodel id. A given
/// metamodel id is a stable pointer to one specific version (breaking
/// updates mint a new id, §4.2), so events naturally target the right
/// entry or miss entirely when no workflow yet references the new version.
pub struct NodeInstancePool {
    entries: AsyncRwLock<HashMap<Uuid, NodePoolEntry>>,
    ref_counts: RefCounter,
    factory: Arc<NodeFactory>,
}

impl NodeInstancePool {
    /// Constructs the pool and spawns its event-subscription worker.
    pub fn new(factory: Arc<NodeFactory>, events: &EventBus) -> Arc<Self> {
        let pool = Arc::new(Self {
            entries: AsyncRwLock::new(HashMap::new()),
            ref_counts: RefCounter::default(),
            factory,
        });

        let mut subscription = events.subscribe();
        let worker_pool = pool.clone();
        tokio::spawn(async move {
            while let Ok(event) = subscription.recv().await {
                if let CatalogEvent::NodeMetamodelUpdated { metamodel_id, updated_metamodel } = event {
                    worker_pool.handle_node_updated(metamodel_id, updated_metamodel).await;
                }
            }
        });

        pool
    }

    pub fn mark_running(&self, instance_id: Uuid) {
        self.ref_counts.mark_running(instance_id);
    }

    pub fn mark_finished(&self, instance_id: Uuid) {
        self.ref_counts.mark_finished(instance_id);
    }

    pub fn is_running(&self, instance_id: Uuid) -> bool {
        self.ref_counts.is_running(instance_id)
    }

    pub async fn lifecycle_of(&self, metamodel_id: Uuid) -> Option<Lifecycle> {
        let entries = self.entries.read().await;
        let entry = entries.get(&metamodel_id)?;
        let instance_id = entry.instance.read().await.id;
        Some(Lifecycle::classify(entry.deprecated, self.ref_counts.ref_count(instance_id)))
    }

    /// `getOrCreate(metamodel)` (§4.3).
    pub async fn get_or_create(&self, metamodel: &NodeMetamodel) -> Result<Arc<AsyncRwLock<NodeInstance>>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&metamodel.id) {
                if !entry.deprecated {
                    return Ok(entry.instance.clone());
                }
                let instance_id = entry.instance.read().await.id;
                if self.ref_counts.is_running(instance_id) {
                    // Currently executing: return as-is, replace later.
                    return Ok(entry.instance.clone());
                }
            }
        }

        // Either absent, or present-but-deprecated-and-idle: (re)construct.
        let behavior = self.factory.build(metamodel)?;
        let instance = Arc::new(AsyncRwLock::new(NodeInstance::new(Arc::new(metamodel.clone()), behavior)));
        self.entries
            .write()
            .await
            .insert(metamodel.id, NodePoolEntry { instance: instance.clone(), deprecated: false });
        Ok(instance)
    }

    async fn handle_node_updated(&self, metamodel_id: Uuid, updated_metamodel: NodeMetamodel) {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&metamodel_id) else { return };
        let instance_id = entry.instance.read().await.id;

        if self.ref_counts.is_running(instance_id) {
            entry.deprecated = true;
            tracing::debug!(%metamodel_id, "node instance running; deprecated, replacement deferred");
        } else {
            let mut instance = entry.instance.write().await;
            instance.refresh(Arc::new(updated_metamodel));
            entry.deprecated = false;
            tracing::debug!(%metamodel_id, "node instance hot-swapped");
        }
    }
}

struct WorkflowPoolEntry {
    instance: Arc<AsyncRwLock<WorkflowInstance>>,
    deprecated: bool,
}

/// Pool of live [`WorkflowInstance`]s keyed by workflow metamodel id.
/// Workflow ids are stable across updates (§4.2: workflows save in place,
/// unlike nodes), so one entry per workflow persists across its lifetime.
pub struct WorkflowInstancePool {
    entries: AsyncRwLock<HashMap<Uuid, WorkflowPoolEntry>>,
    ref_counts: RefCounter,
    node_pool: Arc<NodeInstancePool>,
}

impl WorkflowInstancePool {
    pub fn new(node_pool: Arc<NodeInstancePool>, events: &EventBus) -> Arc<Self> {
        let pool = Arc::new(Self {
            entries: AsyncRwLock::new(HashMap::new()),
            ref_counts: RefCounter::default(),
            node_pool,
        });

        let mut subscription = events.subscribe();
        let worker_pool = pool.clone();
        tokio::spawn(async move {
            while let Ok(event) = subscription.recv().await {
                if let CatalogEvent::WorkflowMetamodelUpdated { metamodel_id, updated_metamodel } = event {
                    worker_pool.handle_workflow_updated(metamodel_id, updated_metamodel).await;
                }
            }
        });

        pool
    }

    pub fn mark_running(&self, instance_id: Uuid) {
        self.ref_counts.mark_running(instance_id);
    }

    pub fn mark_finished(&self, instance_id: Uuid) {
        self.ref_counts.mark_finished(instance_id);
    }

    pub fn is_running(&self, instance_id: Uuid) -> bool {
        self.ref_counts.is_running(instance_id)
    }

    /// Builds the `nodeMetamodelId -> NodeInstance` map for a workflow by
    /// resolving each referenced node through the node catalog and the node
    /// pool's `getOrCreate`.
    async fn build_node_instances(
        &self,
        metamodel: &WorkflowMetamodel,
        node_catalog: &dyn NodeCatalog,
    ) -> Result<HashMap<Uuid, Arc<AsyncRwLock<NodeInstance>>>> {
        let mut node_instances = HashMap::new();
        for node in &metamodel.nodes {
            if node_instances.contains_key(&node.node_metamodel_id) {
                continue;
            }
            let node_metamodel = node_catalog.find_by_id(node.node_metamodel_id).await?.ok_or_else(|| {
                OrchestratorError::catalog_error(format!(
                    "workflow node '{}' references unknown node metamodel {}",
                    node.id, node.node_metamodel_id
                ))
            })?;
            let instance = self.node_pool.get_or_create(&node_metamodel).await?;
            node_instances.insert(node.node_metamodel_id, instance);
        }
        Ok(node_instances)
    }

    /// `getOrCreate(metamodel)` (§4.3), including the child-node refresh
    /// pass when the workflow instance itself is idle.
    pub async fn get_or_create(
        &self,
        metamodel: &WorkflowMetamodel,
        node_catalog: &dyn NodeCatalog,
    ) -> Result<Arc<AsyncRwLock<WorkflowInstance>>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&metamodel.id) {
                if !entry.deprecated {
                    let instance_id = entry.instance.read().await.id;
                    if !self.ref_counts.is_running(instance_id) {
                        self.refresh_deprecated_children(&entry.instance, node_catalog).await?;
                    }
                    return Ok(entry.instance.clone());
                }
                let instance_id = entry.instance.read().await.id;
                if self.ref_counts.is_running(instance_id) {
                    return Ok(entry.instance.clone());
                }
            }
        }

        let node_instances = self.build_node_instances(metamodel, node_catalog).await?;
        let instance = Arc::new(AsyncRwLock::new(WorkflowInstance::new(Arc::new(metamodel.clone()), node_instances)));
        self.entries
            .write()
            .await
            .insert(metamodel.id, WorkflowPoolEntry { instance: instance.clone(), deprecated: false });
        Ok(instance)
    }

    /// "Iterates its node instances and swaps in fresh ones for any
    /// deprecated children — but only when the workflow itself is not
    /// currently running" (§4.3 step 1).
    async fn refresh_deprecated_children(
        &self,
        instance: &Arc<AsyncRwLock<WorkflowInstance>>,
        node_catalog: &dyn NodeCatalog,
    ) -> Result<()> {
        let metamodel_ids: Vec<Uuid> = instance.read().await.node_instances.keys().copied().collect();
        let mut replacements = HashMap::new();
        for metamodel_id in metamodel_ids {
            if matches!(self.node_pool.lifecycle_of(metamodel_id).await, Some(Lifecycle::Deprecated)) {
                if let Some(node_metamodel) = node_catalog.find_by_id(metamodel_id).await? {
                    let fresh = self.node_pool.get_or_create(&node_metamodel).await?;
                    replacements.insert(metamodel_id, fresh);
                }
            }
        }
        if !replacements.is_empty() {
            let mut guard = instance.write().await;
            guard.node_instances.extend(replacements);
        }
        Ok(())
    }

    /// `routeWorkflowRequest` step 1 (§4.8): the top-N *live* workflow
    /// instances that handle `intent_id`, sorted by score descending. Reads
    /// each pool entry's current metamodel pointer, so an in-flight hot-swap
    /// is already reflected without a catalog round trip.
    pub async fn find_top_n_handling_intent(&self, intent_id: Uuid, n: usize) -> Vec<Arc<WorkflowMetamodel>> {
        let entries = self.entries.read().await;
        let mut scored = Vec::new();
        for entry in entries.values() {
            let metamodel = entry.instance.read().await.metamodel.clone();
            if let Some(score) = metamodel.handles_intent(intent_id) {
                scored.push((score, metamodel));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(n).map(|(_, m)| m).collect()
    }

    async fn handle_workflow_updated(&self, metamodel_id: Uuid, updated_metamodel: WorkflowMetamodel) {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&metamodel_id) else { return };
        let instance_id = entry.instance.read().await.id;
        let running = self.ref_counts.is_running(instance_id);

        let breaking = {
            let guard = entry.instance.read().await;
            guard.metamodel.version.is_breaking_update_to(&updated_metamodel.version)
                || guard.metamodel.node_membership_differs(&updated_metamodel)
        };

        if breaking || running {
            entry.deprecated = true;
            tracing::debug!(%metamodel_id, breaking, running, "workflow instance deprecated");
        } else {
            // Non-breaking, idle: hot-swap and rebuild lookup maps. Node
            // instances are left as-is (unreferenced changes don't apply
            // here; membership hasn't changed by definition of non-breaking).
            let node_instances = entry.instance.read().await.node_instances.clone();
            let mut guard = entry.instance.write().await;
            guard.refresh(Arc::new(updated_metamodel), node_instances);
            entry.deprecated = false;
            tracing::debug!(%metamodel_id, "workflow instance hot-swapped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{llm_node_metamodel, noop_factory};
    use orchestrator_catalog::node_catalog::InMemoryNodeCatalog;

    #[tokio::test]
    async fn get_or_create_returns_same_instance_when_fresh() {
        let pool = NodeInstancePool::new(noop_factory(), &EventBus::new());
        let node = llm_node_metamodel("n1");
        let first = pool.get_or_create(&node).await.unwrap();
        let second = pool.get_or_create(&node).await.unwrap();
        assert_eq!(first.read().await.id, second.read().await.id);
    }

    #[tokio::test]
    async fn running_then_finished_releases_ref_count() {
        let pool = NodeInstancePool::new(noop_factory(), &EventBus::new());
        let node = llm_node_metamodel("n1");
        let instance = pool.get_or_create(&node).await.unwrap();
        let id = instance.read().await.id;

        assert!(!pool.is_running(id));
        pool.mark_running(id);
        assert!(pool.is_running(id));
        pool.mark_finished(id);
        assert!(!pool.is_running(id));
    }

    #[tokio::test]
    async fn hot_swap_on_idle_instance_updates_metamodel() {
        let events = EventBus::new();
        let node_catalog = InMemoryNodeCatalog::new(events.clone());
        let pool = NodeInstancePool::new(noop_factory(), &events);

        let created = node_catalog.create(llm_node_metamodel("n1")).await.unwrap();
        let instance = pool.get_or_create(&created).await.unwrap();
        let original_generation = instance.read().await.generation;

        let mut minor = created.clone();
        minor.version = created.version.bump_minor();
        let updated = node_catalog.update(created.id, minor).await.unwrap();

        // Give the dedicated event-bus worker and this pool's subscriber a
        // moment to process the published event.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(instance.read().await.metamodel.version, updated.version);
        assert_ne!(instance.read().await.generation, original_generation);
    }
}
