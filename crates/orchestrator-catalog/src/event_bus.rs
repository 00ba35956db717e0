//! # In-process metamodel event bus
//!
//! The knowledge layer notifies the operational layer's instance pools of
//! metamodel changes through two event shapes (§6): `NodeMetamodelUpdated`
//! and `WorkflowMetamodelUpdated`, each carrying the full new metamodel.
//!
//! Per the design notes (§9 "Global event bus"), this is not a process-wide
//! singleton: an [`EventBus`] is constructed once and its subscriptions are
//! handed to pools explicitly at construction time. Publishing goes through
//! a dedicated background task rather than calling subscriber callbacks
//! inline, so a catalog CRUD call's publish doesn't re-enter the caller's
//! own stack through a pool's event handler.

use orchestrator_core::metamodel::{NodeMetamodel, WorkflowMetamodel};
use tokio::sync::{broadcast, mpsc};

/// The two metamodel-updated event shapes from spec §6, each carrying the
/// full new metamodel (not a diff).
#[derive(Debug, Clone)]
pub enum CatalogEvent {
    NodeMetamodelUpdated {
        metamodel_id: uuid::Uuid,
        updated_metamodel: NodeMetamodel,
    },
    WorkflowMetamodelUpdated {
        metamodel_id: uuid::Uuid,
        updated_metamodel: WorkflowMetamodel,
    },
}

/// In-process event bus. Publishers hand events to a dedicated worker task
/// via an mpsc channel; the worker re-broadcasts them to every subscriber,
/// preserving publisher order (spec §5 "Ordering guarantees").
#[derive(Clone)]
pub struct EventBus {
    publish_tx: mpsc::Sender<CatalogEvent>,
    broadcast_tx: broadcast::Sender<CatalogEvent>,
}

impl EventBus {
    /// Spawns the dedicated delivery worker and returns a handle to it.
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        let (publish_tx, mut publish_rx) = mpsc::channel::<CatalogEvent>(256);
        let (broadcast_tx, _) = broadcast::channel(256);

        let worker_tx = broadcast_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = publish_rx.recv().await {
                // No subscribers is not an error: a pool may not yet exist
                // at boot, or all of them may have been dropped in tests.
                let _ = worker_tx.send(event);
            }
        });

        Self { publish_tx, broadcast_tx }
    }

    /// Publish an event. Delivery happens asynchronously on the dedicated
    /// worker task; this only enqueues.
    pub async fn publish(&self, event: CatalogEvent) {
        if self.publish_tx.send(event).await.is_err() {
            tracing::warn!("event bus worker has shut down; event dropped");
        }
    }

    /// Subscribe to the event stream. Each subscriber receives every event
    /// published after this call, in publisher order.
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.broadcast_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::llm_node_metamodel;

    #[tokio::test]
    async fn subscribers_receive_events_in_publish_order() {
        let bus = EventBus::new();
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let node_a = llm_node_metamodel("a");
        let node_b = llm_node_metamodel("b");

        bus.publish(CatalogEvent::NodeMetamodelUpdated {
            metamodel_id: node_a.id,
            updated_metamodel: node_a.clone(),
        })
        .await;
        bus.publish(CatalogEvent::NodeMetamodelUpdated {
            metamodel_id: node_b.id,
            updated_metamodel: node_b.clone(),
        })
        .await;

        let first = sub1.recv().await.unwrap();
        let second = sub1.recv().await.unwrap();
        match (first, second) {
            (
                CatalogEvent::NodeMetamodelUpdated { metamodel_id: id1, .. },
                CatalogEvent::NodeMetamodelUpdated { metamodel_id: id2, .. },
            ) => {
                assert_eq!(id1, node_a.id);
                assert_eq!(id2, node_b.id);
            }
            _ => panic!("unexpected event shape"),
        }

        // A second subscriber independently sees the same two events.
        assert!(sub2.recv().await.is_ok());
        assert!(sub2.recv().await.is_ok());
    }
}
