//! # Routing and temperature sampling (§4.8)
//!
//! `route_workflow_request(intent_id)` asks the live workflow instance pool
//! for the top-scored instances handling an intent, falling back to the
//! catalog when no live instance exists yet. The shortlist is resolved to a
//! single candidate by temperature sampling rather than always taking the
//! argmax, so a workflow catalog with several plausible handlers for the
//! same intent doesn't ossify onto whichever was created first. Generalizes
//! a `nodes::agent` provider-selection heuristic into explicit
//! softmax-over-score sampling (§4.8).

use std::sync::Arc;

use orchestrator_catalog::node_catalog::NodeCatalog;
use orchestrator_catalog::workflow_catalog::WorkflowCatalog;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::metamodel::WorkflowMetamodel;
use orchestrator_core::observability::RoutingDecision;
use rand::Rng;
use uuid::Uuid;

use crate::pool::WorkflowInstancePool;

/// Sampling parameters (§4.8 defaults: `T=0.8`, `N=5`).
#[derive(Debug, Clone, Copy)]
pub struct SamplingConfig {
    pub temperature: f64,
    pub top_n: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { temperature: 0.8, top_n: 5 }
    }
}

/// Temperature-sample one candidate from a descending-scored list.
/// `w_i = exp((score_i - max_score) / T)`, normalized, sampled. As `T -> 0`
/// this approaches argmax (the first, highest-scored candidate); as
/// `T -> infinity` it approaches a uniform draw. Returns the chosen index
/// and its normalized sampling weight, or `None` for an empty list.
pub fn temperature_sample<R: Rng + ?Sized>(
    scores: &[f64],
    temperature: f64,
    rng: &mut R,
) -> Option<(usize, f64)> {
    if scores.is_empty() {
        return None;
    }
    if scores.len() == 1 {
        return Some((0, 1.0));
    }

    let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = scores.iter().map(|s| ((s - max_score) / temperature).exp()).collect();
    let total: f64 = weights.iter().sum();

    let mut draw = rng.gen_range(0.0..total);
    for (index, weight) in weights.iter().enumerate() {
        if draw < *weight {
            return Some((index, weight / total));
        }
        draw -= weight;
    }
    // Floating-point rounding can leave `draw` just shy of the last slice;
    // fall back to the final candidate rather than returning `None`.
    let last = weights.len() - 1;
    Some((last, weights[last] / total))
}

/// Routes an intent to a live [`orchestrator_core::metamodel::WorkflowMetamodel`] instance, preferring the
/// pool's live instances over a fresh catalog read so any in-flight
/// deprecation/hot-swap state is folded in via `getOrCreate` (§4.3).
pub struct Router<'a> {
    workflow_pool: &'a WorkflowInstancePool,
    workflow_catalog: &'a dyn WorkflowCatalog,
    node_catalog: &'a dyn NodeCatalog,
    config: SamplingConfig,
}

/// Resolved routing outcome: the chosen workflow metamodel plus the
/// decision record for the observability report.
pub struct RoutingResult {
    pub metamodel: Arc<WorkflowMetamodel>,
    pub decision: RoutingDecision,
}

impl<'a> Router<'a> {
    pub fn new(
        workflow_pool: &'a WorkflowInstancePool,
        workflow_catalog: &'a dyn WorkflowCatalog,
        node_catalog: &'a dyn NodeCatalog,
        config: SamplingConfig,
    ) -> Self {
        Self { workflow_pool, workflow_catalog, node_catalog, config }
    }

    /// `routeWorkflowRequest(intentId)` (§4.8): prefer the pool's live
    /// instances (step 1-2) so an in-flight hot-swap/deprecation is folded
    /// in without a catalog read; fall back to the catalog's metamodels
    /// (step 3) only when no live instance yet handles this intent; fail
    /// (step 4) when neither source has a candidate.
    pub async fn route(
        &self,
        intent_id: Uuid,
        intent_name: Option<String>,
    ) -> Result<RoutingResult> {
        let pool_candidates = self.workflow_pool.find_top_n_handling_intent(intent_id, self.config.top_n).await;
        let candidates: Vec<Arc<WorkflowMetamodel>> = if !pool_candidates.is_empty() {
            pool_candidates
        } else {
            self.workflow_catalog
                .find_top_n_handling_intent(intent_id, self.config.top_n)
                .await?
                .into_iter()
                .map(Arc::new)
                .collect()
        };

        if candidates.is_empty() {
            return Err(OrchestratorError::NoWorkflowForIntent {
                intent: intent_name.unwrap_or_else(|| intent_id.to_string()),
            });
        }

        let scores: Vec<f64> = candidates
            .iter()
            .map(|w| w.handles_intent(intent_id).unwrap_or(0.0))
            .collect();

        let (chosen_index, sampling_weight) = {
            let mut rng = rand::thread_rng();
            temperature_sample(&scores, self.config.temperature, &mut rng)
                .expect("candidates list was checked non-empty above")
        };

        let chosen = candidates.into_iter().nth(chosen_index).expect("index within bounds");

        // Fold in any deprecation refresh the instance pool knows about
        // before handing the metamodel back to the caller.
        let instance = self.workflow_pool.get_or_create(&chosen, self.node_catalog).await?;
        let metamodel = instance.read().await.metamodel.clone();

        let decision = RoutingDecision {
            intent_id: Some(intent_id),
            intent_name,
            workflow_id: metamodel.id,
            workflow_version: metamodel.version,
            sampling_weight,
        };

        Ok(RoutingResult { metamodel, decision })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{linear_workflow_metamodel, llm_node_metamodel, noop_factory};
    use orchestrator_catalog::event_bus::EventBus;
    use orchestrator_catalog::node_catalog::InMemoryNodeCatalog;
    use orchestrator_catalog::workflow_catalog::InMemoryWorkflowCatalog;
    use rand::rngs::mock::StepRng;

    #[test]
    fn temperature_sample_returns_none_for_empty_scores() {
        let mut rng = StepRng::new(0, 1);
        assert!(temperature_sample(&[], 0.8, &mut rng).is_none());
    }

    #[test]
    fn temperature_sample_single_candidate_is_certain() {
        let mut rng = StepRng::new(0, 1);
        let (index, weight) = temperature_sample(&[0.5], 0.8, &mut rng).unwrap();
        assert_eq!(index, 0);
        assert_eq!(weight, 1.0);
    }

    #[test]
    fn low_temperature_strongly_favors_highest_score() {
        // A very small temperature makes the softmax sharply peaked: the
        // lowest possible draw (0.0) must select the top-scored candidate.
        let scores = vec![0.9, 0.1];
        let mut rng = StepRng::new(0, 1); // gen_range draws near 0.0 first call
        let (index, _) = temperature_sample(&scores, 0.01, &mut rng).unwrap();
        assert_eq!(index, 0);
    }

    #[tokio::test]
    async fn route_fails_when_no_workflow_handles_intent() {
        let events = EventBus::new();
        let node_catalog = InMemoryNodeCatalog::new(events.clone());
        let workflow_catalog = InMemoryWorkflowCatalog::new(events.clone(), &node_catalog);
        let node_pool = crate::pool::NodeInstancePool::new(noop_factory(), &events);
        let workflow_pool = WorkflowInstancePool::new(node_pool, &events);

        let router = Router::new(&workflow_pool, &workflow_catalog, &node_catalog, SamplingConfig::default());
        let result = router.route(Uuid::new_v4(), None).await;
        assert!(matches!(result, Err(OrchestratorError::NoWorkflowForIntent { .. })));
    }

    #[tokio::test]
    async fn route_resolves_through_instance_pool() {
        let events = EventBus::new();
        let node_catalog = InMemoryNodeCatalog::new(events.clone());
        let start = node_catalog.create(llm_node_metamodel("start")).await.unwrap();
        let end = node_catalog.create(llm_node_metamodel("end")).await.unwrap();

        let workflow_catalog = InMemoryWorkflowCatalog::new(events.clone(), &node_catalog);
        let intent_id = Uuid::new_v4();
        let wf = linear_workflow_metamodel(&start, &end, intent_id, 0.9);
        let created = workflow_catalog.create(wf).await.unwrap();

        let node_pool = crate::pool::NodeInstancePool::new(noop_factory(), &events);
        let workflow_pool = WorkflowInstancePool::new(node_pool, &events);

        let router = Router::new(&workflow_pool, &workflow_catalog, &node_catalog, SamplingConfig::default());
        let result = router.route(intent_id, Some("BOOK_FLIGHT".to_string())).await.unwrap();
        assert_eq!(result.metamodel.id, created.id);
        assert_eq!(result.decision.workflow_id, created.id);
    }

    #[tokio::test]
    async fn route_prefers_pool_candidates_over_catalog_when_present() {
        // §4.8 step 1-2: a live instance already in the pool is consulted
        // before the catalog is ever asked, so a hot-swapped in-memory
        // metamodel pointer wins over whatever the catalog currently holds.
        let events = EventBus::new();
        let node_catalog = InMemoryNodeCatalog::new(events.clone());
        let start = node_catalog.create(llm_node_metamodel("start")).await.unwrap();
        let end = node_catalog.create(llm_node_metamodel("end")).await.unwrap();

        let workflow_catalog = InMemoryWorkflowCatalog::new(events.clone(), &node_catalog);
        let intent_id = Uuid::new_v4();
        let wf = linear_workflow_metamodel(&start, &end, intent_id, 0.9);
        let created = workflow_catalog.create(wf).await.unwrap();

        let node_pool = crate::pool::NodeInstancePool::new(noop_factory(), &events);
        let workflow_pool = WorkflowInstancePool::new(node_pool, &events);
        // Warm the pool before routing: get_or_create registers a pool entry
        // keyed by this workflow's id.
        workflow_pool.get_or_create(&created, &node_catalog).await.unwrap();

        let router = Router::new(&workflow_pool, &workflow_catalog, &node_catalog, SamplingConfig::default());
        let candidates = workflow_pool.find_top_n_handling_intent(intent_id, 5).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, created.id);

        let result = router.route(intent_id, None).await.unwrap();
        assert_eq!(result.metamodel.id, created.id);
    }
}
