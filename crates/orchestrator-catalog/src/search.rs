//! # Hybrid search pipeline (§6)
//!
//! [`NodeSearchIndex`] is the seam for the out-of-scope vector/full-text
//! search engine: it returns raw per-document scores from each stage. The
//! combination, filtering, and limiting pipeline itself — `score = 0.7 *
//! vectorScore + 0.3 * fulltextScore`, grouped by document id with `max` of
//! each component, filtered by `onlyEnabled`/`onlyLatest`/`types`, sorted
//! descending, limited to `F` — is in scope and lives here.

use std::collections::HashMap;

use async_trait::async_trait;
use orchestrator_core::error::Result;
use orchestrator_core::metamodel::{NodeMetamodel, NodeType};
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::node_catalog::NodeCatalog;

/// Seam for the out-of-scope search engine's per-collection indices. An
/// implementation need not merge or filter anything — that is the
/// `hybrid_search` pipeline's job.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait NodeSearchIndex: Send + Sync {
    /// Top-`top_s` document ids by raw vector (dense embedding) score,
    /// descending.
    async fn vector_search(&self, query_embedding: &[f32], top_s: usize) -> Result<Vec<(Uuid, f64)>>;
    /// Top-`top_s` document ids by raw full-text score, descending.
    async fn fulltext_search(&self, query_text: &str, top_s: usize) -> Result<Vec<(Uuid, f64)>>;
}

/// Filters applied after the two search stages are merged (§6).
#[derive(Debug, Clone)]
pub struct SearchFilter {
    /// Accepted but currently a no-op: `NodeMetamodel` (§3) carries no
    /// `enabled` flag of its own (unlike `WorkflowMetamodel`), so there is
    /// nothing to filter on. Kept on the struct for interface fidelity with
    /// §6 and to absorb a future node-level enabled flag without an API
    /// break. See DESIGN.md.
    pub only_enabled: bool,
    pub only_latest: bool,
    pub types: Option<Vec<NodeType>>,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self { only_enabled: true, only_latest: true, types: None }
    }
}

/// A node plus its component and combined scores from one `hybrid_search`
/// call.
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node: NodeMetamodel,
    pub vector_score: f64,
    pub fulltext_score: f64,
    pub combined_score: f64,
}

const VECTOR_WEIGHT: f64 = 0.7;
const FULLTEXT_WEIGHT: f64 = 0.3;

/// Runs the full hybrid-search pipeline from spec §6 against whatever
/// `index` returns, applying `filter` and truncating to `final_limit`.
pub async fn hybrid_search(
    index: &dyn NodeSearchIndex,
    catalog: &dyn NodeCatalog,
    query_embedding: &[f32],
    query_text: &str,
    filter: &SearchFilter,
    stage_candidates: usize,
    final_limit: usize,
) -> Result<Vec<ScoredNode>> {
    let vector_hits = index.vector_search(query_embedding, stage_candidates).await?;
    let fulltext_hits = index.fulltext_search(query_text, stage_candidates).await?;

    let mut vector_scores: HashMap<Uuid, f64> = HashMap::new();
    for (id, score) in vector_hits {
        vector_scores.entry(id).and_modify(|s| *s = s.max(score)).or_insert(score);
    }
    let mut fulltext_scores: HashMap<Uuid, f64> = HashMap::new();
    for (id, score) in fulltext_hits {
        fulltext_scores.entry(id).and_modify(|s| *s = s.max(score)).or_insert(score);
    }

    let mut doc_ids: Vec<Uuid> = vector_scores.keys().chain(fulltext_scores.keys()).copied().collect();
    doc_ids.sort();
    doc_ids.dedup();

    let mut scored = Vec::new();
    for id in doc_ids {
        let Some(node) = catalog.find_by_id(id).await? else { continue };
        if filter.only_latest && !node.is_latest {
            continue;
        }
        if let Some(types) = &filter.types {
            if !types.contains(&node.node_type) {
                continue;
            }
        }
        let vector_score = vector_scores.get(&id).copied().unwrap_or(0.0);
        let fulltext_score = fulltext_scores.get(&id).copied().unwrap_or(0.0);
        let combined_score = VECTOR_WEIGHT * vector_score + FULLTEXT_WEIGHT * fulltext_score;
        scored.push(ScoredNode { node, vector_score, fulltext_score, combined_score });
    }

    scored.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap());
    scored.truncate(final_limit);
    Ok(scored)
}

/// In-memory `NodeSearchIndex` that scans the catalog directly: cosine
/// similarity against each node's stored embedding for the vector stage,
/// substring/keyword overlap against name/description/qualitative
/// descriptor for the full-text stage. Stands in for the out-of-scope
/// search engine the same way `InMemoryNodeCatalog` stands in for the
/// out-of-scope durable store.
pub struct InMemoryNodeSearchIndex<'a> {
    catalog: &'a dyn NodeCatalog,
}

impl<'a> InMemoryNodeSearchIndex<'a> {
    pub fn new(catalog: &'a dyn NodeCatalog) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl<'a> NodeSearchIndex for InMemoryNodeSearchIndex<'a> {
    async fn vector_search(&self, query_embedding: &[f32], top_s: usize) -> Result<Vec<(Uuid, f64)>> {
        let all = self.catalog.find_all().await?;
        let mut scored: Vec<(Uuid, f64)> = all
            .iter()
            .map(|n| (n.id, cosine_similarity(query_embedding, &n.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored.truncate(top_s);
        Ok(scored)
    }

    async fn fulltext_search(&self, query_text: &str, top_s: usize) -> Result<Vec<(Uuid, f64)>> {
        let needle = query_text.to_lowercase();
        let terms: Vec<&str> = needle.split_whitespace().collect();
        let all = self.catalog.find_all().await?;
        let mut scored: Vec<(Uuid, f64)> = all
            .iter()
            .map(|n| {
                let haystack = format!(
                    "{} {} {}",
                    n.name.to_lowercase(),
                    n.description.to_lowercase(),
                    n.qualitative_descriptor.to_lowercase()
                );
                let matches = terms.iter().filter(|t| haystack.contains(**t)).count();
                (n.id, matches as f64)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored.truncate(top_s);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;
    use crate::node_catalog::InMemoryNodeCatalog;
    use crate::testing::llm_node_metamodel;

    #[tokio::test]
    async fn hybrid_search_combines_and_limits() {
        let catalog = InMemoryNodeCatalog::new(EventBus::new());
        let mut weather = llm_node_metamodel("weather_lookup");
        weather.description = "fetches current weather conditions".to_string();
        let weather = catalog.create(weather).await.unwrap();

        let mut booking = llm_node_metamodel("flight_booking");
        booking.description = "books a flight reservation".to_string();
        catalog.create(booking).await.unwrap();

        let index = InMemoryNodeSearchIndex::new(&catalog);
        let filter = SearchFilter::default();
        let results = hybrid_search(&index, &catalog, &weather.embedding, "weather", &filter, 20, 10)
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].node.id, weather.id);
        assert!(results[0].combined_score >= results.last().unwrap().combined_score);
    }

    #[tokio::test]
    async fn only_latest_filter_excludes_superseded_versions() {
        let catalog = InMemoryNodeCatalog::new(EventBus::new());
        let created = catalog.create(llm_node_metamodel("n1")).await.unwrap();
        let mut major = created.clone();
        major.version = created.version.bump_major();
        catalog.update(created.id, major).await.unwrap();

        let index = InMemoryNodeSearchIndex::new(&catalog);
        let filter = SearchFilter::default();
        let results =
            hybrid_search(&index, &catalog, &created.embedding, "n1", &filter, 20, 10).await.unwrap();

        assert!(results.iter().all(|r| r.node.is_latest));
    }
}
