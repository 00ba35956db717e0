//! Deterministic stand-in embedding function.
//!
//! The real embedding model is an out-of-scope external collaborator (spec
//! §1): node/intent metamodels carry a dense `embedding: Vec<f32>` derived
//! from `name + type + description + port keys` (§3), but what actually
//! produces that vector is the embeddings node / embedding service. For the
//! in-memory catalog to be useful standalone (tests, running without a real
//! embedding backend), this module hashes the same textual fields into a
//! fixed-width vector with the same *shape* contract any real embedder would
//! satisfy: stable for identical input, sensitive to any field change.

use orchestrator_core::metamodel::{IntentMetamodel, NodeMetamodel};

const DIMENSIONS: usize = 32;

/// Hashes `text` into a pseudo-embedding of [`DIMENSIONS`] floats in
/// `[-1.0, 1.0]`. Not a real semantic embedding — purely a deterministic
/// placeholder so `hybrid_search`'s vector-scoring stage has something
/// reproducible to operate on in the absence of a real embedding backend.
fn hash_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMENSIONS];
    let mut state: u64 = 0xcbf29ce484222325; // FNV offset basis
    for (i, byte) in text.bytes().enumerate() {
        state ^= byte as u64;
        state = state.wrapping_mul(0x100000001b3); // FNV prime
        let slot = i % DIMENSIONS;
        let signed = ((state % 2000) as f32 - 1000.0) / 1000.0;
        vector[slot] += signed;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Derives a node's embedding from `name + type + description + port keys`,
/// per spec §3.
pub fn compute_node_embedding(node: &NodeMetamodel) -> Vec<f32> {
    let mut text = format!("{}|{:?}|{}", node.name, node.node_type, node.description);
    for port in node.input_ports.iter().chain(node.output_ports.iter()) {
        text.push('|');
        text.push_str(&port.key);
    }
    hash_embedding(&text)
}

/// Derives an intent's embedding from its name and description.
pub fn compute_intent_embedding(intent: &IntentMetamodel) -> Vec<f32> {
    hash_embedding(&format!("{}|{}", intent.name, intent.description))
}

/// Embeds free-form query text (a user utterance, a search query) with the
/// same deterministic scheme used for stored metamodel embeddings, so
/// vector-search cosine similarity is comparing like with like.
pub fn compute_query_embedding(text: &str) -> Vec<f32> {
    hash_embedding(text)
}

/// Cosine similarity between two embeddings of equal length; `0.0` if
/// either is empty or the dimensions disagree.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_yields_identical_embedding() {
        assert_eq!(hash_embedding("hello"), hash_embedding("hello"));
    }

    #[test]
    fn different_text_yields_different_embedding() {
        assert_ne!(hash_embedding("hello"), hash_embedding("goodbye"));
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = hash_embedding("same vector");
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }
}
