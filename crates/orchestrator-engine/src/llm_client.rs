//! # LLM bridge (§6)
//!
//! The out-of-scope LLM client used by intent detection, input mapping,
//! port adaptation, and concrete LLM/embeddings node processing. Three
//! structured-output roles plus two free-form node capabilities, all
//! returning token usage (§6 "The bridge MUST return token usage").
//!
//! Shaped like a `nodes::agent::ModelInstance` trait: one trait behind which
//! every provider (OpenAI, Azure OpenAI, Anthropic, Bedrock) hides,
//! parameterized per call rather than per client so a single `LlmClient` can
//! serve nodes bound to different providers/models.

use async_trait::async_trait;
use orchestrator_core::error::Result;

use orchestrator_core::ai::tokens::TokenUsage;

/// Parameters threaded through a structured-output call (§6).
#[derive(Debug, Clone)]
pub struct LlmCallParams {
    pub model: String,
    pub temperature: f64,
}

/// Result of a structured-output call: the parsed JSON payload plus the
/// token usage the bridge is required to report.
#[derive(Debug, Clone)]
pub struct StructuredCompletion {
    pub value: serde_json::Value,
    pub usage: TokenUsage,
}

/// Seam for the out-of-scope LLM provider bridge.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait LlmClient: Send + Sync {
    /// A structured-output call: `prompt` describes the task and the
    /// expected JSON shape; the implementation is responsible for getting
    /// the provider to emit parseable JSON (function-calling / JSON mode /
    /// grammar-constrained decoding are all valid strategies — out of
    /// scope here).
    async fn structured_completion(
        &self,
        prompt: &str,
        params: &LlmCallParams,
    ) -> Result<StructuredCompletion>;

    /// Free-form text completion, used by [`crate::instance::LlmNode`].
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Embedding generation, used by [`crate::instance::EmbeddingsNode`] and
    /// by intent detection's vector-search step.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
