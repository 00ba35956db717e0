//! # IntentDetector (§4.10)
//!
//! Resolves a raw user utterance to an intent id, creating a new intent
//! on the fly when the LLM classifier judges the request genuinely novel.
//! Grounded on the same candidate-shortlist-then-LLM-classify shape as
//! [`orchestrator_catalog::search::hybrid_search`], generalized from nodes to
//! intents and from a fixed weighted score to a single vector-search stage
//! (the intent catalog carries no full-text index, §3).

use std::collections::BTreeMap;

use orchestrator_catalog::embedding::{compute_query_embedding, cosine_similarity};
use orchestrator_catalog::intent_catalog::IntentCatalog;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::metamodel::normalize_intent_name;
use orchestrator_core::ports::PortValue;
use serde::Deserialize;
use uuid::Uuid;

use crate::llm_client::{LlmCallParams, LlmClient};

const DEFAULT_CANDIDATE_LIMIT: usize = 10;

/// The LLM classifier's expected response shape (§4.10 step 2), or an
/// explicit absence for incoherent input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifierResponse {
    Detected {
        #[serde(rename = "intentName")]
        intent_name: String,
        #[serde(rename = "intentId")]
        intent_id: Option<Uuid>,
        #[allow(dead_code)]
        confidence: f64,
        #[serde(rename = "isNew")]
        is_new: bool,
        #[serde(rename = "userVariables", default)]
        user_variables: BTreeMap<String, PortValue>,
    },
    Incoherent(Option<serde::de::IgnoredAny>),
}

/// Resolved detection outcome: the intent id (freshly created or existing)
/// plus the normalized user-variable map ready for [`crate::input_mapper::InputMapper`].
pub struct DetectedIntent {
    pub intent_id: Uuid,
    pub intent_name: String,
    pub user_variables: BTreeMap<String, PortValue>,
    pub created_new_intent: bool,
    pub token_usage: orchestrator_core::ai::tokens::TokenUsage,
}

pub struct IntentDetector<'a> {
    llm: &'a dyn LlmClient,
    intents: &'a dyn IntentCatalog,
    candidate_limit: usize,
}

impl<'a> IntentDetector<'a> {
    pub fn new(llm: &'a dyn LlmClient, intents: &'a dyn IntentCatalog) -> Self {
        Self { llm, intents, candidate_limit: DEFAULT_CANDIDATE_LIMIT }
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    /// `detectIntent(utterance)` (§4.10).
    pub async fn detect(&self, utterance: &str) -> Result<DetectedIntent> {
        let candidates = self.shortlist(utterance).await?;
        let prompt = build_prompt(utterance, &candidates);
        let params = LlmCallParams { model: "intent-classifier".to_string(), temperature: 0.0 };
        let completion = self.llm.structured_completion(&prompt, &params).await?;

        let response: ClassifierResponse = serde_json::from_value(completion.value)?;

        let ClassifierResponse::Detected { intent_name, intent_id, is_new, user_variables, .. } = response else {
            return Err(OrchestratorError::IntentUnresolved { utterance: utterance.to_string() });
        };

        let user_variables = normalize_variable_keys(user_variables);

        // Step 3: reconcile a returned `intentId` against the shortlist. A
        // candidate-less id, or a classifier that already flagged `isNew`,
        // both fall through to the name-match fallback before minting a
        // brand-new intent.
        let (resolved_id, resolved_name) = match intent_id {
            Some(id) if candidates.iter().any(|c| c.0 == id) => (Some(id), intent_name),
            Some(_) => match self.intents.find_by_name(&intent_name).await? {
                Some(existing) => (Some(existing.id), existing.name),
                None => (None, normalize_intent_name(&intent_name)),
            },
            None if is_new => (None, normalize_intent_name(&intent_name)),
            None => match self.intents.find_by_name(&intent_name).await? {
                Some(existing) => (Some(existing.id), existing.name),
                None => (None, normalize_intent_name(&intent_name)),
            },
        };

        let (intent_id, created_new_intent) = match resolved_id {
            Some(id) => (id, false),
            None => {
                let created = self
                    .intents
                    .create(resolved_name.clone(), format!("auto-detected from: {utterance}"), true)
                    .await?;
                (created.id, true)
            }
        };

        Ok(DetectedIntent {
            intent_id,
            intent_name: resolved_name,
            user_variables,
            created_new_intent,
            token_usage: completion.usage,
        })
    }

    async fn shortlist(&self, utterance: &str) -> Result<Vec<(Uuid, String, f64)>> {
        let query_embedding = compute_query_embedding(utterance);
        let all = self.intents.find_all().await?;

        let mut scored: Vec<(Uuid, String, f64)> = all
            .iter()
            .map(|intent| (intent.id, intent.name.clone(), cosine_similarity(&query_embedding, &intent.embedding)))
            .collect();
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.candidate_limit);
        Ok(scored)
    }
}

fn normalize_variable_keys(variables: BTreeMap<String, PortValue>) -> BTreeMap<String, PortValue> {
    variables.into_iter().map(|(k, v)| (k.to_uppercase().replace(' ', "_"), v)).collect()
}

fn build_prompt(utterance: &str, candidates: &[(Uuid, String, f64)]) -> String {
    let candidate_json: Vec<_> = candidates
        .iter()
        .map(|(id, name, score)| serde_json::json!({"intentId": id, "intentName": name, "score": score}))
        .collect();
    format!(
        "Classify the following user request against these candidate intents {}. \
         User request: {:?}. Respond with JSON {{\"intentName\": string, \"intentId\": string|null, \
         \"confidence\": number, \"isNew\": bool, \"userVariables\": object}}, or the literal \
         JSON null if the request is incoherent.",
        serde_json::Value::Array(candidate_json),
        utterance,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{MockLlmClient, StructuredCompletion};
    use orchestrator_catalog::intent_catalog::InMemoryIntentCatalog;
    use orchestrator_core::ai::tokens::TokenUsage;
    use serde_json::json;

    #[tokio::test]
    async fn detect_reconciles_known_candidate_id() {
        let intents = InMemoryIntentCatalog::new();
        let created = intents.create("book a flight".to_string(), String::new(), false).await.unwrap();

        let mut llm = MockLlmClient::new();
        let id = created.id;
        llm.expect_structured_completion().returning(move |_, _| {
            Ok(StructuredCompletion {
                value: json!({
                    "intentName": "BOOK_A_FLIGHT",
                    "intentId": id,
                    "confidence": 0.95,
                    "isNew": false,
                    "userVariables": {"destination": "Lisbon"},
                }),
                usage: TokenUsage::new(20, 10),
            })
        });

        let detector = IntentDetector::new(&llm, &intents);
        let detected = detector.detect("book me a flight to Lisbon").await.unwrap();

        assert_eq!(detected.intent_id, created.id);
        assert_eq!(detected.user_variables.get("DESTINATION"), Some(&PortValue::String("Lisbon".to_string())));
        assert!(!detected.created_new_intent);
        assert_eq!(detected.token_usage.total_tokens, 30);
    }

    #[tokio::test]
    async fn detect_creates_new_intent_when_marked_new() {
        let intents = InMemoryIntentCatalog::new();

        let mut llm = MockLlmClient::new();
        llm.expect_structured_completion().returning(|_, _| {
            Ok(StructuredCompletion {
                value: json!({
                    "intentName": "cancel subscription",
                    "intentId": null,
                    "confidence": 0.8,
                    "isNew": true,
                    "userVariables": {},
                }),
                usage: TokenUsage::new(5, 5),
            })
        });

        let detector = IntentDetector::new(&llm, &intents);
        let detected = detector.detect("please cancel my subscription").await.unwrap();

        assert_eq!(detected.intent_name, "CANCEL_SUBSCRIPTION");
        assert!(detected.created_new_intent);
        let all = intents.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].ai_generated);
    }

    #[tokio::test]
    async fn detect_fails_on_incoherent_input() {
        let intents = InMemoryIntentCatalog::new();
        let mut llm = MockLlmClient::new();
        llm.expect_structured_completion()
            .returning(|_, _| Ok(StructuredCompletion { value: json!(null), usage: TokenUsage::new(1, 1) }));

        let detector = IntentDetector::new(&llm, &intents);
        let result = detector.detect("asdkjashdkjashd").await;
        assert!(matches!(result, Err(OrchestratorError::IntentUnresolved { .. })));
    }
}
