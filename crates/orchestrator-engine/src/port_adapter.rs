//! # PortAdapter (§4.11)
//!
//! LLM-backed repair of missing required node inputs: given the output ports
//! available upstream and the input ports a node still needs, ask the LLM
//! for a `sourcePath -> targetPath` binding map. Side-effect free — the
//! executor performs the actual context mutation and persistence (§4.5).
//! Shaped like the structured-completion call sites in `nodes::agent`,
//! generalized to a fixed request/response shape.

use std::collections::BTreeMap;

use orchestrator_core::ai::tokens::TokenUsage;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::ports::Port;

use crate::llm_client::{LlmCallParams, LlmClient};

/// Result of one `PortAdapter::adapt` call: the learned `sourcePath ->
/// targetPath` bindings (empty means "no mapping needed") plus the token
/// usage the LLM call reported (§6: port adaptation is one of the three
/// LLM-bridge roles required to report usage; zero when no call was made).
pub struct PortAdaptationOutcome {
    pub bindings: BTreeMap<String, String>,
    pub token_usage: TokenUsage,
}

/// `bindings: sourcePath -> targetPath`. Empty means "no mapping needed";
/// the adapter returns `Err` (treated by the caller as *impossible*) when
/// the LLM cannot produce a usable mapping at all.
pub struct PortAdapter<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> PortAdapter<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    pub async fn adapt(&self, sources: &[Port], targets: &[Port]) -> Result<PortAdaptationOutcome> {
        if sources.is_empty() || targets.is_empty() {
            return Ok(PortAdaptationOutcome { bindings: BTreeMap::new(), token_usage: TokenUsage::default() });
        }

        let prompt = build_prompt(sources, targets);
        let params = LlmCallParams { model: "port-adapter".to_string(), temperature: 0.0 };
        let completion = self.llm.structured_completion(&prompt, &params).await?;

        let bindings = parse_bindings(&completion.value)?;
        Ok(PortAdaptationOutcome { bindings, token_usage: completion.usage })
    }
}

fn port_to_json(port: &Port) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert("key".to_string(), serde_json::Value::String(port.key.clone()));
    obj.insert("role".to_string(), serde_json::to_value(&port.role).unwrap_or(serde_json::Value::Null));
    obj.insert("required".to_string(), serde_json::Value::Bool(port.schema.required));
    if let Some(default) = &port.default {
        if let Ok(value) = serde_json::to_value(default) {
            if !value.is_null() {
                obj.insert("default".to_string(), value);
            }
        }
    }
    serde_json::Value::Object(obj)
}

fn build_prompt(sources: &[Port], targets: &[Port]) -> String {
    let source_json: Vec<_> = sources.iter().map(port_to_json).collect();
    let target_json: Vec<_> = targets.iter().map(port_to_json).collect();
    format!(
        "Given the available source ports {} and the required target ports {}, \
         respond with JSON {{\"bindings\": {{\"sourcePath\": \"targetPath\", ...}}}} \
         mapping each source to the target it satisfies. Use an empty object if no \
         mapping applies.",
        serde_json::Value::Array(source_json),
        serde_json::Value::Array(target_json),
    )
}

fn parse_bindings(value: &serde_json::Value) -> Result<BTreeMap<String, String>> {
    if value.is_null() {
        return Err(OrchestratorError::validation_error("port adapter returned no mapping"));
    }
    let bindings = value
        .get("bindings")
        .ok_or_else(|| OrchestratorError::validation_error("port adapter response missing 'bindings'"))?;
    let map = bindings
        .as_object()
        .ok_or_else(|| OrchestratorError::validation_error("port adapter 'bindings' is not an object"))?;

    let mut result = BTreeMap::new();
    for (source, target) in map {
        let target = target
            .as_str()
            .ok_or_else(|| OrchestratorError::validation_error("port adapter binding value is not a string"))?;
        result.insert(source.clone(), target.to_string());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{MockLlmClient, StructuredCompletion};
    use orchestrator_core::ai::tokens::TokenUsage;
    use orchestrator_core::ports::{PortRole, PortSchema, PortSchemaKind};
    use serde_json::json;

    #[tokio::test]
    async fn adapt_returns_empty_for_no_ports() {
        let llm = MockLlmClient::new();
        let adapter = PortAdapter::new(&llm);
        let result = adapter.adapt(&[], &[]).await.unwrap();
        assert!(result.bindings.is_empty());
        assert_eq!(result.token_usage, TokenUsage::default());
    }

    #[tokio::test]
    async fn adapt_parses_bindings_from_llm_response() {
        let mut llm = MockLlmClient::new();
        llm.expect_structured_completion().returning(|_, _| {
            Ok(StructuredCompletion {
                value: json!({"bindings": {"response": "prompt"}}),
                usage: TokenUsage::new(10, 5),
            })
        });

        let adapter = PortAdapter::new(&llm);
        let source = Port::new("response", PortSchema::required(PortSchemaKind::String), PortRole::Response);
        let target = Port::new("prompt", PortSchema::required(PortSchemaKind::String), PortRole::UserPrompt);
        let outcome = adapter.adapt(&[source], &[target]).await.unwrap();

        assert_eq!(outcome.bindings.get("response"), Some(&"prompt".to_string()));
        assert_eq!(outcome.token_usage, TokenUsage::new(10, 5));
    }
}
