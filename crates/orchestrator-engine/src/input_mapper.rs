//! # InputMapper (§4.9)
//!
//! Resolves the intent-extracted variable map plus the original user request
//! into a single `portPath -> value` map that satisfies every entry node's
//! required input ports. Grounded on the same structured-completion pattern
//! as [`crate::port_adapter::PortAdapter`], generalized from a source/target
//! port pairing to a many-entry-node satisfiability problem.

use std::collections::BTreeMap;

use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::metamodel::NodeMetamodel;
use orchestrator_core::ports::PortValue;

use crate::llm_client::{LlmCallParams, LlmClient};

/// A required input port an entry node still needs, identified by the
/// dot-path it is addressed at (`workflowNodeId.portKey`).
pub struct RequiredPort<'a> {
    pub port_path: String,
    pub node: &'a NodeMetamodel,
    pub port_key: String,
}

/// Outcome of a [`InputMapper::map_inputs`] call: the resolved bindings plus
/// whether the LLM call was skipped because the variables already
/// trivially satisfied every required port (§4.9, feeds
/// [`orchestrator_core::observability::InputMappingReport::short_circuited`]).
pub struct MappingOutcome {
    pub bindings: BTreeMap<String, PortValue>,
    pub short_circuited: bool,
    pub token_usage: Option<orchestrator_core::ai::tokens::TokenUsage>,
}

pub struct InputMapper<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> InputMapper<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    /// `mapInputs(variables, userRequest, entryNodeRequiredPorts)` (§4.9).
    /// `variables` is the intent detector's extracted variable map (already
    /// `UPPER_SNAKE_CASE`-normalized, §4.10 step 4). Returns `portPath ->
    /// value`, or `Err(InputMappingImpossible)` when no binding satisfies
    /// every required port.
    pub async fn map_inputs(
        &self,
        variables: &BTreeMap<String, PortValue>,
        user_request: &str,
        required_ports: &[RequiredPort<'_>],
    ) -> Result<MappingOutcome> {
        if required_ports.is_empty() {
            return Ok(MappingOutcome { bindings: BTreeMap::new(), short_circuited: true, token_usage: None });
        }

        if let Some(trivial) = trivial_bindings(variables, required_ports) {
            return Ok(MappingOutcome { bindings: trivial, short_circuited: true, token_usage: None });
        }

        let prompt = build_prompt(variables, user_request, required_ports);
        let params = LlmCallParams { model: "input-mapper".to_string(), temperature: 0.0 };
        let completion = self.llm.structured_completion(&prompt, &params).await?;
        let bindings = parse_bindings(&completion.value)?;

        validate_satisfies_all(required_ports, &bindings)?;
        Ok(MappingOutcome { bindings, short_circuited: false, token_usage: Some(completion.usage) })
    }
}

/// Short-circuit (§4.9 "already all satisfiable with trivial bindings"):
/// every required port's key, matched case-insensitively against a variable
/// key, is present. Values are copied verbatim — no invention.
fn trivial_bindings(
    variables: &BTreeMap<String, PortValue>,
    required_ports: &[RequiredPort<'_>],
) -> Option<BTreeMap<String, PortValue>> {
    let mut bindings = BTreeMap::new();
    for required in required_ports {
        let key = required.port_key.to_uppercase();
        let value = variables.get(&key)?;
        bindings.insert(required.port_path.clone(), value.clone());
    }
    Some(bindings)
}

fn build_prompt(
    variables: &BTreeMap<String, PortValue>,
    user_request: &str,
    required_ports: &[RequiredPort<'_>],
) -> String {
    let variables_json = serde_json::to_value(variables).unwrap_or(serde_json::Value::Null);
    let required_json: Vec<serde_json::Value> = required_ports
        .iter()
        .map(|r| {
            serde_json::json!({
                "portPath": r.port_path,
                "node": r.node.name,
                "portKey": r.port_key,
            })
        })
        .collect();
    format!(
        "Given the extracted variables {} and the original user request {:?}, \
         produce a JSON object {{\"bindings\": {{\"portPath\": value, ...}}}} that assigns \
         a value to every required port in {}. Preserve variable values verbatim; do not \
         invent data not present in the variables or the request.",
        variables_json,
        user_request,
        serde_json::Value::Array(required_json),
    )
}

fn parse_bindings(value: &serde_json::Value) -> Result<BTreeMap<String, PortValue>> {
    if value.is_null() {
        return Err(OrchestratorError::InputMappingImpossible {
            reason: "input mapper returned null".to_string(),
        });
    }
    let bindings = value.get("bindings").ok_or_else(|| OrchestratorError::InputMappingImpossible {
        reason: "input mapper response missing 'bindings'".to_string(),
    })?;
    let map = bindings.as_object().ok_or_else(|| OrchestratorError::InputMappingImpossible {
        reason: "input mapper 'bindings' is not an object".to_string(),
    })?;

    let mut result = BTreeMap::new();
    for (path, value) in map {
        let parsed: PortValue = serde_json::from_value(value.clone())
            .map_err(|e| OrchestratorError::InputMappingImpossible { reason: e.to_string() })?;
        result.insert(path.clone(), parsed);
    }
    Ok(result)
}

/// Post-condition (§4.9): re-check every required port of every entry node
/// against the resulting bindings using `PortSchema::is_valid_value`.
fn validate_satisfies_all(
    required_ports: &[RequiredPort<'_>],
    bindings: &BTreeMap<String, PortValue>,
) -> Result<()> {
    for required in required_ports {
        let port = required
            .node
            .input_ports
            .iter()
            .find(|p| p.key == required.port_key)
            .ok_or_else(|| OrchestratorError::InputMappingImpossible {
                reason: format!("port '{}' not found on node '{}'", required.port_key, required.node.name),
            })?;
        let value = bindings.get(&required.port_path).unwrap_or(&PortValue::Null);
        if !port.schema.is_valid_value(value) {
            return Err(OrchestratorError::InputMappingImpossible {
                reason: format!("binding for '{}' does not satisfy its port schema", required.port_path),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{MockLlmClient, StructuredCompletion};
    use crate::testing::llm_node_metamodel;
    use orchestrator_core::ai::tokens::TokenUsage;
    use serde_json::json;

    #[tokio::test]
    async fn map_inputs_returns_empty_for_no_required_ports() {
        let llm = MockLlmClient::new();
        let mapper = InputMapper::new(&llm);
        let result = mapper.map_inputs(&BTreeMap::new(), "hello", &[]).await.unwrap();
        assert!(result.bindings.is_empty());
        assert!(result.short_circuited);
    }

    #[tokio::test]
    async fn map_inputs_short_circuits_on_trivial_match() {
        let llm = MockLlmClient::new(); // no expectations: must not be called
        let node = llm_node_metamodel("start");
        let mut variables = BTreeMap::new();
        variables.insert("PROMPT".to_string(), PortValue::String("hi".to_string()));

        let required = vec![RequiredPort {
            port_path: "start.prompt".to_string(),
            node: &node,
            port_key: "prompt".to_string(),
        }];

        let mapper = InputMapper::new(&llm);
        let result = mapper.map_inputs(&variables, "hi there", &required).await.unwrap();
        assert!(result.short_circuited);
        assert_eq!(result.bindings.get("start.prompt"), Some(&PortValue::String("hi".to_string())));
    }

    #[tokio::test]
    async fn map_inputs_falls_back_to_llm_when_not_trivially_satisfiable() {
        let mut llm = MockLlmClient::new();
        llm.expect_structured_completion().returning(|_, _| {
            Ok(StructuredCompletion {
                value: json!({"bindings": {"start.prompt": "reconstructed prompt"}}),
                usage: TokenUsage::new(10, 5),
            })
        });

        let node = llm_node_metamodel("start");
        let required = vec![RequiredPort {
            port_path: "start.prompt".to_string(),
            node: &node,
            port_key: "prompt".to_string(),
        }];

        let mapper = InputMapper::new(&llm);
        let result = mapper.map_inputs(&BTreeMap::new(), "book a flight", &required).await.unwrap();
        assert!(!result.short_circuited);
        assert_eq!(
            result.bindings.get("start.prompt"),
            Some(&PortValue::String("reconstructed prompt".to_string()))
        );
    }

    #[tokio::test]
    async fn map_inputs_rejects_binding_that_fails_schema_validation() {
        let mut llm = MockLlmClient::new();
        llm.expect_structured_completion().returning(|_, _| {
            Ok(StructuredCompletion { value: json!({"bindings": {}}), usage: TokenUsage::new(1, 1) })
        });

        let node = llm_node_metamodel("start");
        let required = vec![RequiredPort {
            port_path: "start.prompt".to_string(),
            node: &node,
            port_key: "prompt".to_string(),
        }];

        let mapper = InputMapper::new(&llm);
        let result = mapper.map_inputs(&BTreeMap::new(), "book a flight", &required).await;
        assert!(matches!(result, Err(OrchestratorError::InputMappingImpossible { .. })));
    }
}
