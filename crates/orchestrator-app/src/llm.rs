//! Concrete HTTP-backed [`LlmClient`] for the composition root.
//!
//! The engine layer treats the LLM provider as an out-of-scope collaborator
//! (spec §1/§6): it only needs something that turns a prompt into parseable
//! JSON (or text, or an embedding) and reports token usage. This talks to
//! any OpenAI-compatible `/chat/completions` + `/embeddings` surface, using
//! the JSON response-format mode to satisfy `structured_completion`'s
//! "gets the provider to emit parseable JSON" contract.

use std::time::Duration;

use async_trait::async_trait;
use orchestrator_core::ai::tokens::TokenUsage;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_engine::llm_client::{LlmCallParams, LlmClient, StructuredCompletion};
use serde_json::json;

/// Connection settings for the chat-completions/embeddings endpoint.
#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub embedding_model: String,
    pub timeout: Duration,
}

pub struct HttpLlmClient {
    http: reqwest::Client,
    config: HttpLlmConfig,
}

impl HttpLlmClient {
    pub fn new(config: HttpLlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("orchestrator-app/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn chat(&self, prompt: &str, params: &LlmCallParams, json_mode: bool) -> Result<(String, TokenUsage)> {
        let mut body = json!({
            "model": params.model,
            "temperature": params.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::LLMError { message: e.to_string() })?
            .error_for_status()
            .map_err(|e| OrchestratorError::LLMError { message: e.to_string() })?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| OrchestratorError::LLMError { message: e.to_string() })?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| OrchestratorError::LLMError {
                message: "chat completion response carried no message content".to_string(),
            })?
            .to_string();

        let usage = TokenUsage::new(
            response["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            response["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        );

        Ok((content, usage))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn structured_completion(&self, prompt: &str, params: &LlmCallParams) -> Result<StructuredCompletion> {
        let (content, usage) = self.chat(prompt, params, true).await?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        Ok(StructuredCompletion { value, usage })
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let params = LlmCallParams { model: "default".to_string(), temperature: 0.7 };
        let (content, _usage) = self.chat(prompt, &params, false).await?;
        Ok(content)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(self.endpoint("embeddings"))
            .bearer_auth(&self.config.api_key)
            .json(&json!({"model": self.config.embedding_model, "input": text}))
            .send()
            .await
            .map_err(|e| OrchestratorError::LLMError { message: e.to_string() })?
            .error_for_status()
            .map_err(|e| OrchestratorError::LLMError { message: e.to_string() })?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| OrchestratorError::LLMError { message: e.to_string() })?;

        let vector = response["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| OrchestratorError::LLMError { message: "embeddings response carried no vector".to_string() })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        Ok(vector)
    }
}
