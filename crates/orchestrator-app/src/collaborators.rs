//! Concrete HTTP-backed [`RestCaller`] and [`VectorSearcher`] collaborators.
//!
//! Both seams are declared out of scope for the engine crate (spec §1): a
//! REST tool node's actual endpoint and a vector-DB's actual driver are
//! named as collaborators, not implemented. These are the composition
//! root's stand-ins, built the same way as [`crate::llm::HttpLlmClient`] —
//! a thin `reqwest` client reading the call's shape off the execution
//! context's ports, since [`RestCaller::call`]/[`VectorSearcher::search`]
//! carry no metamodel reference of their own.

use std::time::Duration;

use async_trait::async_trait;
use orchestrator_core::context::ExecutionContext;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::ports::PortValue;
use orchestrator_engine::instance::{RestCaller, RestResponse, VectorSearcher};

pub struct HttpRestCaller {
    http: reqwest::Client,
}

impl HttpRestCaller {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("orchestrator-app/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }
}

#[async_trait]
impl RestCaller for HttpRestCaller {
    async fn call(&self, ctx: &ExecutionContext) -> Result<RestResponse> {
        let uri = ctx
            .get("uri")
            .and_then(PortValue::as_str)
            .ok_or_else(|| OrchestratorError::validation_error("REST node has no 'uri' bound in context"))?;
        let method = ctx.get("method").and_then(PortValue::as_str).unwrap_or("GET").to_uppercase();
        let body = ctx.get("req_full_body").cloned().unwrap_or(PortValue::Null);

        let mut request = self.http.request(
            method.parse().map_err(|_| OrchestratorError::validation_error(format!("invalid HTTP method {method}")))?,
            uri,
        );
        if !body.is_null() {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OrchestratorError::validation_error(format!("REST call failed: {e}")))?;
        let status = response.status().as_u16() as i64;
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        let body = serde_json::from_value(body).unwrap_or(PortValue::Null);

        Ok(RestResponse { status, body })
    }
}

/// Calls an HTTP vector-search proxy (e.g. a Qdrant/pgvector REST front
/// end) that accepts `{"vector": [...]}`` and returns `{"results": [...]}`.
pub struct HttpVectorSearcher {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpVectorSearcher {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("orchestrator-app/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, endpoint }
    }
}

#[async_trait]
impl VectorSearcher for HttpVectorSearcher {
    async fn search(&self, vector: &[f32]) -> Result<Vec<PortValue>> {
        let response: serde_json::Value = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({"vector": vector}))
            .send()
            .await
            .map_err(|e| OrchestratorError::SearchError { message: e.to_string() })?
            .error_for_status()
            .map_err(|e| OrchestratorError::SearchError { message: e.to_string() })?
            .json()
            .await
            .map_err(|e| OrchestratorError::SearchError { message: e.to_string() })?;

        let results = response
            .get("results")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(results.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect())
    }
}
