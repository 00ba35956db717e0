//! Process-level configuration for the CLI entry point.
//!
//! Wraps [`OrchestratorConfig`] (routing, LLM, search, monitoring) with the
//! connection settings the composition root needs but the engine
//! and catalog crates never should: where to reach the chat/embeddings
//! provider, the REST tool timeout, the vector-search proxy endpoint, and
//! where to find the seed file to load at startup.

use std::env;
use std::time::Duration;

use orchestrator_core::config::{ConfigError, ConfigResult, OrchestratorConfig};

use crate::llm::HttpLlmConfig;

/// Everything [`crate::main`] needs to bootstrap a [`crate::orchestrator::WorkflowOrchestrator`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub orchestrator: OrchestratorConfig,
    pub llm: HttpLlmConfig,
    pub rest_timeout: Duration,
    pub vector_search_endpoint: String,
    pub seed_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from the environment, falling back to documented
    /// defaults for everything but the LLM API key.
    pub fn from_env() -> ConfigResult<Self> {
        let orchestrator = OrchestratorConfig::from_env()?;
        orchestrator.validate()?;

        let api_key =
            env::var("LLM_API_KEY").map_err(|_| ConfigError::env_var_not_found("LLM_API_KEY", None))?;
        let base_url = env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let embedding_model =
            env::var("LLM_EMBEDDING_MODEL").unwrap_or_else(|_| "text-embedding-3-small".to_string());

        let llm = HttpLlmConfig {
            base_url,
            api_key,
            embedding_model,
            timeout: Duration::from_secs(orchestrator.llm.timeout_seconds),
        };

        let rest_timeout_seconds = env_parse("REST_TIMEOUT_SECONDS", 30u64)?;
        let vector_search_endpoint =
            env::var("VECTOR_SEARCH_ENDPOINT").unwrap_or_else(|_| "http://localhost:6333/search".to_string());
        let seed_path = env::var("SEED_PATH").ok();

        Ok(Self {
            orchestrator,
            llm,
            rest_timeout: Duration::from_secs(rest_timeout_seconds),
            vector_search_endpoint,
            seed_path,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| ConfigError::parse_error(format!("{key}: {e}"), "environment variable", key)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_to_default_when_unset() {
        assert_eq!(env_parse::<u64>("ORCHESTRATOR_APP_TEST_UNSET_VAR", 42).unwrap(), 42);
    }
}
