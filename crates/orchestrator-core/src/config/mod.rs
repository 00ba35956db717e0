//! Configuration management for the orchestrator
//!
//! Covers the ambient config surfaces named in the expanded specification:
//! routing defaults (temperature, top-N), LLM call timeouts/retries, the
//! vector-search timeout, the per-request time budget, and logging/monitoring.

pub mod error;
pub mod env_utils;
pub mod validation;

// Re-export commonly used types
pub use error::{ConfigError, ConfigResult};

use std::env;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Root configuration for a running orchestrator process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub routing: RoutingConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub monitoring: MonitoringConfig,
    /// Total wall-clock budget for a single `orchestrate()` call (§5).
    pub request_time_budget_seconds: u64,
}

/// Routing and temperature-sampling defaults (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Sampling temperature. `T -> 0` approaches argmax, `T -> infinity`
    /// approaches uniform sampling over candidates.
    pub temperature: f64,
    /// Number of top-scored candidates considered before sampling.
    pub top_n: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { temperature: 0.8, top_n: 5 }
    }
}

/// LLM bridge call configuration (§5: default 30s timeout, one retry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub default_temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self { timeout_seconds: 30, max_retries: 1, default_temperature: 0.2 }
    }
}

/// Vector/hybrid search configuration (§5: 10s timeout; §6: S/F defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub timeout_seconds: u64,
    /// Candidates pulled per stage (vector, full-text) before merging.
    pub stage_candidates: usize,
    /// Final result count after filtering and limiting.
    pub final_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { timeout_seconds: 10, stage_candidates: 20, final_limit: 10 }
    }
}

/// Monitoring and observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub prometheus_enabled: bool,
    pub prometheus_port: u16,
    pub log_level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self { prometheus_enabled: true, prometheus_port: 9090, log_level: "info".to_string() }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            monitoring: MonitoringConfig::default(),
            request_time_budget_seconds: 120,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables, falling back to the
    /// documented defaults for anything unset.
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            routing: RoutingConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            search: SearchConfig::from_env()?,
            monitoring: MonitoringConfig::from_env()?,
            request_time_budget_seconds: env::var("REQUEST_TIME_BUDGET_SECONDS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .map_err(|e| {
                    ConfigError::parse_error(
                        format!("REQUEST_TIME_BUDGET_SECONDS: {e}"),
                        "environment variable",
                        "REQUEST_TIME_BUDGET_SECONDS",
                    )
                })?,
        })
    }

    /// Validate the complete configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.routing.validate()?;
        self.llm.validate()?;
        self.search.validate()?;
        self.monitoring.validate()?;
        if self.request_time_budget_seconds == 0 {
            return Err(ConfigError::validation_failed(
                "request_time_budget_seconds must be greater than 0",
                "runtime",
                "set REQUEST_TIME_BUDGET_SECONDS to a positive value",
                vec![("request_time_budget_seconds".to_string(), "0".to_string())],
            ));
        }
        Ok(())
    }

    pub fn request_time_budget(&self) -> Duration {
        Duration::from_secs(self.request_time_budget_seconds)
    }
}

impl RoutingConfig {
    fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            temperature: env::var("ROUTING_TEMPERATURE")
                .unwrap_or_else(|_| "0.8".to_string())
                .parse()
                .map_err(|e| {
                    ConfigError::parse_error(
                        format!("ROUTING_TEMPERATURE: {e}"),
                        "environment variable",
                        "ROUTING_TEMPERATURE",
                    )
                })?,
            top_n: env::var("ROUTING_TOP_N")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|e| {
                    ConfigError::parse_error(
                        format!("ROUTING_TOP_N: {e}"),
                        "environment variable",
                        "ROUTING_TOP_N",
                    )
                })?,
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.temperature <= 0.0 {
            return Err(ConfigError::validation_failed(
                "routing temperature must be greater than 0",
                "routing",
                "use a small positive value to approach argmax instead of 0",
                vec![("temperature".to_string(), self.temperature.to_string())],
            ));
        }
        if self.top_n == 0 {
            return Err(ConfigError::validation_failed(
                "routing top_n must be greater than 0",
                "routing",
                "set ROUTING_TOP_N to at least 1",
                vec![("top_n".to_string(), self.top_n.to_string())],
            ));
        }
        Ok(())
    }
}

impl LlmConfig {
    fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            timeout_seconds: env::var("LLM_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|e| {
                    ConfigError::parse_error(
                        format!("LLM_TIMEOUT_SECONDS: {e}"),
                        "environment variable",
                        "LLM_TIMEOUT_SECONDS",
                    )
                })?,
            max_retries: env::var("LLM_MAX_RETRIES")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|e| {
                    ConfigError::parse_error(
                        format!("LLM_MAX_RETRIES: {e}"),
                        "environment variable",
                        "LLM_MAX_RETRIES",
                    )
                })?,
            default_temperature: env::var("LLM_DEFAULT_TEMPERATURE")
                .unwrap_or_else(|_| "0.2".to_string())
                .parse()
                .map_err(|e| {
                    ConfigError::parse_error(
                        format!("LLM_DEFAULT_TEMPERATURE: {e}"),
                        "environment variable",
                        "LLM_DEFAULT_TEMPERATURE",
                    )
                })?,
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::validation_failed(
                "llm timeout_seconds must be greater than 0",
                "llm",
                "set LLM_TIMEOUT_SECONDS to a positive value",
                vec![("timeout_seconds".to_string(), self.timeout_seconds.to_string())],
            ));
        }
        Ok(())
    }
}

impl SearchConfig {
    fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            timeout_seconds: env::var("SEARCH_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|e| {
                    ConfigError::parse_error(
                        format!("SEARCH_TIMEOUT_SECONDS: {e}"),
                        "environment variable",
                        "SEARCH_TIMEOUT_SECONDS",
                    )
                })?,
            stage_candidates: env::var("SEARCH_STAGE_CANDIDATES")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|e| {
                    ConfigError::parse_error(
                        format!("SEARCH_STAGE_CANDIDATES: {e}"),
                        "environment variable",
                        "SEARCH_STAGE_CANDIDATES",
                    )
                })?,
            final_limit: env::var("SEARCH_FINAL_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|e| {
                    ConfigError::parse_error(
                        format!("SEARCH_FINAL_LIMIT: {e}"),
                        "environment variable",
                        "SEARCH_FINAL_LIMIT",
                    )
                })?,
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.final_limit == 0 || self.final_limit > self.stage_candidates {
            return Err(ConfigError::validation_failed(
                "search final_limit must be nonzero and no larger than stage_candidates",
                "search",
                "set SEARCH_FINAL_LIMIT between 1 and SEARCH_STAGE_CANDIDATES",
                vec![
                    ("final_limit".to_string(), self.final_limit.to_string()),
                    ("stage_candidates".to_string(), self.stage_candidates.to_string()),
                ],
            ));
        }
        Ok(())
    }
}

impl MonitoringConfig {
    fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            prometheus_enabled: env::var("PROMETHEUS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            prometheus_port: env::var("PROMETHEUS_PORT")
                .unwrap_or_else(|_| "9090".to_string())
                .parse()
                .map_err(|e| {
                    ConfigError::parse_error(
                        format!("PROMETHEUS_PORT: {e}"),
                        "environment variable",
                        "PROMETHEUS_PORT",
                    )
                })?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::validation_failed(
                format!(
                    "invalid log level: {}. Must be one of: {}",
                    self.log_level,
                    valid_log_levels.join(", ")
                ),
                "logging",
                "use one of the supported log levels",
                vec![("log_level".to_string(), self.log_level.clone())],
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(OrchestratorConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_routing_temperature_is_rejected() {
        let mut config = RoutingConfig::default();
        config.temperature = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn search_final_limit_cannot_exceed_stage_candidates() {
        let mut config = SearchConfig::default();
        config.final_limit = config.stage_candidates + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = MonitoringConfig::default();
        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
