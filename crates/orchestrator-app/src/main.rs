//! CLI entry point and composition root for the cognitive workflow
//! orchestrator: loads configuration and an optional seed file, wires the
//! HTTP-backed LLM/REST/vector-search collaborators, and routes a single
//! natural-language request through [`orchestrator::WorkflowOrchestrator`].

mod collaborators;
mod config;
mod llm;
mod orchestrator;
mod seed;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::collaborators::{HttpRestCaller, HttpVectorSearcher};
use crate::config::AppConfig;
use crate::llm::HttpLlmClient;
use crate::orchestrator::WorkflowOrchestrator;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] orchestrator_core::config::ConfigError),
    #[error("orchestration error: {0}")]
    Orchestrator(#[from] orchestrator_core::error::OrchestratorError),
    #[error("failed to read seed file {path}: {source}")]
    SeedIo { path: String, source: std::io::Error },
    #[error("failed to parse seed file {path}: {source}")]
    SeedParse { path: String, source: serde_json::Error },
}

#[derive(Parser)]
#[command(name = "orchestrator", version, about = "Cognitive workflow orchestrator")]
struct Cli {
    /// Path to a JSON seed file populating the in-memory catalogs at startup.
    /// Overrides the `SEED_PATH` environment variable when given.
    #[arg(long, global = true)]
    seed: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a single natural-language request through the orchestrator and
    /// print the output bindings and run report as JSON.
    Run {
        /// The user's request, e.g. "cancel my subscription".
        request: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.orchestrator.monitoring.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let llm = Arc::new(HttpLlmClient::new(config.llm.clone()));
    let rest_caller = Arc::new(HttpRestCaller::new(config.rest_timeout));
    let vector_searcher =
        Arc::new(HttpVectorSearcher::new(config.vector_search_endpoint.clone(), config.rest_timeout));

    let app = WorkflowOrchestrator::bootstrap(config.orchestrator.clone(), llm, rest_caller, vector_searcher);

    let seed_path = cli.seed.map(|p| p.to_string_lossy().into_owned()).or(config.seed_path.clone());
    if let Some(path) = seed_path {
        let raw = std::fs::read_to_string(&path).map_err(|source| AppError::SeedIo { path: path.clone(), source })?;
        let seed_file: seed::SeedFile =
            serde_json::from_str(&raw).map_err(|source| AppError::SeedParse { path: path.clone(), source })?;
        let created =
            seed::load(seed_file, app.node_catalog(), app.workflow_catalog(), app.intent_catalog()).await?;
        tracing::info!(workflows_created = created, seed_path = %path, "loaded seed file");
    }

    match cli.command {
        Commands::Run { request } => {
            let (output, report) = app.orchestrate(&request).await?;
            let result = serde_json::json!({ "output": output, "report": report });
            println!("{}", serde_json::to_string_pretty(&result).expect("report is always serializable"));
        }
    }

    Ok(())
}
