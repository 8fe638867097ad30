//! Command handlers for the docqa CLI.

pub mod ask;
pub mod ingest;
pub mod search;
pub mod status;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use search::SearchCommand;
pub use status::StatusCommand;

use docqa_core::{config::AppConfig, AppError, AppResult};
use docqa_knowledge::{LlmCompletion, RetrievalConfig, RetrievalService};
use docqa_llm::create_client;
use serde::Serialize;
use std::sync::Arc;

/// Build the retrieval service for the configured workspace.
pub fn open_service(config: &AppConfig) -> AppResult<Arc<RetrievalService>> {
    let retrieval = RetrievalConfig::load(&config.workspace, &config.config_path())?;

    let client = create_client(
        &config.provider,
        config.endpoint.as_deref(),
        Some(retrieval.completion_timeout()),
    )
    .map_err(|e| AppError::Config(format!("Failed to create completion client: {}", e)))?;
    let completion = LlmCompletion::new(client, &config.model)?;

    tracing::debug!("Index state directory: {:?}", retrieval.state_dir);

    Ok(Arc::new(RetrievalService::open(retrieval, Arc::new(completion))?))
}

pub fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
