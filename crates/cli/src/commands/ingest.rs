//! Ingest command handler.

use super::{open_service, print_json};
use clap::Args;
use docqa_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

/// Build the index from documents, replacing the current corpus
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// PDF or text files, or directories to scan for them
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {} path(s)", self.paths.len());

        let service = open_service(config)?;
        let stats = service.ingest_paths(&self.paths).await?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!(
                "Indexed {} documents ({} fragments, {} terms) in {:.2}s",
                stats.documents_count,
                stats.fragments_count,
                stats.vocabulary_size,
                stats.duration_secs
            );
        }

        Ok(())
    }
}
