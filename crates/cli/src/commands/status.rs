//! Status command handler.

use super::{open_service, print_json};
use clap::Args;
use docqa_core::{config::AppConfig, AppResult};

/// Show whether an index is loaded and what it contains
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = open_service(config)?;
        let status = service.status();

        if self.json {
            return print_json(&status);
        }

        if !status.ready {
            println!("Not ready: no documents ingested yet");
            return Ok(());
        }

        println!("Ready");
        println!("  Fragments:  {}", status.fragments_count);
        println!("  Vocabulary: {} terms", status.vocabulary_size);
        if let Some(generation) = &status.generation {
            println!("  Generation: {}", generation);
        }
        if let Some(built_at) = status.built_at {
            println!("  Built at:   {}", built_at.to_rfc3339());
        }

        Ok(())
    }
}
