//! Search command handler.

use super::{open_service, print_json};
use clap::Args;
use docqa_core::{config::AppConfig, AppResult};

/// Show the fragments that best match a query, without generating an answer
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of fragments to return (default: configured top-k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = open_service(config)?;
        let top_k = self.top_k.unwrap_or(service.config().top_k);

        tracing::info!("Executing search command (top-{})", top_k);

        let results = service.search(&self.query, top_k)?;

        if self.json {
            return print_json(&results);
        }

        for (rank, scored) in results.iter().enumerate() {
            println!(
                "{}. {} score {:.3}",
                rank + 1,
                scored.fragment.label(),
                scored.score
            );
            println!("   {}", preview(&scored.fragment.content, 160));
        }

        Ok(())
    }
}

/// First `max_chars` characters on one line.
fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
