//! Ask command handler.

use super::{open_service, print_json};
use clap::Args;
use docqa_core::{config::AppConfig, AppResult};

/// Answer a question from the ingested documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to answer
    pub question: String,

    /// Show the fragments the answer was based on
    #[arg(long)]
    pub show_sources: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let service = open_service(config)?;
        let answer = service.answer_question(&self.question).await?;

        if self.json {
            return print_json(&answer);
        }

        println!("{}", answer.answer);

        if self.show_sources {
            println!();
            println!("Sources:");
            for scored in &answer.fragments {
                println!("- {} (score {:.3})", scored.fragment.label(), scored.score);
            }
        }

        tracing::debug!("Answered in {:.2}s", answer.elapsed_secs);
        Ok(())
    }
}
