//! Completion capability used to phrase answers.

use async_trait::async_trait;
use docqa_core::{AppError, AppResult};
use docqa_llm::{LlmClient, LlmRequest};
use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;

/// Sampling temperature for grounded answers.
pub const ANSWER_TEMPERATURE: f32 = 0.1;

/// Token budget for one answer.
pub const ANSWER_MAX_TOKENS: u32 = 1000;

const ANSWER_TEMPLATE_NAME: &str = "answer";

const ANSWER_TEMPLATE: &str = "\
Using only the context below, answer the question precisely and completely.

Context:
{{context}}

Question: {{question}}

Instructions:
- Answer only from the information in the context
- If the answer is not in the context, say that you do not have enough information
- Be precise and direct
- Keep a professional tone

Answer:";

/// Turns a context and a question into answer text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, context: &str, question: &str) -> AppResult<String>;
}

#[derive(Serialize)]
struct AnswerPrompt<'a> {
    context: &'a str,
    question: &'a str,
}

/// [`CompletionProvider`] backed by an [`LlmClient`].
pub struct LlmCompletion {
    client: Arc<dyn LlmClient>,
    model: String,
    templates: Handlebars<'static>,
}

impl LlmCompletion {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> AppResult<Self> {
        let mut templates = Handlebars::new();
        templates.register_escape_fn(handlebars::no_escape);
        templates
            .register_template_string(ANSWER_TEMPLATE_NAME, ANSWER_TEMPLATE)
            .map_err(|e| AppError::Config(format!("Failed to register answer template: {}", e)))?;

        Ok(Self {
            client,
            model: model.into(),
            templates,
        })
    }

    /// Render the grounded-answer prompt.
    pub fn render_prompt(&self, context: &str, question: &str) -> AppResult<String> {
        self.templates
            .render(ANSWER_TEMPLATE_NAME, &AnswerPrompt { context, question })
            .map_err(|e| AppError::Generation(format!("Failed to render answer prompt: {}", e)))
    }
}

#[async_trait]
impl CompletionProvider for LlmCompletion {
    async fn complete(&self, context: &str, question: &str) -> AppResult<String> {
        let prompt = self.render_prompt(context, question)?;
        let request = LlmRequest::new(prompt, &self.model)
            .with_temperature(ANSWER_TEMPERATURE)
            .with_max_tokens(ANSWER_MAX_TOKENS);

        tracing::debug!(
            "Requesting completion from {} (model: {})",
            self.client.provider_name(),
            self.model
        );

        let response = self.client.complete(&request).await.map_err(|e| match e {
            AppError::Generation(_) => e,
            other => AppError::Generation(other.to_string()),
        })?;

        tracing::debug!(
            "Completion used {} prompt + {} completion tokens",
            response.usage.prompt_tokens,
            response.usage.completion_tokens
        );

        Ok(response.content)
    }
}
