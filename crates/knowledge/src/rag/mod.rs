//! Answer generation from retrieved fragments.
//!
//! The service ranks fragments, [`build_context`] turns them into a prompt
//! context, and a [`CompletionProvider`] produces the answer text.

mod completion;
mod context;

pub use completion::{CompletionProvider, LlmCompletion, ANSWER_MAX_TOKENS, ANSWER_TEMPERATURE};
pub use context::build_context;
