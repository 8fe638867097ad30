//! Document retrieval and question answering.
//!
//! Documents are split into overlapping fragments, weighed with TF-IDF and
//! ranked by cosine similarity. The best fragments become the context for
//! a completion provider that phrases the answer.

pub mod config;
pub mod extractor;
pub mod index;
pub mod jobs;
pub mod rag;
pub mod segmenter;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::RetrievalConfig;
pub use extractor::{DocumentFormat, Extractor};
pub use index::{VectorIndex, VectorizerParams};
pub use rag::{CompletionProvider, LlmCompletion};
pub use segmenter::Segmenter;
pub use service::RetrievalService;
pub use store::IndexStore;
pub use types::{
    Answer, Fragment, IndexStatus, IngestJob, IngestStats, JobId, JobState, ScoredFragment,
};
