//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A retrievable slice of a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Trimmed, non-empty text
    pub content: String,

    /// 1-based page number (paginated sources) or sequence position
    pub locator: u32,

    /// File name of the originating document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Fragment {
    pub fn new(content: impl Into<String>, locator: u32) -> Self {
        Self {
            content: content.into(),
            locator,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Context label, e.g. `[Page 3]` or `[manual.pdf, Page 3]`.
    pub fn label(&self) -> String {
        match &self.source {
            Some(source) => format!("[{}, Page {}]", source, self.locator),
            None => format!("[Page {}]", self.locator),
        }
    }
}

/// A fragment paired with its cosine similarity to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFragment {
    #[serde(flatten)]
    pub fragment: Fragment,

    /// Similarity in [0.0, 1.0]
    pub score: f32,
}

/// Statistics from an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    /// Number of documents read
    pub documents_count: u32,

    /// Number of fragments indexed
    pub fragments_count: u32,

    /// Number of terms in the trained vocabulary
    pub vocabulary_size: u32,

    /// Identifier of the persisted generation
    pub generation: String,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Answer to a question, with the evidence it was generated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,

    /// Text produced by the completion provider
    pub answer: String,

    /// Retrieved fragments, best first
    pub fragments: Vec<ScoredFragment>,

    /// Wall-clock time from retrieval to answer
    pub elapsed_secs: f64,

    pub answered_at: DateTime<Utc>,
}

/// Observable state of the retrieval service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub ready: bool,
    pub fragments_count: usize,
    pub vocabulary_size: usize,

    /// Persisted generation backing the in-memory index
    pub generation: Option<String>,

    pub built_at: Option<DateTime<Utc>>,
}

/// Identifier of a background ingestion job.
pub type JobId = Uuid;

/// Lifecycle of a background ingestion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded { stats: IngestStats },
    Failed { reason: String },
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Succeeded { .. } | JobState::Failed { .. })
    }
}

/// A background ingestion job and its current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub id: JobId,
    pub paths: Vec<PathBuf>,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
