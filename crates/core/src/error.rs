//! Error types for docqa.
//!
//! A single error enum covers ingestion, retrieval, persistence and answer
//! generation. Variants map one-to-one onto the failure categories that
//! callers need to tell apart (for instance "no index yet" versus "nothing
//! relevant was found").

use thiserror::Error;

/// Unified error type for docqa.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The document's file extension is not a recognized format
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// A source could not be read, or its content is corrupt
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document content could not be decoded
    #[error("Failed to read document: {0}")]
    Document(String),

    /// An index was requested over zero usable fragments
    #[error("Cannot build an index from an empty corpus")]
    EmptyCorpus,

    /// The index has not been trained yet
    #[error("Index has not been built")]
    NotBuilt,

    /// A caller-supplied argument is out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Persisted index artifacts exist but are unusable
    #[error("Corrupt index state: {0}")]
    CorruptState(String),

    /// The service has no index loaded
    #[error("Service is not ready: ingest a document first")]
    NotReady,

    /// The query matched no fragments
    #[error("No relevant content found for the question")]
    NoRelevantContent,

    /// The completion provider failed or timed out
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error belongs to the read/decode category (IOFailure).
    pub fn is_io_failure(&self) -> bool {
        matches!(self, AppError::Io(_) | AppError::Document(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
