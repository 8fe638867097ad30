//! Retrieval configuration.
//!
//! Read from the `retrieval:` section of the workspace config file, then
//! overridden by `DOCQA_*` environment variables.

use crate::index::VectorizerParams;
use crate::segmenter::Segmenter;
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of persisted index state, relative to the workspace.
pub const DEFAULT_STATE_DIR: &str = ".docqa/vector_store";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    /// Fragment window size in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive windows
    pub chunk_overlap: usize,

    /// Fragments passed to the completion provider per question
    pub top_k: usize,

    /// Vocabulary cap
    pub max_features: usize,

    /// Minimum document frequency for a vocabulary term
    pub min_df: u32,

    /// Remove English stop words
    pub stop_words: bool,

    /// Optional relevance floor; fragments scoring below it are not used as context
    pub min_score: Option<f32>,

    /// Persisted index directory; relative paths resolve against the workspace
    pub state_dir: PathBuf,

    /// Completion timeout in seconds
    pub completion_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            max_features: 1000,
            min_df: 1,
            stop_words: true,
            min_score: None,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            completion_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    retrieval: Option<RetrievalConfig>,
}

impl RetrievalConfig {
    /// Load from `config_path` (if it exists) and the environment, then validate.
    ///
    /// The returned config has `state_dir` resolved against `workspace`.
    pub fn load(workspace: &Path, config_path: &Path) -> AppResult<Self> {
        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(config_path).map_err(|e| {
                AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
            })?;
            let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
                AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
            })?;
            tracing::debug!("Loaded retrieval config from {:?}", config_path);
            file.retrieval.unwrap_or_default()
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.state_dir = config.resolved_state_dir(workspace);
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCQA_*` overrides looked up through `var`.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> AppResult<()> {
        if let Some(value) = var("DOCQA_CHUNK_SIZE") {
            self.chunk_size = parse_env("DOCQA_CHUNK_SIZE", &value)?;
        }
        if let Some(value) = var("DOCQA_CHUNK_OVERLAP") {
            self.chunk_overlap = parse_env("DOCQA_CHUNK_OVERLAP", &value)?;
        }
        if let Some(value) = var("DOCQA_TOP_K") {
            self.top_k = parse_env("DOCQA_TOP_K", &value)?;
        }
        if let Some(value) = var("DOCQA_MAX_FEATURES") {
            self.max_features = parse_env("DOCQA_MAX_FEATURES", &value)?;
        }
        if let Some(value) = var("DOCQA_STATE_DIR") {
            self.state_dir = PathBuf::from(value);
        }
        Ok(())
    }

    pub fn resolved_state_dir(&self, workspace: &Path) -> PathBuf {
        if self.state_dir.is_absolute() {
            self.state_dir.clone()
        } else {
            workspace.join(&self.state_dir)
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::Config("topK must be greater than zero".to_string()));
        }
        if self.max_features == 0 {
            return Err(AppError::Config("maxFeatures must be greater than zero".to_string()));
        }
        if self.min_df == 0 {
            return Err(AppError::Config("minDf must be greater than zero".to_string()));
        }
        if let Some(floor) = self.min_score {
            if !(0.0..=1.0).contains(&floor) {
                return Err(AppError::Config(format!(
                    "minScore must be within [0, 1], got {}",
                    floor
                )));
            }
        }
        if self.completion_timeout_secs == 0 {
            return Err(AppError::Config(
                "completionTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn vectorizer_params(&self) -> VectorizerParams {
        VectorizerParams {
            max_features: self.max_features,
            min_df: self.min_df,
            stop_words: self.stop_words,
        }
    }

    pub fn segmenter(&self) -> AppResult<Segmenter> {
        Segmenter::new(self.chunk_size, self.chunk_overlap)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> AppResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} has an invalid value: '{}'", key, value)))
}
