//! Retrieval service: ingestion, retrieval and answering over one corpus.
//!
//! The service starts **NotReady** unless a persisted index can be restored,
//! and becomes **Ready** after the first successful ingestion. Ingestion
//! replaces the whole corpus; a failed ingestion leaves the previous index
//! in place.
//!
//! Share one instance behind an `Arc`. Queries never wait on ingestion:
//! ingestions are serialized among themselves and publish their result with
//! a single pointer swap.

use crate::config::RetrievalConfig;
use crate::extractor::{DocumentFormat, Extractor};
use crate::index::{IndexHandle, IndexSnapshot, VectorIndex};
use crate::jobs::JobRegistry;
use crate::rag::{build_context, CompletionProvider};
use crate::store::IndexStore;
use crate::types::{Answer, IndexStatus, IngestJob, IngestStats, JobId, ScoredFragment};
use chrono::Utc;
use docqa_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use walkdir::WalkDir;

pub struct RetrievalService {
    config: RetrievalConfig,
    extractor: Extractor,
    store: IndexStore,
    index: IndexHandle,
    completion: Arc<dyn CompletionProvider>,
    ingest_lock: Mutex<()>,
    jobs: JobRegistry,
}

impl RetrievalService {
    /// Build the service and restore any persisted index.
    ///
    /// Invalid configuration or an unusable state directory is an error. A
    /// missing or corrupt persisted index is not: the service starts
    /// NotReady.
    pub fn open(config: RetrievalConfig, completion: Arc<dyn CompletionProvider>) -> AppResult<Self> {
        config.validate()?;
        let extractor = Extractor::new(config.segmenter()?);

        let store = IndexStore::new(&config.state_dir);
        store.ensure_dir()?;

        let index = IndexHandle::new();
        match store.load() {
            Ok(Some(state)) => {
                index.swap(Arc::new(IndexSnapshot {
                    index: state.index,
                    generation: state.manifest.generation,
                    built_at: state.manifest.created_at,
                }));
                tracing::info!("Retrieval service ready");
            }
            Ok(None) => {
                tracing::info!("Retrieval service not ready: no documents ingested yet");
            }
            Err(e) => {
                tracing::error!(
                    "Ignoring persisted index at {:?}: {}. Ingest documents to rebuild it.",
                    store.root(),
                    e
                );
            }
        }

        Ok(Self {
            config,
            extractor,
            store,
            index,
            completion,
            ingest_lock: Mutex::new(()),
            jobs: JobRegistry::new(),
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Replace the corpus with the fragments of one document.
    pub async fn ingest(&self, path: impl AsRef<Path>) -> AppResult<IngestStats> {
        self.ingest_paths(&[path.as_ref().to_path_buf()]).await
    }

    /// Replace the corpus with the fragments of every listed document.
    ///
    /// Directories are walked for `.pdf` and `.txt` files. One failing
    /// document fails the whole ingestion and the current index is kept.
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> AppResult<IngestStats> {
        if paths.is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one path is required".to_string(),
            ));
        }

        let _guard = self.ingest_lock.lock().await;
        let start = Instant::now();

        tracing::info!("Starting ingestion of {} path(s)", paths.len());

        let extractor = self.extractor;
        let store = self.store.clone();
        let params = self.config.vectorizer_params();
        let paths = paths.to_vec();

        let result = tokio::task::spawn_blocking(move || {
            let documents = collect_documents(&paths)?;

            let mut fragments = Vec::new();
            for document in &documents {
                fragments.extend(extractor.extract(document)?);
            }

            let index = VectorIndex::build(fragments, &params)?;
            let manifest = store.save(&index)?;
            Ok::<_, AppError>((documents.len(), index, manifest))
        })
        .await
        .map_err(|e| AppError::Other(format!("Ingestion task failed: {}", e)))
        .and_then(|inner| inner);

        let (documents_count, index, manifest) = match result {
            Ok(built) => built,
            Err(e) => {
                tracing::error!("Ingestion failed, keeping the current index: {}", e);
                return Err(e);
            }
        };

        let stats = IngestStats {
            documents_count: documents_count as u32,
            fragments_count: index.len() as u32,
            vocabulary_size: index.vocabulary_size() as u32,
            generation: manifest.generation.clone(),
            duration_secs: start.elapsed().as_secs_f64(),
        };

        self.index.swap(Arc::new(IndexSnapshot {
            index,
            generation: manifest.generation,
            built_at: manifest.created_at,
        }));

        tracing::info!(
            "Ingestion completed: {} documents, {} fragments, {} terms in {:.2}s",
            stats.documents_count,
            stats.fragments_count,
            stats.vocabulary_size,
            stats.duration_secs
        );

        Ok(stats)
    }

    /// Answer `question` from the best-matching fragments.
    pub async fn answer_question(&self, question: &str) -> AppResult<Answer> {
        if !self.is_ready() {
            return Err(AppError::NotReady);
        }
        if question.trim().is_empty() {
            return Err(AppError::InvalidArgument("question must not be empty".to_string()));
        }

        let start = Instant::now();
        let fragments = self.relevant_fragments(question)?;

        if fragments.is_empty() {
            tracing::info!("No relevant fragments for question");
            return Err(AppError::NoRelevantContent);
        }

        tracing::info!(
            "Answering from {} fragments (best score {:.3})",
            fragments.len(),
            fragments[0].score
        );

        let context = build_context(&fragments);
        let timeout = self.config.completion_timeout();

        let answer =
            match tokio::time::timeout(timeout, self.completion.complete(&context, question)).await
            {
                Ok(Ok(answer)) => answer,
                Ok(Err(e)) => {
                    tracing::error!("Completion failed: {}", e);
                    return Err(match e {
                        AppError::Generation(_) => e,
                        other => AppError::Generation(other.to_string()),
                    });
                }
                Err(_) => {
                    tracing::error!("Completion timed out after {:?}", timeout);
                    return Err(AppError::Generation(format!(
                        "completion timed out after {}s",
                        timeout.as_secs()
                    )));
                }
            };

        Ok(Answer {
            question: question.to_string(),
            answer,
            fragments,
            elapsed_secs: start.elapsed().as_secs_f64(),
            answered_at: Utc::now(),
        })
    }

    fn relevant_fragments(&self, question: &str) -> AppResult<Vec<ScoredFragment>> {
        let mut ranked = self.search(question, self.config.top_k)?;
        if let Some(floor) = self.config.min_score {
            let before = ranked.len();
            ranked.retain(|r| r.score >= floor);
            tracing::debug!(
                "Relevance floor {:.2} kept {} of {} fragments",
                floor,
                ranked.len(),
                before
            );
        }
        Ok(ranked)
    }

    /// Rank fragments against `query` without generating an answer.
    pub fn search(&self, query: &str, top_k: usize) -> AppResult<Vec<ScoredFragment>> {
        self.index.query(query, top_k).map_err(|e| match e {
            AppError::NotBuilt => AppError::NotReady,
            other => other,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.index.is_built()
    }

    /// Number of fragments in the current index; 0 when NotReady.
    pub fn fragment_count(&self) -> usize {
        self.index.current().map(|s| s.index.len()).unwrap_or(0)
    }

    pub fn status(&self) -> IndexStatus {
        match self.index.current() {
            Some(snapshot) => IndexStatus {
                ready: true,
                fragments_count: snapshot.index.len(),
                vocabulary_size: snapshot.index.vocabulary_size(),
                generation: Some(snapshot.generation.clone()),
                built_at: Some(snapshot.built_at),
            },
            None => IndexStatus {
                ready: false,
                fragments_count: 0,
                vocabulary_size: 0,
                generation: None,
                built_at: None,
            },
        }
    }

    /// Run [`ingest_paths`](Self::ingest_paths) on the Tokio runtime and
    /// return a job id to poll with [`job_status`](Self::job_status).
    pub fn spawn_ingest(self: &Arc<Self>, paths: Vec<PathBuf>) -> JobId {
        let id = self.jobs.submit(paths.clone());
        let service = Arc::clone(self);

        tokio::spawn(async move {
            service.jobs.mark_running(id);
            match service.ingest_paths(&paths).await {
                Ok(stats) => service.jobs.succeed(id, stats),
                Err(e) => service.jobs.fail(id, e.to_string()),
            }
        });

        tracing::debug!("Submitted ingestion job {}", id);
        id
    }

    pub fn job_status(&self, id: JobId) -> Option<IngestJob> {
        self.jobs.get(id)
    }
}

/// Expand directories into their supported documents, in sorted order.
/// Files are passed through as given so unsupported ones are reported.
/// An unreadable entry fails the scan rather than shrinking the corpus.
fn collect_documents(paths: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
    let mut documents = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(path).follow_links(false) {
                let entry = entry.map_err(|e| walk_error(path, e))?;
                if entry.file_type().is_file() && DocumentFormat::from_path(entry.path()).is_ok() {
                    found.push(entry.into_path());
                }
            }
            found.sort();

            tracing::debug!("Found {} documents under {:?}", found.len(), path);
            documents.extend(found);
        } else {
            documents.push(path.clone());
        }
    }

    Ok(documents)
}

fn walk_error(root: &Path, e: walkdir::Error) -> AppError {
    let location = e
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    AppError::Document(format!("Failed to scan {:?}: {}", location, e))
}
