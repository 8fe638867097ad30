//! Registry of background ingestion jobs.

use crate::types::{IngestJob, IngestStats, JobId, JobState};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// How long a finished job stays queryable.
pub const DEFAULT_JOB_RETENTION_SECS: i64 = 3600;

#[derive(Debug)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, IngestJob>>,
    retention: Duration,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(Duration::seconds(DEFAULT_JOB_RETENTION_SECS))
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished jobs older than `retention` are dropped on the next submit.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Record a new pending job and return its id.
    pub fn submit(&self, paths: Vec<PathBuf>) -> JobId {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let job = IngestJob {
            id,
            paths,
            state: JobState::Pending,
            submitted_at: now,
            finished_at: None,
        };

        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let cutoff = now - self.retention;
        let before = jobs.len();
        jobs.retain(|_, existing| !matches!(existing.finished_at, Some(at) if at <= cutoff));
        if jobs.len() < before {
            tracing::debug!("Dropped {} expired ingestion jobs", before - jobs.len());
        }

        jobs.insert(id, job);
        id
    }


    pub fn mark_running(&self, id: JobId) {
        self.update(id, JobState::Running);
    }

    pub fn succeed(&self, id: JobId, stats: IngestStats) {
        self.update(id, JobState::Succeeded { stats });
    }

    pub fn fail(&self, id: JobId, reason: impl Into<String>) {
        self.update(
            id,
            JobState::Failed {
                reason: reason.into(),
            },
        );
    }

    fn update(&self, id: JobId, state: JobState) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        match jobs.get_mut(&id) {
            Some(job) => {
                if state.is_finished() {
                    job.finished_at = Some(Utc::now());
                }
                job.state = state;
            }
            None => tracing::warn!("Update for unknown ingestion job {}", id),
        }
    }

    pub fn get(&self, id: JobId) -> Option<IngestJob> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}
