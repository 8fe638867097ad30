//! Atomically swappable reference to the current index.

use super::VectorIndex;
use crate::types::ScoredFragment;
use chrono::{DateTime, Utc};
use docqa_core::{AppError, AppResult};
use std::sync::{Arc, PoisonError, RwLock};

/// An index together with the persisted generation it corresponds to.
#[derive(Debug)]
pub struct IndexSnapshot {
    pub index: VectorIndex,
    pub generation: String,
    pub built_at: DateTime<Utc>,
}

/// Holder for the current [`IndexSnapshot`].
///
/// Readers clone the inner `Arc` and query without holding the lock, so a
/// swap never blocks on a running query and a query never observes a
/// half-replaced index.
#[derive(Debug, Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot in effect right now, if any.
    pub fn current(&self) -> Option<Arc<IndexSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current snapshot, returning the previous one.
    pub fn swap(&self, snapshot: Arc<IndexSnapshot>) -> Option<Arc<IndexSnapshot>> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.replace(snapshot)
    }

    pub fn is_built(&self) -> bool {
        self.current().is_some()
    }

    /// Query the current snapshot; `NotBuilt` when there is none.
    pub fn query(&self, text: &str, top_k: usize) -> AppResult<Vec<ScoredFragment>> {
        let snapshot = self.current().ok_or(AppError::NotBuilt)?;
        snapshot.index.query(text, top_k)
    }
}
