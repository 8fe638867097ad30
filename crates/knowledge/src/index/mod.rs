//! In-memory TF-IDF index over a fragment collection.
//!
//! A [`VectorIndex`] is immutable once built: the model, the weight rows and
//! the fragments are created together and replaced together. Re-ingestion
//! builds a new index and swaps it in through [`IndexHandle`].

mod handle;
mod sparse;
mod stop_words;
mod vectorizer;

pub use handle::{IndexHandle, IndexSnapshot};
pub use sparse::{cosine_similarity, SparseVector};
pub use stop_words::is_stop_word;
pub use vectorizer::{analyze, TfidfVectorizer, VectorizerParams};

use crate::types::{Fragment, ScoredFragment};
use docqa_core::{AppError, AppResult};
use rayon::prelude::*;

/// A trained vector space plus the fragments it was trained on.
///
/// Invariant: `rows.len() == fragments.len()`, row `i` weighs fragment `i`.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectorizer: TfidfVectorizer,
    rows: Vec<SparseVector>,
    fragments: Vec<Fragment>,
}

impl VectorIndex {
    /// Train a model over `fragments` and weigh each of them.
    ///
    /// Blank fragments are discarded first; fails with `EmptyCorpus` when
    /// nothing remains or nothing yields a vocabulary term.
    pub fn build(fragments: Vec<Fragment>, params: &VectorizerParams) -> AppResult<Self> {
        let total = fragments.len();
        let fragments: Vec<Fragment> = fragments
            .into_iter()
            .filter(|f| !f.content.trim().is_empty())
            .collect();

        if fragments.len() < total {
            tracing::debug!("Dropped {} blank fragments", total - fragments.len());
        }
        if fragments.is_empty() {
            return Err(AppError::EmptyCorpus);
        }

        let texts: Vec<&str> = fragments.iter().map(|f| f.content.as_str()).collect();
        let (vectorizer, rows) = TfidfVectorizer::fit_transform(params, &texts)?;

        tracing::info!(
            "Built index: {} fragments, {} terms",
            fragments.len(),
            vectorizer.vocabulary_len()
        );

        Ok(Self {
            vectorizer,
            rows,
            fragments,
        })
    }

    /// Reassemble an index from persisted parts, checking dimensions.
    ///
    /// Fails with `CorruptState` when the row count differs from the fragment
    /// count or a row references a column outside the vocabulary.
    pub fn from_parts(
        vectorizer: TfidfVectorizer,
        rows: Vec<SparseVector>,
        fragments: Vec<Fragment>,
    ) -> AppResult<Self> {
        vectorizer.validate().map_err(AppError::CorruptState)?;

        if rows.len() != fragments.len() {
            return Err(AppError::CorruptState(format!(
                "matrix has {} rows but there are {} fragments",
                rows.len(),
                fragments.len()
            )));
        }

        if fragments.is_empty() {
            return Err(AppError::CorruptState(
                "persisted index has no fragments".to_string(),
            ));
        }

        let columns = vectorizer.vocabulary_len();
        if let Some(row) = rows
            .iter()
            .position(|row| row.max_index().is_some_and(|c| c as usize >= columns))
        {
            return Err(AppError::CorruptState(format!(
                "row {} references a column beyond the {}-term vocabulary",
                row, columns
            )));
        }

        Ok(Self {
            vectorizer,
            rows,
            fragments,
        })
    }

    /// Rank fragments by cosine similarity to `text` and keep the best `top_k`.
    ///
    /// Ties keep original fragment order. A query with no known terms scores
    /// every fragment 0.0. Fails with `InvalidArgument` when `top_k == 0`.
    pub fn query(&self, text: &str, top_k: usize) -> AppResult<Vec<ScoredFragment>> {
        if top_k == 0 {
            return Err(AppError::InvalidArgument(
                "top_k must be greater than zero".to_string(),
            ));
        }

        let scores = self.scores(text);

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        // Stable sort: equal scores stay in fragment order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(top_k);

        tracing::debug!(
            "Query matched {} fragments (requested top-{}, best score {:.3})",
            ranked.len(),
            top_k,
            ranked.first().map(|(_, s)| *s).unwrap_or(0.0)
        );

        Ok(ranked
            .into_iter()
            .map(|(i, score)| ScoredFragment {
                fragment: self.fragments[i].clone(),
                score,
            })
            .collect())
    }

    /// Similarity of `text` to every fragment, in fragment order.
    pub fn scores(&self, text: &str) -> Vec<f32> {
        let query = self.vectorizer.transform(text);
        if query.is_zero() {
            tracing::debug!("Query has no terms in the vocabulary");
            return vec![0.0; self.rows.len()];
        }

        self.rows
            .par_iter()
            .map(|row| cosine_similarity(&query, row))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.vocabulary_len()
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(texts: &[&str]) -> Vec<Fragment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Fragment::new(*t, i as u32 + 1))
            .collect()
    }

    fn build(texts: &[&str]) -> VectorIndex {
        VectorIndex::build(corpus(texts), &VectorizerParams::default()).unwrap()
    }

    #[test]
    fn test_python_ranks_first() {
        let index = build(&[
            "Python is a programming language.",
            "Machine learning is a branch of AI.",
        ]);

        let top = index.query("Python programming", 1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].fragment.content, "Python is a programming language.");

        let all = index.query("Python programming", 2).unwrap();
        assert!(all[0].score > all[1].score);
    }

    #[test]
    fn test_exact_fragment_text_ranks_top() {
        let texts = [
            "Rust guarantees memory safety without a garbage collector.",
            "The borrow checker enforces ownership rules at compile time.",
            "Cargo is the package manager and build system.",
            "Traits describe shared behaviour across types.",
        ];
        let index = build(&texts);

        for (i, text) in texts.iter().enumerate() {
            let top = index.query(text, 1).unwrap();
            assert_eq!(top[0].fragment.locator, i as u32 + 1);
            assert!(top[0].score > 0.0);
        }
    }

    #[test]
    fn test_out_of_vocabulary_query_scores_zero() {
        let index = build(&["alpha beta", "gamma delta", "epsilon zeta"]);

        let scores = index.scores("completely unrelated words");
        assert_eq!(scores, vec![0.0, 0.0, 0.0]);

        // All tied at zero: original order is preserved.
        let ranked = index.query("completely unrelated words", 3).unwrap();
        let locators: Vec<u32> = ranked.iter().map(|r| r.fragment.locator).collect();
        assert_eq!(locators, vec![1, 2, 3]);
        assert!(ranked.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn test_ties_keep_fragment_order() {
        let index = build(&["shared words here", "distinct topic", "shared words here"]);
        let ranked = index.query("shared words", 3).unwrap();

        assert_eq!(ranked[0].fragment.locator, 1);
        assert_eq!(ranked[1].fragment.locator, 3);
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[test]
    fn test_top_k_larger_than_corpus_returns_all() {
        let index = build(&["first fragment text", "second fragment text"]);
        let ranked = index.query("fragment", 10).unwrap();
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn test_zero_top_k_is_invalid() {
        let index = build(&["some text"]);
        assert!(matches!(
            index.query("text", 0),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_scores_within_unit_interval() {
        let index = build(&[
            "databases store rows and columns",
            "indexes speed up database lookups",
            "caches keep hot rows in memory",
        ]);
        for score in index.scores("database rows memory lookups") {
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_build_rejects_blank_corpus() {
        let err = VectorIndex::build(corpus(&["   ", "\n\t"]), &VectorizerParams::default())
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyCorpus));

        let err = VectorIndex::build(Vec::new(), &VectorizerParams::default()).unwrap_err();
        assert!(matches!(err, AppError::EmptyCorpus));
    }

    #[test]
    fn test_from_parts_checks_dimensions() {
        let index = build(&["alpha beta", "gamma delta"]);
        let mut fragments = index.fragments().to_vec();
        fragments.pop();

        let err = VectorIndex::from_parts(
            index.vectorizer().clone(),
            index.rows().to_vec(),
            fragments,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::CorruptState(_)));
    }

    #[test]
    fn test_from_parts_checks_columns() {
        let index = build(&["alpha beta"]);
        let rows = vec![SparseVector::from_pairs(vec![(9999, 1.0)])];

        let err = VectorIndex::from_parts(
            index.vectorizer().clone(),
            rows,
            index.fragments().to_vec(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::CorruptState(_)));
    }
}
