//! TF-IDF term weighting over unigrams and bigrams.

use super::sparse::SparseVector;
use super::stop_words::is_stop_word;
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use unicode_segmentation::UnicodeSegmentation;

/// Tunables for vocabulary construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerParams {
    /// Upper bound on vocabulary size
    pub max_features: usize,

    /// Minimum number of fragments a term must occur in
    pub min_df: u32,

    /// Drop English stop words before building n-grams
    pub stop_words: bool,
}

impl Default for VectorizerParams {
    fn default() -> Self {
        Self {
            max_features: 1000,
            min_df: 1,
            stop_words: true,
        }
    }
}

/// A trained TF-IDF model: vocabulary plus per-term inverse document frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    params: VectorizerParams,

    /// Term to column index; columns are assigned in lexicographic term order
    vocabulary: BTreeMap<String, u32>,

    /// Smoothed idf, indexed by column
    idf: Vec<f32>,

    /// Number of fragments the model was fitted on
    document_count: u32,
}

impl TfidfVectorizer {
    /// Fit the model on `texts` and return it with one L2-normalized row per text.
    ///
    /// Fails with `EmptyCorpus` when there are no texts or no text contributes
    /// a single vocabulary term.
    pub fn fit_transform(
        params: &VectorizerParams,
        texts: &[&str],
    ) -> AppResult<(Self, Vec<SparseVector>)> {
        if texts.is_empty() {
            return Err(AppError::EmptyCorpus);
        }

        let analyzed: Vec<Vec<String>> = texts
            .iter()
            .map(|text| analyze(text, params.stop_words))
            .collect();

        let mut document_frequency: HashMap<&str, u32> = HashMap::new();
        let mut total_count: HashMap<&str, u64> = HashMap::new();
        for terms in &analyzed {
            let mut seen: HashSet<&str> = HashSet::new();
            for term in terms {
                *total_count.entry(term.as_str()).or_default() += 1;
                if seen.insert(term.as_str()) {
                    *document_frequency.entry(term.as_str()).or_default() += 1;
                }
            }
        }

        let mut candidates: Vec<(&str, u64)> = total_count
            .into_iter()
            .filter(|(term, _)| {
                document_frequency.get(term).copied().unwrap_or(0) >= params.min_df
            })
            .collect();

        if candidates.is_empty() {
            tracing::warn!(
                "No vocabulary terms in {} fragments (min_df: {}, stop_words: {})",
                texts.len(),
                params.min_df,
                params.stop_words
            );
            return Err(AppError::EmptyCorpus);
        }

        // Most frequent terms survive the cap; ties resolve alphabetically.
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        candidates.truncate(params.max_features);

        let mut terms: Vec<&str> = candidates.into_iter().map(|(term, _)| term).collect();
        terms.sort_unstable();

        let n = texts.len() as f64;
        let idf = terms
            .iter()
            .map(|term| {
                let df = document_frequency.get(term).copied().unwrap_or(0) as f64;
                (((1.0 + n) / (1.0 + df)).ln() + 1.0) as f32
            })
            .collect();

        let vocabulary = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.to_string(), i as u32))
            .collect();

        let vectorizer = Self {
            params: params.clone(),
            vocabulary,
            idf,
            document_count: texts.len() as u32,
        };

        let rows = analyzed.iter().map(|terms| vectorizer.weigh(terms)).collect();

        tracing::debug!(
            "Fitted TF-IDF over {} fragments: {} terms",
            texts.len(),
            vectorizer.vocabulary.len()
        );

        Ok((vectorizer, rows))
    }

    /// Project `text` into the trained space. Unknown terms are ignored.
    pub fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&analyze(text, self.params.stop_words))
    }

    fn weigh(&self, terms: &[String]) -> SparseVector {
        let mut counts: HashMap<u32, u32> = HashMap::new();
        for term in terms {
            if let Some(&column) = self.vocabulary.get(term) {
                *counts.entry(column).or_default() += 1;
            }
        }

        let mut vector = SparseVector::from_pairs(
            counts
                .into_iter()
                .map(|(column, tf)| (column, tf as f32 * self.idf[column as usize]))
                .collect(),
        );
        vector.normalize();
        vector
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn document_count(&self) -> u32 {
        self.document_count
    }

    pub fn params(&self) -> &VectorizerParams {
        &self.params
    }

    /// Column index of `term`, if it is in the vocabulary.
    pub fn column(&self, term: &str) -> Option<u32> {
        self.vocabulary.get(term).copied()
    }

    /// Structural consistency check for a deserialized model.
    pub fn validate(&self) -> Result<(), String> {
        if self.idf.len() != self.vocabulary.len() {
            return Err(format!(
                "vocabulary has {} terms but idf has {} entries",
                self.vocabulary.len(),
                self.idf.len()
            ));
        }

        let mut columns: Vec<u32> = self.vocabulary.values().copied().collect();
        columns.sort_unstable();
        let contiguous = columns.iter().enumerate().all(|(i, &c)| c as usize == i);
        if !contiguous {
            return Err("vocabulary columns are not a permutation of 0..n".to_string());
        }

        if self.idf.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err("idf contains non-positive or non-finite weights".to_string());
        }

        Ok(())
    }
}

/// Lowercase, tokenize into words of at least two characters, optionally drop
/// stop words, then emit unigrams followed by space-joined bigrams.
pub fn analyze(text: &str, stop_words: bool) -> Vec<String> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .unicode_words()
        .filter(|word| word.chars().count() >= 2)
        .filter(|word| !(stop_words && is_stop_word(word)))
        .collect();

    let mut terms: Vec<String> = tokens.iter().map(|token| token.to_string()).collect();
    terms.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_features: usize) -> VectorizerParams {
        VectorizerParams {
            max_features,
            ..Default::default()
        }
    }

    #[test]
    fn test_analyze_unigrams_and_bigrams() {
        let terms = analyze("Python is a programming language.", true);
        assert_eq!(
            terms,
            vec![
                "python",
                "programming",
                "language",
                "python programming",
                "programming language",
            ]
        );
    }

    #[test]
    fn test_analyze_keeps_stop_words_when_disabled() {
        let terms = analyze("Python is fun", false);
        assert!(terms.contains(&"is".to_string()));
        assert!(terms.contains(&"python is".to_string()));
    }

    #[test]
    fn test_vocabulary_is_sorted_and_capped() {
        let texts = ["apple kiwi", "apple banana", "banana apple", "apple cherry"];
        let (vectorizer, rows) = TfidfVectorizer::fit_transform(&params(2), &texts).unwrap();

        // apple (4) and banana (2) are the most frequent terms
        assert_eq!(vectorizer.vocabulary_len(), 2);
        assert_eq!(vectorizer.column("apple"), Some(0));
        assert_eq!(vectorizer.column("banana"), Some(1));
        assert_eq!(vectorizer.column("cherry"), None);
        assert_eq!(rows.len(), 4);
        assert!(vectorizer.validate().is_ok());
    }

    #[test]
    fn test_smoothed_idf() {
        let texts = ["alpha beta", "alpha gamma"];
        let (vectorizer, _) = TfidfVectorizer::fit_transform(&params(1000), &texts).unwrap();

        let alpha = vectorizer.idf[vectorizer.column("alpha").unwrap() as usize];
        let beta = vectorizer.idf[vectorizer.column("beta").unwrap() as usize];
        assert!((alpha - 1.0).abs() < 1e-6);
        assert!((beta - ((3.0f32 / 2.0).ln() + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_rows_are_unit_length() {
        let texts = ["rust ownership borrowing", "garbage collection pauses"];
        let (_, rows) = TfidfVectorizer::fit_transform(&params(1000), &texts).unwrap();
        for row in rows {
            assert!((row.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_unknown_terms_transform_to_zero() {
        let texts = ["rust ownership borrowing"];
        let (vectorizer, _) = TfidfVectorizer::fit_transform(&params(1000), &texts).unwrap();
        assert!(vectorizer.transform("quantum chromodynamics").is_zero());
    }

    #[test]
    fn test_only_stop_words_is_empty_corpus() {
        let texts = ["the and of", "is it"];
        let err = TfidfVectorizer::fit_transform(&params(1000), &texts).unwrap_err();
        assert!(matches!(err, AppError::EmptyCorpus));
    }

    #[test]
    fn test_min_df_prunes_rare_terms() {
        let texts = ["shared unique", "shared other"];
        let strict = VectorizerParams {
            min_df: 2,
            ..Default::default()
        };
        let (vectorizer, _) = TfidfVectorizer::fit_transform(&strict, &texts).unwrap();
        assert_eq!(vectorizer.vocabulary_len(), 1);
        assert!(vectorizer.column("shared").is_some());
    }

    #[test]
    fn test_validate_detects_mismatch() {
        let texts = ["alpha beta"];
        let (mut vectorizer, _) = TfidfVectorizer::fit_transform(&params(1000), &texts).unwrap();
        vectorizer.idf.pop();
        assert!(vectorizer.validate().is_err());
    }
}
