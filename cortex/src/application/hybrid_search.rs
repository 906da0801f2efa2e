// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Hybrid Search
//!
//! Ranks playbook bullets against a query by fusing dense (embedding) and
//! lexical (BM25) relevance.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Retrieval over one namespace's playbook
//!
//! # Algorithm
//!
//! 1. Filter candidates by section, then by `confidence_score >= min_confidence`.
//! 2. Dense: cosine similarity between the query vector and every candidate's
//!    `searchable_text` vector, min-max normalized.
//! 3. Lexical: BM25 Okapi over the candidate set only, min-max normalized.
//! 4. Fuse: `combined = alpha * dense + (1 - alpha) * lexical`.
//! 5. Stable sort descending (ties keep playbook order), truncate to `top_k`.
//!
//! Both normalizations map an all-equal score vector to 0.5.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::lexical::Bm25;
use crate::application::scoring::{cosine, min_max_normalize};
use crate::domain::embedding::{EmbeddingError, EmbeddingProvider};
use crate::domain::playbook::{Bullet, Playbook};

pub const DEFAULT_ALPHA: f64 = 0.5;
pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query_text: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Only bullets in one of these sections are candidates. `None` or an
    /// empty list means no section filtering.
    #[serde(default)]
    pub section_filter: Option<Vec<String>>,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_min_confidence() -> f64 {
    DEFAULT_MIN_CONFIDENCE
}

impl SearchQuery {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            top_k: DEFAULT_TOP_K,
            section_filter: None,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_sections(mut self, sections: Vec<String>) -> Self {
        self.section_filter = Some(sections);
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    fn admits(&self, bullet: &Bullet) -> bool {
        let in_section = match &self.section_filter {
            Some(sections) if !sections.is_empty() => sections.iter().any(|s| s == &bullet.section),
            _ => true,
        };
        in_section && bullet.confidence_score() >= self.min_confidence
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub bullet: Bullet,
    pub vector_score: f64,
    pub lexical_score: f64,
    pub combined_score: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Fusion weight alpha must be within [0, 1], got {0}")]
    InvalidAlpha(f64),
}

/// Hybrid retrieval engine. `alpha` is fixed for the lifetime of the instance.
pub struct HybridSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    alpha: f64,
}

impl HybridSearch {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, alpha: f64) -> Result<Self, SearchError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(SearchError::InvalidAlpha(alpha));
        }
        Ok(Self { embedder, alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub async fn search(
        &self,
        query: &SearchQuery,
        playbook: &Playbook,
    ) -> Result<Vec<SearchResult>, SearchError> {
        metrics::counter!("playbook_search_requests_total").increment(1);

        let candidates: Vec<&Bullet> = playbook.bullets.iter().filter(|b| query.admits(b)).collect();
        debug!(
            total = playbook.len(),
            candidates = candidates.len(),
            "Filtered search candidates"
        );
        if candidates.is_empty() {
            metrics::histogram!("playbook_search_results").record(0.0);
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|b| b.searchable_text.clone()).collect();
        let vector_scores = self.vector_scores(&query.query_text, &texts).await?;
        let lexical_scores = lexical_scores(&query.query_text, &texts);

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .zip(vector_scores)
            .zip(lexical_scores)
            .map(|((bullet, vector_score), lexical_score)| SearchResult {
                bullet: bullet.clone(),
                vector_score,
                lexical_score,
                combined_score: self.alpha * vector_score + (1.0 - self.alpha) * lexical_score,
            })
            .collect();

        // sort_by is stable: equal scores keep playbook order
        results.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
        results.truncate(query.top_k);

        metrics::histogram!("playbook_search_results").record(results.len() as f64);
        Ok(results)
    }

    async fn vector_scores(&self, query_text: &str, texts: &[String]) -> Result<Vec<f64>, SearchError> {
        let query_vector = self.embedder.embed(query_text).await?;
        let doc_vectors = self.embedder.embed_batch(texts).await?;
        if doc_vectors.len() != texts.len() {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} vectors, got {}",
                texts.len(),
                doc_vectors.len()
            ))
            .into());
        }

        check_vector(&query_vector, query_vector.len(), "query")?;
        for (i, vector) in doc_vectors.iter().enumerate() {
            check_vector(vector, query_vector.len(), &format!("candidate {}", i))?;
        }

        let mut scores: Vec<f64> = doc_vectors.iter().map(|v| cosine(v, &query_vector)).collect();
        min_max_normalize(&mut scores);
        Ok(scores)
    }
}

/// Reject vectors that would make cosine scores meaningless.
fn check_vector(vector: &[f32], dimension: usize, label: &str) -> Result<(), EmbeddingError> {
    if vector.len() != dimension {
        return Err(EmbeddingError::Malformed(format!(
            "{} has dimension {}, expected {}",
            label,
            vector.len(),
            dimension
        )));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::Malformed(format!("{} contains a non-finite component", label)));
    }
    Ok(())
}

fn lexical_scores(query_text: &str, texts: &[String]) -> Vec<f64> {
    let mut scores = Bm25::new(texts).scores(query_text);
    min_max_normalize(&mut scores);
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Embeds text as [len(text), 1.0] so results are predictable.
    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![text.len() as f32, 1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Network("connection refused".into()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Network("connection refused".into()))
        }
    }

    struct ShortBatchEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortBatchEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0])
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(vec![vec![1.0]])
        }
    }

    /// Returns `bad` for the second candidate and `[1.0, 0.0]` for everything else.
    struct OddVectorEmbedder {
        bad: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for OddVectorEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok((0..texts.len())
                .map(|i| if i == 1 { self.bad.clone() } else { vec![1.0, 0.0] })
                .collect())
        }
    }

    fn engine(alpha: f64) -> HybridSearch {
        HybridSearch::new(Arc::new(LengthEmbedder), alpha).unwrap()
    }

    fn sample_playbook() -> Playbook {
        let mut playbook = Playbook::new();
        playbook.push(Bullet::new("strategies", "check the units of every quantity").with_id("a"));
        playbook.push(Bullet::new("pitfalls", "integer division truncates").with_id("b"));
        playbook.push(Bullet::new("strategies", "restate the question in your own words").with_id("c"));
        playbook.push(Bullet::new("pitfalls", "off by one errors in loops").with_id("d"));
        playbook
    }

    #[test]
    fn test_invalid_alpha() {
        assert!(matches!(
            HybridSearch::new(Arc::new(LengthEmbedder), 1.5),
            Err(SearchError::InvalidAlpha(_))
        ));
        assert!(HybridSearch::new(Arc::new(LengthEmbedder), -0.01).is_err());
        assert!(HybridSearch::new(Arc::new(LengthEmbedder), 0.0).is_ok());
        assert!(HybridSearch::new(Arc::new(LengthEmbedder), 1.0).is_ok());
    }

    #[tokio::test]
    async fn test_empty_playbook_returns_nothing() {
        let results = engine(0.5)
            .search(&SearchQuery::new("anything"), &Playbook::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_min_confidence_filters_candidates() {
        let mut playbook = Playbook::new();
        playbook.push(Bullet::new("s", "trusted advice").with_id("trusted").with_counters(5, 0));
        playbook.push(Bullet::new("s", "untested advice").with_id("fresh"));

        let query = SearchQuery::new("advice").with_min_confidence(0.6);
        let results = engine(0.5).search(&query, &playbook).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bullet.id.as_str(), "trusted");
        // Single candidate: both normalizations are flat
        assert_eq!(results[0].vector_score, 0.5);
        assert_eq!(results[0].lexical_score, 0.5);
    }

    #[tokio::test]
    async fn test_failing_embedder_skips_filtered_search() {
        // Every bullet is filtered out, so the embedder is never called
        let mut playbook = Playbook::new();
        playbook.push(Bullet::new("s", "bad advice").with_counters(0, 3));
        let search = HybridSearch::new(Arc::new(FailingEmbedder), 0.5).unwrap();
        let results = search.search(&SearchQuery::new("advice"), &playbook).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_an_error() {
        let search = HybridSearch::new(Arc::new(FailingEmbedder), 0.5).unwrap();
        let result = search.search(&SearchQuery::new("units"), &sample_playbook()).await;
        assert!(matches!(result, Err(SearchError::Embedding(EmbeddingError::Network(_)))));
    }

    #[tokio::test]
    async fn test_batch_length_mismatch_is_malformed() {
        let search = HybridSearch::new(Arc::new(ShortBatchEmbedder), 0.5).unwrap();
        let result = search.search(&SearchQuery::new("units"), &sample_playbook()).await;
        assert!(matches!(result, Err(SearchError::Embedding(EmbeddingError::Malformed(_)))));
    }

    #[tokio::test]
    async fn test_non_finite_vector_is_malformed() {
        let embedder = OddVectorEmbedder { bad: vec![f32::NAN, 0.0] };
        let search = HybridSearch::new(Arc::new(embedder), 0.5).unwrap();
        let result = search.search(&SearchQuery::new("units"), &sample_playbook()).await;
        assert!(matches!(result, Err(SearchError::Embedding(EmbeddingError::Malformed(_)))));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_malformed() {
        let embedder = OddVectorEmbedder { bad: vec![1.0, 0.0, 0.5] };
        let search = HybridSearch::new(Arc::new(embedder), 0.5).unwrap();
        let result = search.search(&SearchQuery::new("units"), &sample_playbook()).await;
        assert!(matches!(result, Err(SearchError::Embedding(EmbeddingError::Malformed(_)))));
    }

    #[tokio::test]
    async fn test_results_sorted_and_truncated() {
        let query = SearchQuery::new("integer division").with_top_k(2);
        let results = engine(0.5).search(&query, &sample_playbook()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].combined_score >= results[1].combined_score);
        for r in &results {
            assert!((0.0..=1.0).contains(&r.vector_score));
            assert!((0.0..=1.0).contains(&r.lexical_score));
        }
    }

    #[tokio::test]
    async fn test_section_filter() {
        let query = SearchQuery::new("units").with_sections(vec!["pitfalls".to_string()]);
        let results = engine(0.5).search(&query, &sample_playbook()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.bullet.section == "pitfalls"));

        // Empty filter means no filtering
        let query = SearchQuery::new("units").with_sections(vec![]);
        let results = engine(0.5).search(&query, &sample_playbook()).await.unwrap();
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn test_alpha_extremes_select_one_signal() {
        let playbook = sample_playbook();
        let query = SearchQuery::new("integer division truncates");

        let dense_only = engine(1.0).search(&query, &playbook).await.unwrap();
        for r in &dense_only {
            assert_eq!(r.combined_score, r.vector_score);
        }

        let lexical_only = engine(0.0).search(&query, &playbook).await.unwrap();
        for r in &lexical_only {
            assert_eq!(r.combined_score, r.lexical_score);
        }
        assert_eq!(lexical_only[0].bullet.id.as_str(), "b");
    }

    #[tokio::test]
    async fn test_ties_keep_playbook_order() {
        let mut playbook = Playbook::new();
        for id in ["first", "second", "third"] {
            playbook.push(Bullet::new("s", "same text").with_id(id));
        }
        let results = engine(0.5).search(&SearchQuery::new("same"), &playbook).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.bullet.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }
}
