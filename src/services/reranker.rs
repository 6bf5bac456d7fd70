//! Re-ranker collaborator
//!
//! `rerank(query, candidates)` scores each (query, candidate) pair, returning
//! one score in `[0, 1]` per candidate, aligned by index.

use crate::error::Result;
use crate::services::vector_index::Candidate;
use crate::utils::text::{containment, content_word_set, default_stopword_set, jaccard};
use async_trait::async_trait;

/// Cross-encoder style re-ranker
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, candidates: &[Candidate]) -> Result<Vec<f64>>;
}

/// Lexical stand-in for a cross-encoder
///
/// Scores a candidate by how much of the query's content vocabulary it covers,
/// blended with Jaccard overlap so that long unfocused passages do not win on
/// coverage alone.
#[derive(Debug, Clone, Default)]
pub struct LexicalReranker;

impl LexicalReranker {
    pub fn new() -> Self {
        Self
    }

    pub fn score_pair(query: &str, passage: &str) -> f64 {
        let stop = default_stopword_set();
        let query_words = content_word_set(query, stop);
        let passage_words = content_word_set(passage, stop);

        let coverage = containment(&query_words, &passage_words);
        let overlap = jaccard(&query_words, &passage_words);
        (0.8 * coverage + 0.2 * overlap).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn rerank(&self, query: &str, candidates: &[Candidate]) -> Result<Vec<f64>> {
        Ok(candidates
            .iter()
            .map(|c| Self::score_pair(query, &c.text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, text: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            source_doc_id: "doc".to_string(),
            text: text.to_string(),
            similarity: 0.5,
        }
    }

    #[tokio::test]
    async fn test_rerank_aligned_with_candidates() {
        let candidates = vec![
            candidate("a", "Lentil soup simmers slowly."),
            candidate("b", "Paris is the capital of France."),
        ];

        let scores = LexicalReranker
            .rerank("What is the capital of France?", &candidates)
            .await
            .unwrap();

        assert_eq!(scores.len(), 2);
        assert!(scores[1] > scores[0]);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_full_coverage_scores_high() {
        let score = LexicalReranker::score_pair("capital France", "capital France");
        assert!((score - 1.0).abs() < 1e-9);
    }
}
