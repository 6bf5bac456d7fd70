//! Relevance: does the answer address the question?
//!
//! Compares the query with the answer directly, independent of retrieval, so
//! an answer that ignores the question scores low even when well grounded.

use super::{QualityScorer, ScoringInput};
use crate::error::Result;
use crate::services::{cosine_similarity, EmbeddingService};
use crate::utils::text::{content_word_set, default_stopword_set, jaccard};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Embedding cosine between query and answer, falling back to content-word
/// Jaccard when no embedding service is available or it fails
pub struct EmbeddingRelevanceScorer {
    embeddings: Option<Arc<dyn EmbeddingService>>,
}

impl EmbeddingRelevanceScorer {
    pub fn new(embeddings: Arc<dyn EmbeddingService>) -> Self {
        Self {
            embeddings: Some(embeddings),
        }
    }

    /// Lexical-only scorer
    pub fn lexical() -> Self {
        Self { embeddings: None }
    }

    fn lexical_score(query: &str, answer: &str) -> f64 {
        let stop = default_stopword_set();
        jaccard(&content_word_set(query, stop), &content_word_set(answer, stop))
    }

    async fn embedding_score(
        service: &Arc<dyn EmbeddingService>,
        query: &str,
        answer: &str,
    ) -> Result<f64> {
        let query_embedding = service.embed(query).await?;
        let answer_embedding = service.embed(answer).await?;
        Ok((cosine_similarity(&query_embedding, &answer_embedding) as f64).clamp(0.0, 1.0))
    }
}

#[async_trait]
impl QualityScorer for EmbeddingRelevanceScorer {
    fn name(&self) -> &str {
        "relevance"
    }

    async fn score(&self, input: &ScoringInput) -> Result<f64> {
        if input.answer.trim().is_empty() || input.query.trim().is_empty() {
            return Ok(0.0);
        }

        if let Some(service) = &self.embeddings {
            match Self::embedding_score(service, &input.query, &input.answer).await {
                Ok(score) => return Ok(score),
                Err(e) => debug!("Embedding relevance failed, using lexical overlap: {}", e),
            }
        }

        Ok(Self::lexical_score(&input.query, &input.answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AletheiaError;
    use crate::services::HashingEmbeddingService;

    struct BrokenEmbeddings;

    #[async_trait]
    impl EmbeddingService for BrokenEmbeddings {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AletheiaError::Collaborator("offline".to_string()))
        }

        fn dimensions(&self) -> usize {
            0
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    fn input(query: &str, answer: &str) -> ScoringInput {
        ScoringInput {
            query: query.to_string(),
            answer: answer.to_string(),
            passages: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_on_topic_answer_beats_off_topic() {
        let scorer = EmbeddingRelevanceScorer::new(Arc::new(HashingEmbeddingService));

        let on_topic = scorer
            .score(&input("What is the capital of France?", "The capital of France is Paris."))
            .await
            .unwrap();
        let off_topic = scorer
            .score(&input("What is the capital of France?", "Lentil soup simmers slowly."))
            .await
            .unwrap();

        assert!(on_topic > off_topic);
        assert!((0.0..=1.0).contains(&on_topic));
    }

    #[tokio::test]
    async fn test_failing_embeddings_fall_back_to_lexical() {
        let scorer = EmbeddingRelevanceScorer::new(Arc::new(BrokenEmbeddings));
        let score = scorer
            .score(&input("capital France", "France capital"))
            .await
            .unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_answer_scores_zero() {
        let scorer = EmbeddingRelevanceScorer::lexical();
        assert_eq!(scorer.score(&input("capital?", "  ")).await.unwrap(), 0.0);
    }
}
