//! Multi-stage confidence retrieval
//!
//! 1. Candidate generation: embed the query and ask the vector index for the
//!    top `5 + 2 * complexity` candidates (capped).
//! 2. Re-ranking: score each (query, candidate) pair with the re-ranker.
//! 3. Fusion: `retrieval_confidence = w_sim * similarity + w_rerank * rerank`.
//! 4. Filtering and ranking: drop passages below the effective threshold and
//!    stable-sort the rest by confidence, so ties keep similarity order.
//!
//! An unreachable index is retried with exponential backoff. When every
//! attempt fails the retriever returns a degraded empty result instead of an
//! error.

use crate::config::RetrievalConfig;
use crate::error::{AletheiaError, Result};
use crate::services::{Candidate, EmbeddingService, Reranker, VectorIndex};
use crate::types::{ComplexityProfile, Query, RetrievalResult, ScoredPassage};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Retrieval stage with injected collaborators
pub struct ConfidenceRetriever {
    config: RetrievalConfig,
    embeddings: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
}

impl ConfidenceRetriever {
    pub fn new(
        config: RetrievalConfig,
        embeddings: Arc<dyn EmbeddingService>,
        index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn Reranker>,
    ) -> Self {
        Self {
            config,
            embeddings,
            index,
            reranker,
        }
    }

    /// Retrieve, re-rank, fuse and filter passages for a query. Never fails.
    pub async fn retrieve(&self, query: &Query, profile: &ComplexityProfile) -> RetrievalResult {
        let top_n = self.config.candidate_count(profile.score);

        let candidates = match self.search_with_retry(&query.text, top_n).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Retrieval degraded for query {}: {}", query.id, e);
                return RetrievalResult::degraded();
            }
        };

        if candidates.is_empty() {
            debug!("Vector index returned no candidates for query {}", query.id);
            return RetrievalResult::empty();
        }

        let rerank_scores = self.rerank(&query.text, &candidates).await;
        let threshold = self.config.effective_threshold();

        let scored: Vec<ScoredPassage> = candidates
            .into_iter()
            .zip(rerank_scores)
            .map(|(candidate, rerank)| self.fuse(candidate, rerank))
            .collect();

        let result = RetrievalResult::ranked(scored, threshold);
        debug!(
            "Query {}: {} of {} candidates cleared threshold {:.2}",
            query.id,
            result.len(),
            top_n,
            threshold
        );
        result
    }

    fn fuse(&self, candidate: Candidate, rerank: f64) -> ScoredPassage {
        let similarity = sanitize(candidate.similarity);
        let rerank = sanitize(rerank);
        let confidence = (self.config.similarity_weight * similarity
            + self.config.rerank_weight * rerank)
            .clamp(0.0, 1.0);

        ScoredPassage {
            passage_id: candidate.id,
            source_doc_id: candidate.source_doc_id,
            text: candidate.text,
            similarity_score: similarity,
            rerank_score: rerank,
            retrieval_confidence: confidence,
        }
    }

    /// Embed the query and search the index, retrying failed searches
    async fn search_with_retry(&self, text: &str, top_n: usize) -> Result<Vec<Candidate>> {
        let embedding = match timeout(self.config.index_timeout(), self.embeddings.embed(text)).await
        {
            Ok(result) => result.map_err(|e| {
                AletheiaError::RetrievalUnavailable(format!("query embedding failed: {}", e))
            })?,
            Err(_) => {
                return Err(AletheiaError::RetrievalUnavailable(
                    "query embedding timed out".to_string(),
                ))
            }
        };

        let mut retries = 0;

        loop {
            let attempt = match timeout(
                self.config.index_timeout(),
                self.index.search(&embedding, top_n),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AletheiaError::RetrievalUnavailable(format!(
                    "vector search timed out after {:?}",
                    self.config.index_timeout()
                ))),
            };

            match attempt {
                Ok(candidates) => return Ok(candidates),
                Err(e) => {
                    if retries >= self.config.max_retries {
                        return Err(AletheiaError::RetrievalUnavailable(format!(
                            "vector index unreachable after {} attempts: {}",
                            retries + 1,
                            e
                        )));
                    }

                    retries += 1;
                    let backoff = self.config.backoff(retries);
                    warn!(
                        "Vector search failed, retrying after {}ms (attempt {}/{}): {}",
                        backoff.as_millis(),
                        retries,
                        self.config.max_retries,
                        e
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    /// Re-ranker scores aligned with `candidates`. Falls back to similarity
    /// when the re-ranker fails, times out or returns a misaligned list.
    async fn rerank(&self, query: &str, candidates: &[Candidate]) -> Vec<f64> {
        let fallback = || candidates.iter().map(|c| c.similarity).collect::<Vec<_>>();

        match timeout(
            self.config.rerank_timeout(),
            self.reranker.rerank(query, candidates),
        )
        .await
        {
            Ok(Ok(scores)) if scores.len() == candidates.len() => scores,
            Ok(Ok(scores)) => {
                warn!(
                    "Re-ranker returned {} scores for {} candidates, using similarity",
                    scores.len(),
                    candidates.len()
                );
                fallback()
            }
            Ok(Err(e)) => {
                warn!("Re-ranker failed, using similarity: {}", e);
                fallback()
            }
            Err(_) => {
                warn!(
                    "Re-ranker timed out after {:?}, using similarity",
                    self.config.rerank_timeout()
                );
                fallback()
            }
        }
    }
}

/// Clamp a collaborator score into `[0, 1]`, mapping NaN to 0
fn sanitize(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
