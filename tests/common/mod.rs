//! Common test utilities and helpers

#![allow(dead_code)]

use aletheia_core::{
    error::{AletheiaError, Result},
    evaluation::{QualityScorer, ScoringInput},
    services::{
        Candidate, GeneratedToken, GenerationOutput, GenerationRequest, Reranker,
        TokenProbabilityProvider, VectorIndex,
    },
    FeedbackStore, Pipeline, PipelineConfig,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const FRANCE_QUERY: &str = "What is the capital of France?";

/// Index that always returns the same candidates
pub struct StaticIndex(pub Vec<Candidate>);

#[async_trait]
impl VectorIndex for StaticIndex {
    async fn search(&self, _embedding: &[f32], top_n: usize) -> Result<Vec<Candidate>> {
        Ok(self.0.iter().take(top_n).cloned().collect())
    }
}

/// Index that is never reachable
pub struct DownIndex;

#[async_trait]
impl VectorIndex for DownIndex {
    async fn search(&self, _embedding: &[f32], _top_n: usize) -> Result<Vec<Candidate>> {
        Err(AletheiaError::Collaborator("connection refused".to_string()))
    }
}

/// Re-ranker returning the same score for every candidate
pub struct ConstantReranker(pub f64);

#[async_trait]
impl Reranker for ConstantReranker {
    async fn rerank(&self, _query: &str, candidates: &[Candidate]) -> Result<Vec<f64>> {
        Ok(vec![self.0; candidates.len()])
    }
}

/// Provider answering with fixed text, every token at one probability
pub struct ScriptedProvider {
    pub text: String,
    pub probability: f64,
    pub delay: Duration,
}

impl ScriptedProvider {
    pub fn new(text: &str, probability: f64) -> Self {
        Self {
            text: text.to_string(),
            probability,
            delay: Duration::ZERO,
        }
    }

    pub fn slow(text: &str, probability: f64, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(text, probability)
        }
    }
}

#[async_trait]
impl TokenProbabilityProvider for ScriptedProvider {
    async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationOutput> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let tokens = self
            .text
            .split_whitespace()
            .map(|word| GeneratedToken {
                text: format!(" {}", word),
                probability: self.probability,
            })
            .collect();
        Ok(GenerationOutput {
            text: self.text.clone(),
            tokens,
        })
    }
}

/// Quality scorer with a fixed output
pub struct FixedScorer {
    pub name: &'static str,
    pub score: f64,
}

#[async_trait]
impl QualityScorer for FixedScorer {
    fn name(&self) -> &str {
        self.name
    }

    async fn score(&self, _input: &ScoringInput) -> Result<f64> {
        Ok(self.score)
    }
}

pub fn candidate(id: &str, text: &str, similarity: f64) -> Candidate {
    Candidate {
        id: id.to_string(),
        source_doc_id: "atlas".to_string(),
        text: text.to_string(),
        similarity,
    }
}

pub fn france_passage() -> Candidate {
    candidate(
        "france-capital",
        "Paris is the capital and largest city of France.",
        0.95,
    )
}

/// Defaults with collaborator timeouts and backoff shrunk for tests
pub fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.retrieval.backoff_base_ms = 1;
    config.retrieval.index_timeout_ms = 200;
    config.retrieval.rerank_timeout_ms = 200;
    config.generation.timeout_ms = 1_000;
    config.evaluation.scorer_timeout_ms = 1_000;
    config
}

/// Pipeline with fixed quality scores so the composite is known in advance
pub fn fixed_score_pipeline(
    config: PipelineConfig,
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
    provider: Arc<dyn TokenProbabilityProvider>,
    store: Arc<dyn FeedbackStore>,
    scores: (f64, f64, f64),
) -> Pipeline {
    let (factuality, relevance, coherence) = scores;
    Pipeline::builder(config)
        .vector_index(index)
        .reranker(reranker)
        .token_provider(provider)
        .feedback_store(store)
        .factuality_scorer(Arc::new(FixedScorer {
            name: "factuality",
            score: factuality,
        }))
        .relevance_scorer(Arc::new(FixedScorer {
            name: "relevance",
            score: relevance,
        }))
        .coherence_scorer(Arc::new(FixedScorer {
            name: "coherence",
            score: coherence,
        }))
        .build()
        .expect("Failed to build test pipeline")
}
