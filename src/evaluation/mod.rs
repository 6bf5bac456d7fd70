//! Multi-signal answer evaluation
//!
//! Combines retrieval confidence, generation confidence and three independent
//! quality checks into one raw composite confidence:
//!
//! ```text
//! raw = w_ret * retrieval_avg + w_gen * generation
//!     + w_fact * factuality + w_rel * relevance + w_coh * coherence
//! ```
//!
//! `retrieval_avg` is the mean retrieval confidence over the passages the
//! answer cites (0 when none are cited or retrieval was degraded). When
//! retrieval is empty or degraded the composite is capped at the grounding
//! ceiling.
//!
//! The quality scorers run concurrently behind a per-scorer timeout; a scorer
//! that times out or errors contributes 0.

pub mod citations;
pub mod coherence;
pub mod factuality;
pub mod relevance;

pub use coherence::RuleBasedCoherenceScorer;
pub use factuality::LexicalFactualityScorer;
pub use relevance::EmbeddingRelevanceScorer;

use crate::config::{CompositeWeights, EvaluationConfig};
use crate::error::Result;
use crate::generation::GeneratedResponse;
use crate::types::{Query, RetrievalResult, ScoredPassage};
use crate::utils::text::default_stopword_set;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Everything a quality scorer may look at
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub query: String,
    /// Answer text with citation markers stripped
    pub answer: String,
    /// Passages that cleared retrieval, in rank order
    pub passages: Vec<ScoredPassage>,
}

/// Independent answer-quality check producing a score in `[0, 1]`
#[async_trait]
pub trait QualityScorer: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, input: &ScoringInput) -> Result<f64>;
}

/// Evaluator output
///
/// `raw_composite` is derived from the other fields at construction; use
/// [`EvaluationResult::recompute`] to check it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    factuality: f64,
    relevance: f64,
    coherence: f64,
    retrieval_confidence_avg: f64,
    generation_confidence: f64,
    grounded: bool,
    generation_failed: bool,
    cited_passages: Vec<String>,
    raw_composite: f64,
}

impl EvaluationResult {
    /// Assemble a result, deriving the composite
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        factuality: f64,
        relevance: f64,
        coherence: f64,
        retrieval_confidence_avg: f64,
        generation_confidence: f64,
        grounded: bool,
        generation_failed: bool,
        cited_passages: Vec<String>,
        weights: &CompositeWeights,
        grounding_ceiling: f64,
    ) -> Self {
        let mut result = Self {
            factuality: unit(factuality),
            relevance: unit(relevance),
            coherence: unit(coherence),
            retrieval_confidence_avg: if grounded {
                unit(retrieval_confidence_avg)
            } else {
                0.0
            },
            generation_confidence: unit(generation_confidence),
            grounded,
            generation_failed,
            cited_passages,
            raw_composite: 0.0,
        };
        result.raw_composite = result.recompute(weights, grounding_ceiling);
        result
    }

    pub fn factuality(&self) -> f64 {
        self.factuality
    }

    pub fn relevance(&self) -> f64 {
        self.relevance
    }

    pub fn coherence(&self) -> f64 {
        self.coherence
    }

    pub fn retrieval_confidence_avg(&self) -> f64 {
        self.retrieval_confidence_avg
    }

    pub fn generation_confidence(&self) -> f64 {
        self.generation_confidence
    }

    /// Retrieval returned passages and was not degraded
    pub fn grounded(&self) -> bool {
        self.grounded
    }

    pub fn generation_failed(&self) -> bool {
        self.generation_failed
    }

    /// IDs of the cited passages, in retrieval rank order
    pub fn cited_passages(&self) -> &[String] {
        &self.cited_passages
    }

    pub fn raw_composite(&self) -> f64 {
        self.raw_composite
    }

    /// Composite from the stored signals
    pub fn recompute(&self, weights: &CompositeWeights, grounding_ceiling: f64) -> f64 {
        let raw = weights.retrieval * self.retrieval_confidence_avg
            + weights.generation * self.generation_confidence
            + weights.factuality * self.factuality
            + weights.relevance * self.relevance
            + weights.coherence * self.coherence;
        let raw = unit(raw);

        if self.grounded {
            raw
        } else {
            raw.min(grounding_ceiling)
        }
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Evaluation stage
pub struct MultiModalEvaluator {
    config: EvaluationConfig,
    factuality: Arc<dyn QualityScorer>,
    relevance: Arc<dyn QualityScorer>,
    coherence: Arc<dyn QualityScorer>,
}

impl MultiModalEvaluator {
    pub fn new(
        config: EvaluationConfig,
        factuality: Arc<dyn QualityScorer>,
        relevance: Arc<dyn QualityScorer>,
        coherence: Arc<dyn QualityScorer>,
    ) -> Self {
        Self {
            config,
            factuality,
            relevance,
            coherence,
        }
    }

    pub fn weights(&self) -> &CompositeWeights {
        &self.config.weights
    }

    pub fn grounding_ceiling(&self) -> f64 {
        self.config.grounding_ceiling
    }

    /// Score a generated answer. Never fails.
    pub async fn evaluate(
        &self,
        query: &Query,
        retrieval: &RetrievalResult,
        response: &GeneratedResponse,
    ) -> EvaluationResult {
        let grounded = !retrieval.is_empty() && !retrieval.is_degraded();
        let passages = retrieval.passages();

        let cited: Vec<usize> = if grounded && !response.generation_failed() {
            citations::cited_indices(
                response.text(),
                passages,
                self.config.citation_overlap_threshold,
                default_stopword_set(),
            )
        } else {
            Vec::new()
        };

        let retrieval_avg = if cited.is_empty() {
            0.0
        } else {
            cited
                .iter()
                .map(|&i| passages[i].retrieval_confidence)
                .sum::<f64>()
                / cited.len() as f64
        };
        let cited_ids: Vec<String> = cited.iter().map(|&i| passages[i].passage_id.clone()).collect();

        let (factuality, relevance, coherence) = if response.generation_failed() {
            debug!("Generation failed for query {}, skipping quality scorers", query.id);
            (0.0, 0.0, 0.0)
        } else {
            let input = ScoringInput {
                query: query.text.clone(),
                answer: citations::strip_markers(response.text()),
                passages: passages.to_vec(),
            };
            tokio::join!(
                self.run_scorer(self.factuality.as_ref(), &input),
                self.run_scorer(self.relevance.as_ref(), &input),
                self.run_scorer(self.coherence.as_ref(), &input),
            )
        };

        let result = EvaluationResult::new(
            factuality,
            relevance,
            coherence,
            retrieval_avg,
            response.raw_generation_confidence(),
            grounded,
            response.generation_failed(),
            cited_ids,
            &self.config.weights,
            self.config.grounding_ceiling,
        );

        debug!(
            "Query {} evaluation: fact {:.3} rel {:.3} coh {:.3} ret_avg {:.3} gen {:.3} -> raw {:.4}",
            query.id,
            result.factuality(),
            result.relevance(),
            result.coherence(),
            result.retrieval_confidence_avg(),
            result.generation_confidence(),
            result.raw_composite()
        );
        result
    }

    async fn run_scorer(&self, scorer: &dyn QualityScorer, input: &ScoringInput) -> f64 {
        let deadline = self.config.scorer_timeout();
        match timeout(deadline, scorer.score(input)).await {
            Ok(Ok(score)) => unit(score),
            Ok(Err(e)) => {
                warn!("{} scorer failed, contributing 0: {}", scorer.name(), e);
                0.0
            }
            Err(_) => {
                warn!(
                    "{} scorer timed out after {:?}, contributing 0",
                    scorer.name(),
                    deadline
                );
                0.0
            }
        }
    }
}
