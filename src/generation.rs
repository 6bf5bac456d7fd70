//! Response generation with token-level confidence
//!
//! The generator routes the query to a model by complexity, builds a grounded
//! prompt from the retrieved passages and delegates completion to a
//! [`TokenProbabilityProvider`]. The token trace it gets back is folded into a
//! single raw generation confidence:
//!
//! - geometric mean of token probabilities, skipping stopwords and punctuation
//!   (all tokens are used when every token is boilerplate)
//! - multiplied by the hedge penalty when the text contains a hedge phrase
//!
//! A timeout or failed completion yields an empty response with confidence 0
//! and the failure recorded, which downstream forces the `low` tier.

use crate::config::GenerationConfig;
use crate::error::AletheiaError;
use crate::services::{GeneratedToken, GenerationRequest, TokenProbabilityProvider};
use crate::types::{ComplexityProfile, Query, QueryId, RetrievalResult};
use crate::utils::text::{is_boilerplate_token, normalize};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Why generation produced no usable answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationFailure {
    Timeout(Duration),
    Failed(String),
}

impl std::fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationFailure::Timeout(d) => write!(f, "timed out after {:?}", d),
            GenerationFailure::Failed(reason) => write!(f, "{}", reason),
        }
    }
}

impl From<AletheiaError> for GenerationFailure {
    fn from(err: AletheiaError) -> Self {
        match err {
            AletheiaError::GenerationTimeout(d) => GenerationFailure::Timeout(d),
            other => GenerationFailure::Failed(other.to_string()),
        }
    }
}

/// Generated answer and its token-level confidence
///
/// `raw_generation_confidence` is derived from the token trace at construction
/// and has no setter; [`GeneratedResponse::recompute_confidence`] reproduces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    query_id: QueryId,
    model: String,
    text: String,
    tokens: Vec<GeneratedToken>,
    raw_generation_confidence: f64,
    uncertainty_markers_detected: bool,
    failure: Option<GenerationFailure>,
}

impl GeneratedResponse {
    /// Build a response from a completion and its token trace, deriving the
    /// confidence fields
    pub fn from_trace(
        query_id: QueryId,
        model: String,
        text: String,
        tokens: Vec<GeneratedToken>,
        stopwords: &HashSet<String>,
        hedge_phrases: &[String],
        hedge_penalty: f64,
    ) -> Self {
        let tokens: Vec<GeneratedToken> = tokens
            .into_iter()
            .map(|t| GeneratedToken {
                probability: clamp_probability(t.probability),
                text: t.text,
            })
            .collect();

        let uncertainty_markers_detected = contains_hedge(&text, hedge_phrases);
        let raw_generation_confidence = aggregate_confidence(
            &tokens,
            stopwords,
            uncertainty_markers_detected,
            hedge_penalty,
        );

        Self {
            query_id,
            model,
            text,
            tokens,
            raw_generation_confidence,
            uncertainty_markers_detected,
            failure: None,
        }
    }

    /// Empty response standing in for a timed out or failed generation
    pub fn failed(query_id: QueryId, model: impl Into<String>, failure: GenerationFailure) -> Self {
        Self {
            query_id,
            model: model.into(),
            text: String::new(),
            tokens: Vec::new(),
            raw_generation_confidence: 0.0,
            uncertainty_markers_detected: false,
            failure: Some(failure),
        }
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    /// Model the query was routed to
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[GeneratedToken] {
        &self.tokens
    }

    /// Per-token probabilities aligned with [`tokens`](Self::tokens)
    pub fn token_confidences(&self) -> Vec<f64> {
        self.tokens.iter().map(|t| t.probability).collect()
    }

    pub fn raw_generation_confidence(&self) -> f64 {
        self.raw_generation_confidence
    }

    pub fn uncertainty_markers_detected(&self) -> bool {
        self.uncertainty_markers_detected
    }

    /// `generationFailed`: timeout or malformed/empty output
    pub fn generation_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure(&self) -> Option<&GenerationFailure> {
        self.failure.as_ref()
    }

    /// Re-derive the raw generation confidence from the token trace
    pub fn recompute_confidence(&self, stopwords: &HashSet<String>, hedge_penalty: f64) -> f64 {
        if self.generation_failed() {
            return 0.0;
        }
        aggregate_confidence(
            &self.tokens,
            stopwords,
            self.uncertainty_markers_detected,
            hedge_penalty,
        )
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Geometric mean over content tokens, with the hedge penalty applied
pub fn aggregate_confidence(
    tokens: &[GeneratedToken],
    stopwords: &HashSet<String>,
    hedged: bool,
    hedge_penalty: f64,
) -> f64 {
    let content: Vec<f64> = tokens
        .iter()
        .filter(|t| !is_boilerplate_token(&t.text, stopwords))
        .map(|t| t.probability)
        .collect();

    let probabilities: Vec<f64> = if content.is_empty() {
        tokens.iter().map(|t| t.probability).collect()
    } else {
        content
    };

    let base = geometric_mean(&probabilities);
    if hedged {
        (base * hedge_penalty).clamp(0.0, 1.0)
    } else {
        base
    }
}

fn geometric_mean(values: &[f64]) -> f64 {
    if values.is_empty() || values.iter().any(|p| *p <= 0.0) {
        return 0.0;
    }
    let log_sum: f64 = values.iter().map(|p| p.ln()).sum();
    (log_sum / values.len() as f64).exp().clamp(0.0, 1.0)
}

fn contains_hedge(text: &str, hedge_phrases: &[String]) -> bool {
    let normalized = normalize(text);
    hedge_phrases
        .iter()
        .any(|phrase| !phrase.is_empty() && normalized.contains(phrase.as_str()))
}

/// Generation stage
pub struct ConfidenceResponseGenerator {
    config: GenerationConfig,
    provider: Arc<dyn TokenProbabilityProvider>,
    stopwords: HashSet<String>,
    hedge_phrases: Vec<String>,
}

impl ConfidenceResponseGenerator {
    pub fn new(config: GenerationConfig, provider: Arc<dyn TokenProbabilityProvider>) -> Self {
        let stopwords = config.stopwords.iter().map(|s| s.to_lowercase()).collect();
        let hedge_phrases = config.hedge_phrases.iter().map(|p| normalize(p)).collect();
        Self {
            config,
            provider,
            stopwords,
            hedge_phrases,
        }
    }

    /// Stopwords excluded from the confidence aggregate
    pub fn stopwords(&self) -> &HashSet<String> {
        &self.stopwords
    }

    pub fn hedge_penalty(&self) -> f64 {
        self.config.hedge_penalty
    }

    /// Model for a complexity score
    pub fn select_model(&self, profile: &ComplexityProfile) -> &str {
        if profile.score >= self.config.large_model_min_complexity {
            &self.config.large_model
        } else if self.config.cost_aware_routing
            && profile.score <= self.config.small_model_max_complexity
        {
            &self.config.small_model
        } else {
            &self.config.default_model
        }
    }

    /// Grounded prompt: numbered passages, prior turns, then the question
    pub fn build_prompt(query: &Query, retrieval: &RetrievalResult) -> String {
        let mut prompt = String::new();

        if retrieval.is_empty() {
            prompt.push_str(
                "No supporting passages were found. If you cannot answer from general \
                 knowledge, say that you don't have enough information.\n\n",
            );
        } else {
            prompt.push_str(
                "Answer using the passages below. Cite passages you rely on by their \
                 number in square brackets, e.g. [1].\n\n",
            );
            for (i, passage) in retrieval.passages().iter().enumerate() {
                let _ = writeln!(prompt, "[{}] ({}) {}", i + 1, passage.passage_id, passage.text);
            }
            prompt.push('\n');
        }

        if !query.conversation_context.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for turn in &query.conversation_context {
                let _ = writeln!(prompt, "{}: {}", turn.role, turn.content);
            }
            prompt.push('\n');
        }

        let _ = write!(prompt, "Question: {}\nAnswer:", query.text.trim());
        prompt
    }

    /// Generate an answer. Never fails: problems are recorded on the response.
    pub async fn generate(
        &self,
        query: &Query,
        retrieval: &RetrievalResult,
        profile: &ComplexityProfile,
    ) -> GeneratedResponse {
        let model = self.select_model(profile).to_string();
        let request = GenerationRequest {
            model: model.clone(),
            prompt: Self::build_prompt(query, retrieval),
            max_tokens: profile.estimated_token_budget,
        };

        debug!(
            "Generating answer for query {} with {} (max {} tokens)",
            query.id, model, request.max_tokens
        );

        let deadline = self.config.timeout();
        let output = match timeout(deadline, self.provider.generate(&request)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Generation failed for query {}: {}", query.id, e);
                return GeneratedResponse::failed(query.id, model, e.into());
            }
            Err(_) => {
                warn!("Generation timed out for query {} after {:?}", query.id, deadline);
                return GeneratedResponse::failed(query.id, model, GenerationFailure::Timeout(deadline));
            }
        };

        if output.text.trim().is_empty() || output.tokens.is_empty() {
            warn!("Generation returned empty output for query {}", query.id);
            return GeneratedResponse::failed(
                query.id,
                model,
                GenerationFailure::Failed("empty completion".to_string()),
            );
        }

        let response = GeneratedResponse::from_trace(
            query.id,
            model,
            output.text.trim().to_string(),
            output.tokens,
            &self.stopwords,
            &self.hedge_phrases,
            self.config.hedge_penalty,
        );

        debug!(
            "Query {} generation confidence {:.4} (hedged: {})",
            query.id,
            response.raw_generation_confidence(),
            response.uncertainty_markers_detected()
        );
        response
    }
}
