//! The answer pipeline
//!
//! [`Pipeline`] is built once with its configuration and collaborators and then
//! shared. Each query runs analysis, retrieval, generation, evaluation,
//! calibration and delivery in strict sequence. Nothing is global: two
//! pipelines in one process are fully independent.
//!
//! # Example
//!
//! ```ignore
//! use aletheia_core::{Pipeline, PipelineConfig, Query};
//!
//! let pipeline = Pipeline::builder(PipelineConfig::default())
//!     .vector_index(index)
//!     .token_provider(provider)
//!     .feedback_store(store)
//!     .build()?;
//!
//! let decision = pipeline.answer_query(Query::new("What is the capital of France?")).await;
//! println!("{} ({})", decision.rendered_answer, decision.tier);
//! ```

use crate::analyzer::QueryComplexityAnalyzer;
use crate::calibration::{
    CalibrationRefitter, CalibrationRegistry, CalibrationStatus, ConfidenceCalibrator,
};
use crate::config::PipelineConfig;
use crate::delivery::AdaptiveDeliveryManager;
use crate::error::{AletheiaError, Result};
use crate::evaluation::{
    EmbeddingRelevanceScorer, LexicalFactualityScorer, MultiModalEvaluator, QualityScorer,
    RuleBasedCoherenceScorer,
};
use crate::feedback::{record_label, FeedbackStore, InMemoryFeedbackStore};
use crate::generation::ConfidenceResponseGenerator;
use crate::retrieval::ConfidenceRetriever;
use crate::services::{
    EmbeddingService, HashingEmbeddingService, LexicalReranker, Reranker,
    TokenProbabilityProvider, VectorIndex,
};
use crate::types::{DeliveryDecision, Query, QueryId};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

/// Assembles a [`Pipeline`]
///
/// The vector index and the token provider are required. Everything else has
/// a local default: hashing embeddings, the lexical re-ranker, an in-memory
/// feedback store, a cold-start calibration registry and the built-in quality
/// scorers.
#[must_use]
pub struct PipelineBuilder {
    config: PipelineConfig,
    embeddings: Option<Arc<dyn EmbeddingService>>,
    index: Option<Arc<dyn VectorIndex>>,
    reranker: Option<Arc<dyn Reranker>>,
    provider: Option<Arc<dyn TokenProbabilityProvider>>,
    feedback: Option<Arc<dyn FeedbackStore>>,
    registry: Option<Arc<CalibrationRegistry>>,
    factuality: Option<Arc<dyn QualityScorer>>,
    relevance: Option<Arc<dyn QualityScorer>>,
    coherence: Option<Arc<dyn QualityScorer>>,
}

impl PipelineBuilder {
    pub fn embeddings(mut self, embeddings: Arc<dyn EmbeddingService>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn token_provider(mut self, provider: Arc<dyn TokenProbabilityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn feedback_store(mut self, store: Arc<dyn FeedbackStore>) -> Self {
        self.feedback = Some(store);
        self
    }

    /// Share a registry, e.g. with a refit job running elsewhere
    pub fn calibration_registry(mut self, registry: Arc<CalibrationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn factuality_scorer(mut self, scorer: Arc<dyn QualityScorer>) -> Self {
        self.factuality = Some(scorer);
        self
    }

    pub fn relevance_scorer(mut self, scorer: Arc<dyn QualityScorer>) -> Self {
        self.relevance = Some(scorer);
        self
    }

    pub fn coherence_scorer(mut self, scorer: Arc<dyn QualityScorer>) -> Self {
        self.coherence = Some(scorer);
        self
    }

    /// Validate configuration and wire the stages
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;

        let index = self.index.ok_or_else(|| {
            AletheiaError::InvalidConfig("pipeline requires a vector index".to_string())
        })?;
        let provider = self.provider.ok_or_else(|| {
            AletheiaError::InvalidConfig("pipeline requires a token probability provider".to_string())
        })?;

        let embeddings: Arc<dyn EmbeddingService> = self
            .embeddings
            .unwrap_or_else(|| Arc::new(HashingEmbeddingService::new()));
        let reranker: Arc<dyn Reranker> = self
            .reranker
            .unwrap_or_else(|| Arc::new(LexicalReranker::new()));
        let feedback: Arc<dyn FeedbackStore> = self
            .feedback
            .unwrap_or_else(|| Arc::new(InMemoryFeedbackStore::new()));
        let registry = self.registry.unwrap_or_default();

        let support_threshold = self.config.evaluation.support_threshold;
        let factuality: Arc<dyn QualityScorer> = self
            .factuality
            .unwrap_or_else(|| Arc::new(LexicalFactualityScorer::new(support_threshold)));
        let relevance: Arc<dyn QualityScorer> = match self.relevance {
            Some(scorer) => scorer,
            None => Arc::new(EmbeddingRelevanceScorer::new(embeddings.clone())),
        };
        let coherence: Arc<dyn QualityScorer> = self
            .coherence
            .unwrap_or_else(|| Arc::new(RuleBasedCoherenceScorer::new()));

        let config = self.config;
        let refitter = Arc::new(CalibrationRefitter::new(
            config.calibration.clone(),
            feedback.clone(),
            registry.clone(),
        ));

        info!(
            "Pipeline ready (calibration {}, snapshot {})",
            config.calibration.method,
            registry.current().version
        );

        Ok(Pipeline {
            analyzer: QueryComplexityAnalyzer::new(config.analyzer.clone()),
            retriever: ConfidenceRetriever::new(
                config.retrieval.clone(),
                embeddings,
                index,
                reranker,
            ),
            generator: ConfidenceResponseGenerator::new(config.generation.clone(), provider),
            evaluator: MultiModalEvaluator::new(
                config.evaluation.clone(),
                factuality,
                relevance,
                coherence,
            ),
            calibrator: ConfidenceCalibrator::new(registry),
            delivery: AdaptiveDeliveryManager::new(config.delivery.clone(), feedback.clone()),
            feedback,
            refitter,
            config,
        })
    }
}

/// Confidence-scored question answering
pub struct Pipeline {
    config: PipelineConfig,
    analyzer: QueryComplexityAnalyzer,
    retriever: ConfidenceRetriever,
    generator: ConfidenceResponseGenerator,
    evaluator: MultiModalEvaluator,
    calibrator: ConfidenceCalibrator,
    delivery: AdaptiveDeliveryManager,
    feedback: Arc<dyn FeedbackStore>,
    refitter: Arc<CalibrationRefitter>,
}

impl Pipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            embeddings: None,
            index: None,
            reranker: None,
            provider: None,
            feedback: None,
            registry: None,
            factuality: None,
            relevance: None,
            coherence: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer a query
    ///
    /// Always returns a decision. Degraded stages fall back to their safe
    /// defaults and the tier drops accordingly.
    pub async fn answer_query(&self, query: Query) -> DeliveryDecision {
        match self
            .answer_query_cancellable(query, CancellationToken::new())
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                error!("Pipeline failed unexpectedly, escalating: {}", e);
                AdaptiveDeliveryManager::fallback_decision()
            }
        }
    }

    /// Answer a query unless `cancel` fires first
    ///
    /// Cancellation is honoured up to the start of delivery. A cancelled query
    /// returns [`AletheiaError::Cancelled`] and leaves no feedback record.
    pub async fn answer_query_cancellable(
        &self,
        query: Query,
        cancel: CancellationToken,
    ) -> Result<DeliveryDecision> {
        let span = info_span!("answer_query", query_id = %query.id);
        self.run(query, cancel).instrument(span).await
    }

    async fn run(&self, query: Query, cancel: CancellationToken) -> Result<DeliveryDecision> {
        // Held for the whole query, whatever the refit job publishes meanwhile
        let snapshot = self.calibrator.snapshot();
        debug!("Using calibration snapshot {}", snapshot.version);

        checkpoint(&cancel)?;
        let profile = self.analyzer.analyze(&query);
        debug!(
            "Complexity {} intent {} domains {:?}",
            profile.score, profile.intent, profile.domain_tags
        );

        let retrieval = stage(&cancel, self.retriever.retrieve(&query, &profile)).await?;
        debug!(
            "Retrieved {} passages (degraded: {})",
            retrieval.len(),
            retrieval.is_degraded()
        );

        let response = stage(&cancel, self.generator.generate(&query, &retrieval, &profile)).await?;
        let evaluation = stage(&cancel, self.evaluator.evaluate(&query, &retrieval, &response)).await?;

        let confidence = snapshot.calibrate(evaluation.raw_composite());
        checkpoint(&cancel)?;

        let decision = self
            .delivery
            .deliver(&confidence, &response, &retrieval, evaluation.cited_passages())
            .await;

        info!(
            "Answered: raw {:.3} calibrated {:.3} ({}) -> {}/{}",
            confidence.raw_composite,
            confidence.calibrated,
            confidence.model_version,
            decision.tier,
            decision.strategy
        );
        Ok(decision)
    }

    /// Record whether the answer to `query_id` was correct
    ///
    /// Appends a labelled record superseding the latest one for the query; a
    /// later call for the same query supersedes this one in turn.
    pub async fn submit_feedback(&self, query_id: QueryId, user_correct: bool) -> Result<()> {
        record_label(self.feedback.as_ref(), query_id, user_correct).await?;
        info!(
            "Recorded feedback for query {}: {}",
            query_id,
            if user_correct { "correct" } else { "incorrect" }
        );
        Ok(())
    }

    pub fn calibration_status(&self) -> CalibrationStatus {
        self.calibrator.status()
    }

    /// Refit job sharing this pipeline's store and registry
    pub fn refitter(&self) -> Arc<CalibrationRefitter> {
        self.refitter.clone()
    }

    pub fn calibration_registry(&self) -> &Arc<CalibrationRegistry> {
        self.calibrator.registry()
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        debug!("Query cancelled at stage boundary");
        return Err(AletheiaError::Cancelled);
    }
    Ok(())
}

/// Run one stage, abandoning it if the caller cancels
async fn stage<F, T>(cancel: &CancellationToken, work: F) -> Result<T>
where
    F: Future<Output = T>,
{
    checkpoint(cancel)?;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Query cancelled mid-stage");
            Err(AletheiaError::Cancelled)
        }
        output = work => Ok(output),
    }
}
