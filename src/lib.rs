//! Aletheia - Confidence-Scored Retrieval and Generation
//!
//! Answers a question from a passage corpus and attaches a calibrated
//! probability that the answer is correct. That probability decides how the
//! answer is delivered:
//! - high confidence: presented directly with its sources
//! - medium confidence: presented behind a calibrated caveat
//! - low confidence: withheld and escalated for review or clarification
//!
//! # Architecture
//!
//! One query flows through six stages in sequence:
//! - **Analyzer**: complexity score, domain tags, intent, token budget
//! - **Retrieval**: vector search, re-ranking, confidence fusion, filtering
//! - **Generation**: model routing and token-probability confidence
//! - **Evaluation**: factuality, relevance and coherence scorers fused with
//!   the retrieval and generation signals into a raw composite
//! - **Calibration**: temperature, isotonic or Platt mapping fitted on user
//!   feedback, published as immutable versioned snapshots
//! - **Delivery**: tiering, rendering and the pending feedback record
//!
//! External systems (vector index, re-ranker, LLM, feedback storage) sit
//! behind traits in [`services`] and [`feedback`].
//!
//! # Example
//!
//! ```ignore
//! use aletheia_core::{Pipeline, PipelineConfig, Query};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::builder(PipelineConfig::load(None)?)
//!         .vector_index(index)
//!         .token_provider(provider)
//!         .build()?;
//!
//!     let query = Query::new("What is the capital of France?");
//!     let query_id = query.id;
//!     let decision = pipeline.answer_query(query).await;
//!     println!("{}", decision.rendered_answer);
//!
//!     // Later, once the user has confirmed the answer
//!     pipeline.submit_feedback(query_id, true).await?;
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod calibration;
pub mod config;
pub mod delivery;
pub mod error;
pub mod evaluation;
pub mod feedback;
pub mod generation;
pub mod pipeline;
pub mod retrieval;
pub mod services;
pub mod telemetry;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use analyzer::QueryComplexityAnalyzer;
pub use calibration::{
    CalibrationModel, CalibrationRefitter, CalibrationRegistry, CalibrationSnapshot,
    CalibrationStatus, ConfidenceCalibrator, RefitOutcome,
};
pub use config::PipelineConfig;
pub use delivery::AdaptiveDeliveryManager;
pub use error::{AletheiaError, Result};
pub use evaluation::{EvaluationResult, MultiModalEvaluator, QualityScorer};
pub use feedback::{FeedbackStore, InMemoryFeedbackStore, LibsqlFeedbackStore};
pub use generation::{ConfidenceResponseGenerator, GeneratedResponse, GenerationFailure};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use retrieval::ConfidenceRetriever;
pub use types::{
    CalibratedConfidence, CalibrationMethod, ComplexityProfile, ConversationTurn,
    DeliveryDecision, FeedbackRecord, Query, QueryId, QueryIntent, RetrievalResult, Role,
    ScoredPassage, Strategy, Tier,
};
