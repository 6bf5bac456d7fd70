//! Tiered answer delivery
//!
//! Maps calibrated confidence to a tier and strategy, renders the answer for
//! that strategy and leaves an unlabelled feedback record behind. Rendering
//! is a pure function of its inputs.

use crate::config::DeliveryConfig;
use crate::feedback::FeedbackStore;
use crate::generation::GeneratedResponse;
use crate::types::{
    CalibratedConfidence, DeliveryDecision, FeedbackRecord, RetrievalResult, Strategy, Tier,
};
use std::sync::Arc;
use tracing::{debug, error};

const ESCALATE_FAILED: &str = "I wasn't able to produce an answer to this question. \
It has been flagged for human review; rephrasing the question may also help.";

pub struct AdaptiveDeliveryManager {
    config: DeliveryConfig,
    store: Arc<dyn FeedbackStore>,
}

impl AdaptiveDeliveryManager {
    pub fn new(config: DeliveryConfig, store: Arc<dyn FeedbackStore>) -> Self {
        Self { config, store }
    }

    /// Tier for a calibrated confidence; boundaries are inclusive from below
    pub fn tier_for(&self, calibrated: f64) -> Tier {
        if calibrated >= self.config.high_threshold {
            Tier::High
        } else if calibrated >= self.config.medium_threshold {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    /// Escalation returned when no answer could be produced at all
    pub fn fallback_decision() -> DeliveryDecision {
        DeliveryDecision {
            tier: Tier::Low,
            strategy: Strategy::Escalate,
            rendered_answer: ESCALATE_FAILED.to_string(),
            sources: Vec::new(),
        }
    }

    /// Build the decision without side effects
    pub fn decide(
        &self,
        confidence: &CalibratedConfidence,
        response: &GeneratedResponse,
        retrieval: &RetrievalResult,
        cited: &[String],
    ) -> DeliveryDecision {
        let tier = if response.generation_failed() {
            Tier::Low
        } else {
            self.tier_for(confidence.calibrated)
        };
        let strategy = Strategy::for_tier(tier);

        // Rank order comes from the retrieval result, not the citation order
        let sources: Vec<String> = retrieval
            .passages()
            .iter()
            .filter(|p| cited.contains(&p.passage_id))
            .map(|p| p.passage_id.clone())
            .collect();

        let rendered_answer = render(strategy, confidence.calibrated, response, &sources);

        DeliveryDecision {
            tier,
            strategy,
            rendered_answer,
            sources,
        }
    }

    /// Decide, then persist the pending feedback record
    ///
    /// A storage failure is logged; the caller still gets its answer.
    pub async fn deliver(
        &self,
        confidence: &CalibratedConfidence,
        response: &GeneratedResponse,
        retrieval: &RetrievalResult,
        cited: &[String],
    ) -> DeliveryDecision {
        let decision = self.decide(confidence, response, retrieval, cited);

        let record = FeedbackRecord::pending(response.query_id(), confidence, decision.tier);
        match self.store.append(&record).await {
            Ok(()) => debug!(
                "Delivered query {} as {}/{} (calibrated {:.3}, {})",
                response.query_id(),
                decision.tier,
                decision.strategy,
                confidence.calibrated,
                confidence.model_version
            ),
            Err(e) => error!(
                "Failed to persist feedback record for query {}: {}",
                response.query_id(),
                e
            ),
        }

        decision
    }
}

fn render(
    strategy: Strategy,
    calibrated: f64,
    response: &GeneratedResponse,
    sources: &[String],
) -> String {
    match strategy {
        Strategy::Direct => with_sources(response.text().to_string(), sources),
        Strategy::Hedged => with_sources(
            format!(
                "Note: I'm not fully certain about this answer (estimated confidence {}%). \
                 Please verify it against the sources.\n\n{}",
                percent(calibrated),
                response.text()
            ),
            sources,
        ),
        Strategy::Escalate if response.generation_failed() => ESCALATE_FAILED.to_string(),
        Strategy::Escalate => format!(
            "I'm not confident enough to answer this reliably (estimated confidence {}%). \
             I can route the question to a human reviewer, or you can clarify what you're asking.",
            percent(calibrated)
        ),
    }
}

fn with_sources(mut body: String, sources: &[String]) -> String {
    if !sources.is_empty() {
        body.push_str("\n\nSources: ");
        body.push_str(&sources.join(", "));
    }
    body
}

fn percent(calibrated: f64) -> u32 {
    (calibrated.clamp(0.0, 1.0) * 100.0).round() as u32
}
