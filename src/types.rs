//! Core data types for the Aletheia answer pipeline
//!
//! Each pipeline stage owns exactly one of these records. Stages never mutate
//! a record produced upstream; they derive new ones, so a full answer can be
//! traced back through every intermediate value.
//!
//! `GeneratedResponse` and `EvaluationResult` live next to the rules that
//! derive their confidence values (`generation` and `evaluation`) so that the
//! derived fields cannot be set from outside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Unique identifier for queries
///
/// Wraps a UUID to keep query IDs apart from feedback and passage IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(pub Uuid);

impl QueryId {
    /// Create a new random query ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a query ID from a string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Speaker of a prior conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A prior turn in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// A natural-language question. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: QueryId,
    pub text: String,
    /// Prior turns, oldest first
    #[serde(default)]
    pub conversation_context: Vec<ConversationTurn>,
}

impl Query {
    /// Create a query with a fresh ID and no conversation context
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: QueryId::new(),
            text: text.into(),
            conversation_context: Vec::new(),
        }
    }

    /// Attach prior conversation turns
    pub fn with_context(mut self, turns: Vec<ConversationTurn>) -> Self {
        self.conversation_context = turns;
        self
    }

    /// Whether the query has any non-whitespace text
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Coarse classification of what the user is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Factual,
    Explanation,
    Comparison,
    Procedural,
    FollowUp,
    Unknown,
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryIntent::Factual => write!(f, "factual"),
            QueryIntent::Explanation => write!(f, "explanation"),
            QueryIntent::Comparison => write!(f, "comparison"),
            QueryIntent::Procedural => write!(f, "procedural"),
            QueryIntent::FollowUp => write!(f, "follow_up"),
            QueryIntent::Unknown => write!(f, "unknown"),
        }
    }
}

/// Difficulty estimate for a query, created once and read-only thereafter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityProfile {
    pub query_id: QueryId,
    /// Difficulty in `[1, 10]`
    pub score: u8,
    pub domain_tags: BTreeSet<String>,
    pub intent: QueryIntent,
    pub estimated_token_budget: u32,
}

impl ComplexityProfile {
    /// Profile used for empty or malformed queries
    pub fn fallback(query_id: QueryId, token_budget: u32) -> Self {
        let mut domain_tags = BTreeSet::new();
        domain_tags.insert("unknown".to_string());
        Self {
            query_id,
            score: 1,
            domain_tags,
            intent: QueryIntent::Unknown,
            estimated_token_budget: token_budget,
        }
    }
}

/// A retrieved passage with its fused confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage_id: String,
    pub source_doc_id: String,
    pub text: String,
    pub similarity_score: f64,
    pub rerank_score: f64,
    pub retrieval_confidence: f64,
}

/// Ranked passages that cleared the retrieval threshold
///
/// Sorted descending by `retrieval_confidence`; every passage is at or above
/// the threshold it was built with. Construct through [`RetrievalResult::ranked`]
/// so both properties always hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    passages: Vec<ScoredPassage>,
    degraded: bool,
}

impl RetrievalResult {
    /// Filter and rank passages.
    ///
    /// `passages` must arrive in similarity rank order; the sort is stable so
    /// equal confidences keep that order.
    pub fn ranked(passages: Vec<ScoredPassage>, threshold: f64) -> Self {
        let mut kept: Vec<ScoredPassage> = passages
            .into_iter()
            .filter(|p| p.retrieval_confidence >= threshold)
            .collect();
        kept.sort_by(|a, b| b.retrieval_confidence.total_cmp(&a.retrieval_confidence));
        Self {
            passages: kept,
            degraded: false,
        }
    }

    /// Empty result after the index could not be reached
    pub fn degraded() -> Self {
        Self {
            passages: Vec::new(),
            degraded: true,
        }
    }

    /// Empty but healthy result
    pub fn empty() -> Self {
        Self {
            passages: Vec::new(),
            degraded: false,
        }
    }

    pub fn passages(&self) -> &[ScoredPassage] {
        &self.passages
    }

    /// `retrievalDegraded`: the index was unreachable for this query
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }
}

/// Calibration method active when a confidence was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    /// Cold start: identity mapping, no fitted model
    None,
    Temperature,
    Isotonic,
    Platt,
}

impl std::fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationMethod::None => write!(f, "none"),
            CalibrationMethod::Temperature => write!(f, "temperature"),
            CalibrationMethod::Isotonic => write!(f, "isotonic"),
            CalibrationMethod::Platt => write!(f, "platt"),
        }
    }
}

impl std::str::FromStr for CalibrationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "identity" => Ok(CalibrationMethod::None),
            "temperature" => Ok(CalibrationMethod::Temperature),
            "isotonic" => Ok(CalibrationMethod::Isotonic),
            "platt" => Ok(CalibrationMethod::Platt),
            other => Err(format!("Unknown calibration method: {}", other)),
        }
    }
}

/// Raw composite mapped through the calibration snapshot active at decision time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedConfidence {
    pub raw_composite: f64,
    pub calibrated: f64,
    pub method: CalibrationMethod,
    pub model_version: String,
}

/// Discrete confidence band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::High => write!(f, "high"),
            Tier::Medium => write!(f, "medium"),
            Tier::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Tier::High),
            "medium" => Ok(Tier::Medium),
            "low" => Ok(Tier::Low),
            other => Err(format!("Unknown tier: {}", other)),
        }
    }
}

/// How an answer is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Direct,
    Hedged,
    Escalate,
}

impl Strategy {
    /// Strategy mapped to a tier
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::High => Strategy::Direct,
            Tier::Medium => Strategy::Hedged,
            Tier::Low => Strategy::Escalate,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Direct => write!(f, "direct"),
            Strategy::Hedged => write!(f, "hedged"),
            Strategy::Escalate => write!(f, "escalate"),
        }
    }
}

/// Final presentation decision returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryDecision {
    pub tier: Tier,
    pub strategy: Strategy,
    pub rendered_answer: String,
    /// Cited passage IDs in retrieval rank order
    pub sources: Vec<String>,
}

/// Append-only record of a delivered answer and, later, its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub query_id: QueryId,
    pub raw_composite: f64,
    pub calibrated_confidence: f64,
    pub tier: Tier,
    /// Calibration snapshot version active when the answer was delivered
    pub model_version: String,
    pub user_correct: Option<bool>,
    /// Record this one corrects, if any
    pub supersedes: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Unlabelled record emitted right after delivery
    pub fn pending(query_id: QueryId, confidence: &CalibratedConfidence, tier: Tier) -> Self {
        Self {
            id: Uuid::new_v4(),
            query_id,
            raw_composite: confidence.raw_composite,
            calibrated_confidence: confidence.calibrated,
            tier,
            model_version: confidence.model_version.clone(),
            user_correct: None,
            supersedes: None,
            timestamp: Utc::now(),
        }
    }

    /// New record carrying a label for this one
    pub fn labelled(&self, user_correct: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            query_id: self.query_id,
            raw_composite: self.raw_composite,
            calibrated_confidence: self.calibrated_confidence,
            tier: self.tier,
            model_version: self.model_version.clone(),
            user_correct: Some(user_correct),
            supersedes: Some(self.id),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, confidence: f64) -> ScoredPassage {
        ScoredPassage {
            passage_id: id.to_string(),
            source_doc_id: "doc".to_string(),
            text: format!("passage {}", id),
            similarity_score: confidence,
            rerank_score: confidence,
            retrieval_confidence: confidence,
        }
    }

    #[test]
    fn test_ranked_filters_and_sorts() {
        let result = RetrievalResult::ranked(
            vec![passage("a", 0.61), passage("b", 0.9), passage("c", 0.59), passage("d", 0.7)],
            0.6,
        );

        let ids: Vec<&str> = result.passages().iter().map(|p| p.passage_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a"]);
        assert!(!result.is_degraded());
    }

    #[test]
    fn test_ranked_keeps_similarity_order_on_ties() {
        let result = RetrievalResult::ranked(
            vec![passage("first", 0.8), passage("second", 0.8), passage("third", 0.8)],
            0.6,
        );

        let ids: Vec<&str> = result.passages().iter().map(|p| p.passage_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let result = RetrievalResult::ranked(vec![passage("edge", 0.6)], 0.6);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_degraded_result_is_empty() {
        let result = RetrievalResult::degraded();
        assert!(result.is_empty());
        assert!(result.is_degraded());
    }

    #[test]
    fn test_fallback_profile() {
        let profile = ComplexityProfile::fallback(QueryId::new(), 256);
        assert_eq!(profile.score, 1);
        assert!(profile.domain_tags.contains("unknown"));
        assert_eq!(profile.domain_tags.len(), 1);
    }

    #[test]
    fn test_labelled_record_supersedes_original() {
        let confidence = CalibratedConfidence {
            raw_composite: 0.7,
            calibrated: 0.65,
            method: CalibrationMethod::Platt,
            model_version: "v3-platt".to_string(),
        };
        let pending = FeedbackRecord::pending(QueryId::new(), &confidence, Tier::Medium);
        let labelled = pending.labelled(true);

        assert_eq!(pending.user_correct, None);
        assert_eq!(labelled.user_correct, Some(true));
        assert_eq!(labelled.supersedes, Some(pending.id));
        assert_eq!(labelled.query_id, pending.query_id);
        assert_ne!(labelled.id, pending.id);
        assert_eq!(labelled.model_version, "v3-platt");
    }

    #[test]
    fn test_enum_round_trip_strings() {
        assert_eq!("high".parse::<Tier>().unwrap(), Tier::High);
        assert!("urgent".parse::<Tier>().is_err());
        assert_eq!("isotonic".parse::<CalibrationMethod>().unwrap(), CalibrationMethod::Isotonic);
        assert_eq!(CalibrationMethod::None.to_string(), "none");
        assert_eq!(Strategy::for_tier(Tier::Medium), Strategy::Hedged);
    }
}
