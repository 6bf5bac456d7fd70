//! Configuration for the answer pipeline
//!
//! Every tunable named by the pipeline lives here, one section per stage.
//! Defaults reproduce the documented behaviour, so an empty file is a valid
//! deployment.
//!
//! # Configuration File Format
//!
//! TOML format, conventionally `.aletheia/config.toml`:
//!
//! ```toml
//! [retrieval]
//! threshold = 0.6
//! precision_mode = false
//!
//! [evaluation.weights]
//! retrieval = 0.35
//! generation = 0.25
//! factuality = 0.15
//! relevance = 0.15
//! coherence = 0.10
//!
//! [calibration]
//! method = "isotonic"
//! min_feedback_count = 200
//!
//! [delivery]
//! high_threshold = 0.8
//! medium_threshold = 0.6
//! ```
//!
//! Environment variables prefixed `ALETHEIA__` override file values, with `__`
//! between section and key (`ALETHEIA__RETRIEVAL__THRESHOLD=0.75`).

use crate::error::{AletheiaError, Result};
use crate::types::CalibrationMethod;
use crate::utils::text::DEFAULT_STOPWORDS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,
}

/// Query complexity analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Domain tag -> keywords that signal it (matched case-insensitively)
    #[serde(default = "default_domain_keywords")]
    pub domain_keywords: BTreeMap<String, Vec<String>>,

    /// Profiles cached by normalized query text
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_base_token_budget")]
    pub base_token_budget: u32,

    #[serde(default = "default_tokens_per_complexity")]
    pub tokens_per_complexity: u32,

    #[serde(default = "default_max_token_budget")]
    pub max_token_budget: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            domain_keywords: default_domain_keywords(),
            cache_capacity: default_cache_capacity(),
            base_token_budget: default_base_token_budget(),
            tokens_per_complexity: default_tokens_per_complexity(),
            max_token_budget: default_max_token_budget(),
        }
    }
}

/// Multi-stage retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Minimum fused confidence for a passage to be kept
    #[serde(default = "default_retrieval_threshold")]
    pub threshold: f64,

    /// Threshold used when `precision_mode` is on
    #[serde(default = "default_preferred_threshold")]
    pub preferred_threshold: f64,

    #[serde(default)]
    pub precision_mode: bool,

    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f64,

    #[serde(default = "default_rerank_weight")]
    pub rerank_weight: f64,

    #[serde(default = "default_base_candidates")]
    pub base_candidates: usize,

    #[serde(default = "default_candidates_per_complexity")]
    pub candidates_per_complexity: usize,

    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Retries after the first failed index call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,

    #[serde(default = "default_collaborator_timeout_ms")]
    pub index_timeout_ms: u64,

    #[serde(default = "default_collaborator_timeout_ms")]
    pub rerank_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            threshold: default_retrieval_threshold(),
            preferred_threshold: default_preferred_threshold(),
            precision_mode: false,
            similarity_weight: default_similarity_weight(),
            rerank_weight: default_rerank_weight(),
            base_candidates: default_base_candidates(),
            candidates_per_complexity: default_candidates_per_complexity(),
            max_candidates: default_max_candidates(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_factor: default_backoff_factor(),
            index_timeout_ms: default_collaborator_timeout_ms(),
            rerank_timeout_ms: default_collaborator_timeout_ms(),
        }
    }
}

impl RetrievalConfig {
    /// Threshold in force for the current mode
    pub fn effective_threshold(&self) -> f64 {
        if self.precision_mode {
            self.preferred_threshold
        } else {
            self.threshold
        }
    }

    /// Candidate count for a complexity score: `base + per_complexity * score`, capped
    pub fn candidate_count(&self, complexity: u8) -> usize {
        (self.base_candidates + self.candidates_per_complexity * complexity as usize)
            .min(self.max_candidates)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = (self.backoff_factor as u64).saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_millis(self.index_timeout_ms)
    }

    pub fn rerank_timeout(&self) -> Duration {
        Duration::from_millis(self.rerank_timeout_ms)
    }
}

/// Response generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_large_model")]
    pub large_model: String,

    #[serde(default = "default_small_model")]
    pub small_model: String,

    /// Route easy queries to `small_model`
    #[serde(default = "default_true")]
    pub cost_aware_routing: bool,

    #[serde(default = "default_large_model_min_complexity")]
    pub large_model_min_complexity: u8,

    #[serde(default = "default_small_model_max_complexity")]
    pub small_model_max_complexity: u8,

    #[serde(default = "default_generation_timeout_ms")]
    pub timeout_ms: u64,

    /// Phrases (lowercase) that mark a hedged answer
    #[serde(default = "default_hedge_phrases")]
    pub hedge_phrases: Vec<String>,

    /// Multiplier applied to generation confidence when a hedge is found
    #[serde(default = "default_hedge_penalty")]
    pub hedge_penalty: f64,

    /// Tokens excluded from the confidence aggregate
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,

    /// OpenAI-compatible completions endpoint used by the CLI
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the endpoint API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            large_model: default_large_model(),
            small_model: default_small_model(),
            cost_aware_routing: true,
            large_model_min_complexity: default_large_model_min_complexity(),
            small_model_max_complexity: default_small_model_max_complexity(),
            timeout_ms: default_generation_timeout_ms(),
            hedge_phrases: default_hedge_phrases(),
            hedge_penalty: default_hedge_penalty(),
            stopwords: default_stopwords(),
            endpoint: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Weights of the raw composite confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub retrieval: f64,
    pub generation: f64,
    pub factuality: f64,
    pub relevance: f64,
    pub coherence: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            retrieval: 0.35,
            generation: 0.25,
            factuality: 0.15,
            relevance: 0.15,
            coherence: 0.10,
        }
    }
}

impl CompositeWeights {
    pub fn sum(&self) -> f64 {
        self.retrieval + self.generation + self.factuality + self.relevance + self.coherence
    }

    fn all_non_negative(&self) -> bool {
        [
            self.retrieval,
            self.generation,
            self.factuality,
            self.relevance,
            self.coherence,
        ]
        .iter()
        .all(|w| *w >= 0.0)
    }
}

/// Multi-signal evaluation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub weights: CompositeWeights,

    /// Per sub-scorer deadline
    #[serde(default = "default_scorer_timeout_ms")]
    pub scorer_timeout_ms: u64,

    /// Composite cap for answers without grounding
    #[serde(default = "default_grounding_ceiling")]
    pub grounding_ceiling: f64,

    /// Content-word overlap that counts as an implicit citation
    #[serde(default = "default_citation_overlap_threshold")]
    pub citation_overlap_threshold: f64,

    /// Fraction of a claim's content words a passage must contain to support it
    #[serde(default = "default_support_threshold")]
    pub support_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            weights: CompositeWeights::default(),
            scorer_timeout_ms: default_scorer_timeout_ms(),
            grounding_ceiling: default_grounding_ceiling(),
            citation_overlap_threshold: default_citation_overlap_threshold(),
            support_threshold: default_support_threshold(),
        }
    }
}

impl EvaluationConfig {
    pub fn scorer_timeout(&self) -> Duration {
        Duration::from_millis(self.scorer_timeout_ms)
    }
}

/// Calibration fitting settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Method fitted by the refit job; `none` disables fitting
    #[serde(default = "default_calibration_method")]
    pub method: CalibrationMethod,

    /// Labelled records required since the last fit
    #[serde(default = "default_min_feedback_count")]
    pub min_feedback_count: usize,

    #[serde(default = "default_refit_interval_secs")]
    pub refit_interval_secs: u64,

    #[serde(default = "default_min_temperature")]
    pub min_temperature: f64,

    #[serde(default = "default_max_temperature")]
    pub max_temperature: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            method: default_calibration_method(),
            min_feedback_count: default_min_feedback_count(),
            refit_interval_secs: default_refit_interval_secs(),
            min_temperature: default_min_temperature(),
            max_temperature: default_max_temperature(),
        }
    }
}

impl CalibrationConfig {
    pub fn refit_interval(&self) -> Duration {
        Duration::from_secs(self.refit_interval_secs)
    }
}

/// Tier boundaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Calibrated confidence at or above this is `high`
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    /// Calibrated confidence at or above this (and below high) is `medium`
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
        }
    }
}

/// Feedback storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Where the CLI keeps the last published calibration snapshot
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            snapshot_path: default_snapshot_path(),
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_domain_keywords() -> BTreeMap<String, Vec<String>> {
    let mut map = BTreeMap::new();
    map.insert(
        "geography".to_string(),
        ["capital", "country", "city", "continent", "river", "population"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    map.insert(
        "finance".to_string(),
        ["invoice", "tax", "interest", "loan", "budget", "revenue"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    map.insert(
        "medical".to_string(),
        ["symptom", "diagnosis", "dose", "treatment", "medication"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    map.insert(
        "legal".to_string(),
        ["contract", "liability", "statute", "regulation", "compliance"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    map.insert(
        "software".to_string(),
        ["compile", "database", "api", "deploy", "function", "server"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    map
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_base_token_budget() -> u32 {
    256
}

fn default_tokens_per_complexity() -> u32 {
    96
}

fn default_max_token_budget() -> u32 {
    1536
}

fn default_retrieval_threshold() -> f64 {
    0.6
}

fn default_preferred_threshold() -> f64 {
    0.75
}

fn default_similarity_weight() -> f64 {
    0.4
}

fn default_rerank_weight() -> f64 {
    0.6
}

fn default_base_candidates() -> usize {
    5
}

fn default_candidates_per_complexity() -> usize {
    2
}

fn default_max_candidates() -> usize {
    50
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    200
}

fn default_backoff_factor() -> u32 {
    2
}

fn default_collaborator_timeout_ms() -> u64 {
    2_000
}

fn default_model() -> String {
    "aletheia-base".to_string()
}

fn default_large_model() -> String {
    "aletheia-large".to_string()
}

fn default_small_model() -> String {
    "aletheia-small".to_string()
}

fn default_large_model_min_complexity() -> u8 {
    7
}

fn default_small_model_max_complexity() -> u8 {
    3
}

fn default_generation_timeout_ms() -> u64 {
    30_000
}

fn default_hedge_phrases() -> Vec<String> {
    [
        "i'm not sure",
        "i am not sure",
        "it's possible that",
        "it is possible that",
        "i don't have enough information",
        "i do not have enough information",
        "i'm not certain",
        "i cannot be certain",
        "i don't know",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_hedge_penalty() -> f64 {
    0.7
}

fn default_stopwords() -> Vec<String> {
    DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect()
}

fn default_api_key_env() -> String {
    "ALETHEIA_LLM_API_KEY".to_string()
}

fn default_scorer_timeout_ms() -> u64 {
    5_000
}

fn default_grounding_ceiling() -> f64 {
    0.5
}

fn default_citation_overlap_threshold() -> f64 {
    0.5
}

fn default_support_threshold() -> f64 {
    0.5
}

fn default_calibration_method() -> CalibrationMethod {
    CalibrationMethod::Isotonic
}

fn default_min_feedback_count() -> usize {
    200
}

fn default_refit_interval_secs() -> u64 {
    3_600
}

fn default_min_temperature() -> f64 {
    0.05
}

fn default_max_temperature() -> f64 {
    20.0
}

fn default_high_threshold() -> f64 {
    0.8
}

fn default_medium_threshold() -> f64 {
    0.6
}

fn default_db_path() -> String {
    ".aletheia/feedback.db".to_string()
}

fn default_snapshot_path() -> String {
    ".aletheia/calibration.json".to_string()
}

fn in_unit_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl PipelineConfig {
    /// Load configuration from an optional TOML file overlaid with
    /// `ALETHEIA__*` environment variables, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
                tracing::info!("Loading configuration from {:?}", path);
            } else {
                tracing::info!("Config file not found, using defaults: {:?}", path);
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ALETHEIA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AletheiaError::Other(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Check every threshold and weight. Invalid configuration is fatal at
    /// startup, never per query.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if !in_unit_range(r.threshold) || !in_unit_range(r.preferred_threshold) {
            return Err(AletheiaError::InvalidConfig(
                "retrieval thresholds must be within [0, 1]".to_string(),
            ));
        }
        if r.similarity_weight < 0.0
            || r.rerank_weight < 0.0
            || (r.similarity_weight + r.rerank_weight - 1.0).abs() > 1e-6
        {
            return Err(AletheiaError::InvalidConfig(format!(
                "retrieval fusion weights must be non-negative and sum to 1 (got {} + {})",
                r.similarity_weight, r.rerank_weight
            )));
        }
        if r.max_candidates == 0 {
            return Err(AletheiaError::InvalidConfig(
                "retrieval.max_candidates must be at least 1".to_string(),
            ));
        }
        if r.index_timeout_ms == 0 || r.rerank_timeout_ms == 0 {
            return Err(AletheiaError::InvalidConfig(
                "retrieval timeouts must be positive".to_string(),
            ));
        }

        let g = &self.generation;
        if g.timeout_ms == 0 {
            return Err(AletheiaError::InvalidConfig(
                "generation.timeout_ms must be positive".to_string(),
            ));
        }
        if !in_unit_range(g.hedge_penalty) {
            return Err(AletheiaError::InvalidConfig(
                "generation.hedge_penalty must be within [0, 1]".to_string(),
            ));
        }
        if g.small_model_max_complexity >= g.large_model_min_complexity {
            return Err(AletheiaError::InvalidConfig(
                "generation.small_model_max_complexity must be below large_model_min_complexity"
                    .to_string(),
            ));
        }

        let e = &self.evaluation;
        if !e.weights.all_non_negative() || (e.weights.sum() - 1.0).abs() > 1e-6 {
            return Err(AletheiaError::InvalidConfig(format!(
                "evaluation weights must be non-negative and sum to 1 (got {})",
                e.weights.sum()
            )));
        }
        if !in_unit_range(e.grounding_ceiling)
            || !in_unit_range(e.citation_overlap_threshold)
            || !in_unit_range(e.support_threshold)
        {
            return Err(AletheiaError::InvalidConfig(
                "evaluation ceilings and thresholds must be within [0, 1]".to_string(),
            ));
        }
        if e.scorer_timeout_ms == 0 {
            return Err(AletheiaError::InvalidConfig(
                "evaluation.scorer_timeout_ms must be positive".to_string(),
            ));
        }

        let c = &self.calibration;
        if c.min_feedback_count == 0 {
            return Err(AletheiaError::InvalidConfig(
                "calibration.min_feedback_count must be at least 1".to_string(),
            ));
        }
        if c.refit_interval_secs == 0 {
            return Err(AletheiaError::InvalidConfig(
                "calibration.refit_interval_secs must be positive".to_string(),
            ));
        }
        if !(c.min_temperature > 0.0 && c.min_temperature < c.max_temperature) {
            return Err(AletheiaError::InvalidConfig(
                "calibration temperature bounds must satisfy 0 < min < max".to_string(),
            ));
        }

        let d = &self.delivery;
        if !in_unit_range(d.high_threshold)
            || !in_unit_range(d.medium_threshold)
            || d.medium_threshold > d.high_threshold
        {
            return Err(AletheiaError::InvalidConfig(format!(
                "delivery thresholds must satisfy 0 <= medium ({}) <= high ({}) <= 1",
                d.medium_threshold, d.high_threshold
            )));
        }

        Ok(())
    }

    /// Get default config path for a project
    pub fn default_path() -> PathBuf {
        PathBuf::from(".aletheia/config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();

        assert_eq!(config.retrieval.threshold, 0.6);
        assert_eq!(config.retrieval.preferred_threshold, 0.75);
        assert_eq!(config.generation.hedge_penalty, 0.7);
        assert_eq!(config.generation.timeout_ms, 30_000);
        assert_eq!(config.evaluation.scorer_timeout_ms, 5_000);
        assert_eq!(config.calibration.min_feedback_count, 200);
        assert_eq!(config.delivery.high_threshold, 0.8);
        assert_eq!(config.delivery.medium_threshold, 0.6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_candidate_count_scales_and_caps() {
        let config = RetrievalConfig::default();
        assert_eq!(config.candidate_count(1), 7);
        assert_eq!(config.candidate_count(10), 25);

        let wide = RetrievalConfig {
            candidates_per_complexity: 10,
            ..RetrievalConfig::default()
        };
        assert_eq!(wide.candidate_count(10), 50);
    }

    #[test]
    fn test_backoff_is_exponential() {
        let config = RetrievalConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(200));
        assert_eq!(config.backoff(2), Duration::from_millis(400));
    }

    #[test]
    fn test_precision_mode_threshold() {
        let mut config = RetrievalConfig::default();
        assert_eq!(config.effective_threshold(), 0.6);
        config.precision_mode = true;
        assert_eq!(config.effective_threshold(), 0.75);
    }

    #[test]
    fn test_rejects_unbalanced_weights() {
        let mut config = PipelineConfig::default();
        config.evaluation.weights.coherence = 0.5;
        assert!(matches!(
            config.validate(),
            Err(AletheiaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_tiers() {
        let mut config = PipelineConfig::default();
        config.delivery.medium_threshold = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = PipelineConfig::default();
        config.retrieval.precision_mode = true;
        config.calibration.method = CalibrationMethod::Platt;
        config.save(&config_path).unwrap();

        let loaded = PipelineConfig::load(Some(&config_path)).unwrap();
        assert!(loaded.retrieval.precision_mode);
        assert_eq!(loaded.calibration.method, CalibrationMethod::Platt);
        assert_eq!(loaded.evaluation.weights, config.evaluation.weights);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[delivery]\nhigh_threshold = 0.85\n").unwrap();

        let loaded = PipelineConfig::load(Some(&config_path)).unwrap();
        assert_eq!(loaded.delivery.high_threshold, 0.85);
        assert_eq!(loaded.delivery.medium_threshold, 0.6);
        assert_eq!(loaded.retrieval.max_candidates, 50);
    }

    #[test]
    fn test_invalid_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[retrieval]\nthreshold = 1.5\n").unwrap();

        assert!(PipelineConfig::load(Some(&config_path)).is_err());
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config = PipelineConfig::load(Some(Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.retrieval.threshold, 0.6);
    }
}
