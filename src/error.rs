//! Error types for the Aletheia answer pipeline
//!
//! This module provides error handling using thiserror for structured error
//! definitions and anyhow for error propagation at the binary boundary.
//!
//! Most variants describe *expected* degraded conditions. The pipeline
//! recovers from them locally (empty retrieval, zero sub-scores, identity
//! calibration) and they only reach a caller through the lower-level stage
//! APIs, never through `Pipeline::answer_query`.

use std::time::Duration;
use thiserror::Error;

/// Main error type for Aletheia operations
#[derive(Error, Debug)]
pub enum AletheiaError {
    /// Vector index (or query embedding) unreachable after all retries
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Text-generation collaborator exceeded its deadline
    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    /// Text-generation collaborator returned malformed or empty output
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// No calibration model has been fitted yet
    #[error("Calibration unavailable: {0}")]
    CalibrationUnavailable(String),

    /// Not enough labelled feedback to refit calibration
    #[error("Insufficient feedback: {available} labelled records, {required} required")]
    InsufficientFeedback { required: usize, available: usize },

    /// A collaborator (re-ranker, embedding service, ...) failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Feedback record not found for the given query
    #[error("Feedback record not found for query: {0}")]
    FeedbackNotFound(String),

    /// Query cancelled by the caller at a stage boundary
    #[error("Query cancelled")]
    Cancelled,

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration source could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but violates an invariant
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl AletheiaError {
    /// Whether this error is an expected degraded condition rather than a
    /// programming or deployment fault.
    pub fn is_degraded_condition(&self) -> bool {
        matches!(
            self,
            AletheiaError::RetrievalUnavailable(_)
                | AletheiaError::GenerationTimeout(_)
                | AletheiaError::GenerationFailed(_)
                | AletheiaError::CalibrationUnavailable(_)
                | AletheiaError::InsufficientFeedback { .. }
        )
    }
}

/// Result type alias for Aletheia operations
pub type Result<T> = std::result::Result<T, AletheiaError>;

/// Convert anyhow::Error to AletheiaError
impl From<anyhow::Error> for AletheiaError {
    fn from(err: anyhow::Error) -> Self {
        AletheiaError::Other(err.to_string())
    }
}

impl From<libsql::Error> for AletheiaError {
    fn from(err: libsql::Error) -> Self {
        AletheiaError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AletheiaError::FeedbackNotFound("q-1".to_string());
        assert_eq!(err.to_string(), "Feedback record not found for query: q-1");

        let err = AletheiaError::InsufficientFeedback {
            required: 200,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient feedback: 12 labelled records, 200 required"
        );
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope");
        assert!(json_err.is_err());

        let err: AletheiaError = json_err.unwrap_err().into();
        assert!(matches!(err, AletheiaError::Serialization(_)));
    }

    #[test]
    fn test_degraded_conditions() {
        assert!(AletheiaError::RetrievalUnavailable("down".into()).is_degraded_condition());
        assert!(AletheiaError::GenerationTimeout(Duration::from_secs(30)).is_degraded_condition());
        assert!(!AletheiaError::InvalidConfig("bad".into()).is_degraded_condition());
        assert!(!AletheiaError::Cancelled.is_degraded_condition());
    }
}
