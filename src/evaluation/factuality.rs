//! Factuality: are the answer's claims supported by the retrieved passages?
//!
//! Each sentence of the answer is one claim. A claim's support is the best
//! containment of its content words in any single passage; at or above the
//! support threshold the claim counts as fully supported, below it gets
//! proportional credit. The score is the mean over claims.

use super::{QualityScorer, ScoringInput};
use crate::error::Result;
use crate::utils::text::{containment, content_word_set, default_stopword_set, split_sentences};
use async_trait::async_trait;
use std::collections::HashSet;

/// Lexical-overlap stand-in for an entailment model
pub struct LexicalFactualityScorer {
    support_threshold: f64,
    stopwords: HashSet<String>,
}

impl LexicalFactualityScorer {
    pub fn new(support_threshold: f64) -> Self {
        Self {
            support_threshold,
            stopwords: default_stopword_set().clone(),
        }
    }

    fn claim_support(&self, claim: &HashSet<String>, passages: &[HashSet<String>]) -> f64 {
        let best = passages
            .iter()
            .map(|p| containment(claim, p))
            .fold(0.0f64, f64::max);

        if self.support_threshold <= 0.0 || best >= self.support_threshold {
            1.0
        } else {
            best / self.support_threshold
        }
    }

    pub fn score_text(&self, answer: &str, passages: &[&str]) -> f64 {
        if passages.is_empty() {
            return 0.0;
        }

        let passage_words: Vec<HashSet<String>> = passages
            .iter()
            .map(|p| content_word_set(p, &self.stopwords))
            .collect();

        let claims: Vec<HashSet<String>> = split_sentences(answer)
            .iter()
            .map(|s| content_word_set(s, &self.stopwords))
            .filter(|words| !words.is_empty())
            .collect();

        if claims.is_empty() {
            return 0.0;
        }

        let total: f64 = claims
            .iter()
            .map(|claim| self.claim_support(claim, &passage_words))
            .sum();
        (total / claims.len() as f64).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl QualityScorer for LexicalFactualityScorer {
    fn name(&self) -> &str {
        "factuality"
    }

    async fn score(&self, input: &ScoringInput) -> Result<f64> {
        let passages: Vec<&str> = input.passages.iter().map(|p| p.text.as_str()).collect();
        Ok(self.score_text(&input.answer, &passages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_claim_scores_one() {
        let scorer = LexicalFactualityScorer::new(0.5);
        let score = scorer.score_text(
            "Paris is the capital of France.",
            &["Paris is the capital and largest city of France."],
        );
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_unsupported_claim_lowers_score() {
        let scorer = LexicalFactualityScorer::new(0.5);
        let score = scorer.score_text(
            "Paris is the capital of France. The moon is made of cheese.",
            &["Paris is the capital and largest city of France."],
        );
        assert!((score - 0.5).abs() < 1e-9, "score was {}", score);
    }

    #[test]
    fn test_partial_support_gets_proportional_credit() {
        let scorer = LexicalFactualityScorer::new(0.5);
        // 1 of 4 content words supported: 0.25 / 0.5
        let score = scorer.score_text(
            "Paris hosts enormous festivals.",
            &["Paris is the capital of France."],
        );
        assert!((score - 0.5).abs() < 1e-9, "score was {}", score);
    }

    #[test]
    fn test_no_passages_scores_zero() {
        let scorer = LexicalFactualityScorer::new(0.5);
        assert_eq!(scorer.score_text("Paris is the capital of France.", &[]), 0.0);
    }

    #[test]
    fn test_empty_answer_scores_zero() {
        let scorer = LexicalFactualityScorer::new(0.5);
        assert_eq!(scorer.score_text("", &["Paris is the capital of France."]), 0.0);
    }
}
