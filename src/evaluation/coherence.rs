//! Coherence: is the answer internally consistent and fluent?
//!
//! Rule-based. Starts at 1 and subtracts:
//! - 0.3 per contradiction: two sentences sharing most of their content words
//!   where exactly one is negated
//! - 0.1 per repeated sentence
//! - twice the shortfall below 0.4 of the distinct-token ratio, for answers
//!   of at least eight tokens (catches degenerate repetition)

use super::{QualityScorer, ScoringInput};
use crate::error::Result;
use crate::utils::text::{
    content_word_set, default_stopword_set, jaccard, normalize, split_sentences, tokenize,
};
use async_trait::async_trait;
use std::collections::HashSet;

const CONTRADICTION_PENALTY: f64 = 0.3;
const DUPLICATE_PENALTY: f64 = 0.1;
const CONTRADICTION_OVERLAP: f64 = 0.6;
const MIN_DISTINCT_RATIO: f64 = 0.4;
const MIN_TOKENS_FOR_RATIO: usize = 8;

const NEGATIONS: &[&str] = &["not", "no", "never", "none", "cannot", "neither", "nor"];

#[derive(Debug, Clone, Default)]
pub struct RuleBasedCoherenceScorer;

impl RuleBasedCoherenceScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score_text(text: &str) -> f64 {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return 0.0;
        }

        let sentences = split_sentences(text);
        let stop = default_stopword_set();
        let analysed: Vec<(HashSet<String>, bool)> = sentences
            .iter()
            .map(|s| (content_word_set(s, stop), is_negated(s)))
            .collect();

        let mut contradictions = 0usize;
        for i in 0..analysed.len() {
            for j in (i + 1)..analysed.len() {
                let (words_a, neg_a) = &analysed[i];
                let (words_b, neg_b) = &analysed[j];
                if neg_a != neg_b && jaccard(words_a, words_b) >= CONTRADICTION_OVERLAP {
                    contradictions += 1;
                }
            }
        }

        let mut seen = HashSet::new();
        let duplicates = sentences
            .iter()
            .filter(|s| !seen.insert(normalize(s)))
            .count();

        let mut score = 1.0;
        score -= CONTRADICTION_PENALTY * contradictions as f64;
        score -= DUPLICATE_PENALTY * duplicates as f64;

        if tokens.len() >= MIN_TOKENS_FOR_RATIO {
            let distinct = tokens.iter().collect::<HashSet<_>>().len();
            let ratio = distinct as f64 / tokens.len() as f64;
            if ratio < MIN_DISTINCT_RATIO {
                score -= 2.0 * (MIN_DISTINCT_RATIO - ratio);
            }
        }

        score.clamp(0.0, 1.0)
    }
}

fn is_negated(sentence: &str) -> bool {
    tokenize(sentence)
        .iter()
        .any(|t| NEGATIONS.contains(&t.as_str()) || t.ends_with("n't"))
}

#[async_trait]
impl QualityScorer for RuleBasedCoherenceScorer {
    fn name(&self) -> &str {
        "coherence"
    }

    async fn score(&self, input: &ScoringInput) -> Result<f64> {
        Ok(Self::score_text(&input.answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistent_answer_scores_one() {
        let score = RuleBasedCoherenceScorer::score_text(
            "Paris is the capital of France. It lies on the Seine.",
        );
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_contradiction_is_penalised() {
        let score = RuleBasedCoherenceScorer::score_text(
            "Paris is the capital of France. Paris is not the capital of France.",
        );
        assert!((score - 0.7).abs() < 1e-9, "score was {}", score);
    }

    #[test]
    fn test_contraction_counts_as_negation() {
        let score = RuleBasedCoherenceScorer::score_text(
            "The bridge is open today. The bridge isn't open today.",
        );
        assert!(score < 1.0);
    }

    #[test]
    fn test_repeated_sentence_is_penalised() {
        let score = RuleBasedCoherenceScorer::score_text(
            "Paris is the capital. Paris is the capital. It is large.",
        );
        assert!((score - 0.9).abs() < 1e-9, "score was {}", score);
    }

    #[test]
    fn test_degenerate_repetition_is_penalised() {
        let score = RuleBasedCoherenceScorer::score_text("yes yes yes yes yes yes yes yes yes yes");
        assert!(score < 0.5, "score was {}", score);
    }

    #[test]
    fn test_empty_text_scores_zero() {
        assert_eq!(RuleBasedCoherenceScorer::score_text(""), 0.0);
    }
}
