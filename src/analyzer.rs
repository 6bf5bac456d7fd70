//! Query complexity analysis
//!
//! Scores how hard a query is on a 1-10 scale from cheap lexical signals and
//! tags it with the domains and intent it touches. The score drives retrieval
//! depth and generation model routing; the token budget caps generation length.
//!
//! # Scoring
//!
//! Starting from 1, the score adds:
//! - length: +1 per 8 tokens beyond the sixth (at most +3)
//! - multi-clause connectives ("and", "then", ...): +0.75 each (at most +2)
//! - distinct named entities: +0.5 each (at most +2)
//! - matched deployment domains: +1 each (at most +2)
//! - intent: comparison +1.5, explanation/procedural +1, follow-up +0.5
//!
//! The total is rounded and clamped to `[1, 10]`. Empty input never fails: it
//! yields score 1 with the single tag `unknown`.

use crate::config::AnalyzerConfig;
use crate::types::{ComplexityProfile, Query, QueryIntent};
use crate::utils::text::{normalize, split_sentences, tokenize};
use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

const CONNECTIVES: &[&str] = &[
    "and", "then", "but", "or", "also", "while", "after", "before", "because", "versus", "vs",
];

const FOLLOW_UP_PRONOUNS: &[&str] = &["it", "that", "this", "they", "those", "them", "he", "she"];

static CAPITALIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[A-Z][a-z]+|[A-Z]{2,})\b").expect("entity pattern is valid"));

/// Profile fields that depend only on the query text
#[derive(Debug, Clone)]
struct CachedProfile {
    score: u8,
    domain_tags: BTreeSet<String>,
    intent: QueryIntent,
    estimated_token_budget: u32,
}

/// Query complexity analyzer with an LRU cache keyed on normalized text
pub struct QueryComplexityAnalyzer {
    config: AnalyzerConfig,
    cache: Option<Mutex<LruCache<String, CachedProfile>>>,
}

impl QueryComplexityAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let cache = NonZeroUsize::new(config.cache_capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { config, cache }
    }

    /// Analyze a query. Never fails.
    pub fn analyze(&self, query: &Query) -> ComplexityProfile {
        if query.is_blank() {
            debug!("Blank query {}, using fallback profile", query.id);
            return ComplexityProfile::fallback(query.id, self.config.base_token_budget);
        }

        let has_context = !query.conversation_context.is_empty();
        let key = format!("{}|{}", has_context as u8, normalize(&query.text));

        if let Some(cached) = self.cache_get(&key) {
            return Self::stamp(query, cached);
        }

        let computed = self.compute(&query.text, has_context);
        debug!(
            "Query {} complexity {} intent {} tags {:?}",
            query.id, computed.score, computed.intent, computed.domain_tags
        );
        self.cache_put(key, computed.clone());

        Self::stamp(query, computed)
    }

    fn stamp(query: &Query, cached: CachedProfile) -> ComplexityProfile {
        ComplexityProfile {
            query_id: query.id,
            score: cached.score,
            domain_tags: cached.domain_tags,
            intent: cached.intent,
            estimated_token_budget: cached.estimated_token_budget,
        }
    }

    fn compute(&self, text: &str, has_context: bool) -> CachedProfile {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            let fallback = ComplexityProfile::fallback(Default::default(), self.config.base_token_budget);
            return CachedProfile {
                score: fallback.score,
                domain_tags: fallback.domain_tags,
                intent: fallback.intent,
                estimated_token_budget: fallback.estimated_token_budget,
            };
        }

        let mut score = 1.0f64;

        score += (tokens.len().saturating_sub(6) as f64 / 8.0).min(3.0);

        let connectives = tokens
            .iter()
            .filter(|t| CONNECTIVES.contains(&t.as_str()))
            .count();
        score += (connectives as f64 * 0.75).min(2.0);

        score += (count_named_entities(text) as f64 * 0.5).min(2.0);

        let domain_tags = self.match_domains(&tokens);
        score += (domain_tags.len() as f64).min(2.0);

        let intent = classify_intent(text, &tokens, has_context);
        score += match intent {
            QueryIntent::Comparison => 1.5,
            QueryIntent::Explanation | QueryIntent::Procedural => 1.0,
            QueryIntent::FollowUp => 0.5,
            QueryIntent::Factual | QueryIntent::Unknown => 0.0,
        };

        let score = score.round().clamp(1.0, 10.0) as u8;

        let mut domain_tags = domain_tags;
        if domain_tags.is_empty() {
            domain_tags.insert("general".to_string());
        }

        let budget = (self.config.base_token_budget + self.config.tokens_per_complexity * score as u32)
            .min(self.config.max_token_budget);

        CachedProfile {
            score,
            domain_tags,
            intent,
            estimated_token_budget: budget,
        }
    }

    fn match_domains(&self, tokens: &[String]) -> BTreeSet<String> {
        let token_set: HashSet<&str> = tokens.iter().map(|t| t.as_str()).collect();
        self.config
            .domain_keywords
            .iter()
            .filter(|(_, keywords)| {
                keywords
                    .iter()
                    .any(|k| token_set.contains(k.to_lowercase().as_str()))
            })
            .map(|(domain, _)| domain.clone())
            .collect()
    }

    fn cache_get(&self, key: &str) -> Option<CachedProfile> {
        let cache = self.cache.as_ref()?;
        let mut guard = cache.lock().ok()?;
        guard.get(key).cloned()
    }

    fn cache_put(&self, key: String, profile: CachedProfile) {
        if let Some(cache) = &self.cache {
            if let Ok(mut guard) = cache.lock() {
                guard.put(key, profile);
            }
        }
    }

    /// Number of cached profiles
    pub fn cache_len(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.lock().ok().map(|g| g.len()))
            .unwrap_or(0)
    }
}

/// Distinct capitalized words that do not open a sentence, plus acronyms
fn count_named_entities(text: &str) -> usize {
    let mut entities = HashSet::new();
    for sentence in split_sentences(text) {
        for (i, m) in CAPITALIZED.find_iter(&sentence).enumerate() {
            let word = m.as_str();
            let opens_sentence = i == 0 && sentence.starts_with(word);
            let is_acronym = word.len() >= 2 && word.chars().all(|c| c.is_ascii_uppercase());
            if (!opens_sentence || is_acronym) && word != "I" {
                entities.insert(word.to_string());
            }
        }
    }
    entities.len()
}

fn classify_intent(text: &str, tokens: &[String], has_context: bool) -> QueryIntent {
    let normalized = normalize(text);

    if normalized.contains("compare")
        || normalized.contains("difference between")
        || tokens.iter().any(|t| t == "vs" || t == "versus")
        || normalized.contains("better than")
    {
        return QueryIntent::Comparison;
    }

    if normalized.starts_with("how to")
        || normalized.starts_with("how can")
        || normalized.starts_with("how do i")
        || normalized.starts_with("how should")
        || normalized.contains("steps to")
    {
        return QueryIntent::Procedural;
    }

    if normalized.starts_with("why")
        || normalized.starts_with("how does")
        || normalized.starts_with("how do")
        || normalized.starts_with("explain")
    {
        return QueryIntent::Explanation;
    }

    if has_context && tokens.iter().any(|t| FOLLOW_UP_PRONOUNS.contains(&t.as_str())) {
        return QueryIntent::FollowUp;
    }

    QueryIntent::Factual
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConversationTurn, Role};

    fn analyzer() -> QueryComplexityAnalyzer {
        QueryComplexityAnalyzer::new(AnalyzerConfig::default())
    }

    #[test]
    fn test_simple_factual_query_scores_low() {
        let query = Query::new("What is the capital of France?");
        let profile = analyzer().analyze(&query);

        assert_eq!(profile.query_id, query.id);
        assert!(profile.score <= 3, "score was {}", profile.score);
        assert_eq!(profile.intent, QueryIntent::Factual);
        assert!(profile.domain_tags.contains("geography"));
    }

    #[test]
    fn test_multi_clause_comparison_scores_higher() {
        let simple = analyzer().analyze(&Query::new("What is the capital of France?"));
        let complex = analyzer().analyze(&Query::new(
            "Compare the tax treatment of a loan in Germany and France, then explain \
             how the interest deduction interacts with the annual budget and compliance rules",
        ));

        assert!(complex.score > simple.score);
        assert!(complex.score >= 7, "score was {}", complex.score);
        assert_eq!(complex.intent, QueryIntent::Comparison);
        assert!(complex.domain_tags.contains("finance"));
        assert!(complex.estimated_token_budget > simple.estimated_token_budget);
    }

    #[test]
    fn test_score_is_clamped() {
        let long = "Compare and contrast ".repeat(40) + "Paris Berlin Rome Madrid Lisbon NASA";
        let profile = analyzer().analyze(&Query::new(long));
        assert!(profile.score <= 10);
        assert!(profile.score >= 1);
    }

    #[test]
    fn test_empty_query_falls_back() {
        let profile = analyzer().analyze(&Query::new("   "));
        assert_eq!(profile.score, 1);
        assert_eq!(profile.intent, QueryIntent::Unknown);
        assert_eq!(
            profile.domain_tags.iter().collect::<Vec<_>>(),
            vec!["unknown"]
        );
    }

    #[test]
    fn test_punctuation_only_query_falls_back() {
        let profile = analyzer().analyze(&Query::new("?!..."));
        assert_eq!(profile.score, 1);
        assert!(profile.domain_tags.contains("unknown"));
    }

    #[test]
    fn test_unmatched_domain_is_general() {
        let profile = analyzer().analyze(&Query::new("Who painted the ceiling?"));
        assert!(profile.domain_tags.contains("general"));
    }

    #[test]
    fn test_follow_up_needs_context() {
        let turns = vec![ConversationTurn {
            role: Role::User,
            content: "Tell me about Paris".to_string(),
        }];
        let with_context = analyzer().analyze(&Query::new("Is it expensive?").with_context(turns));
        let without = analyzer().analyze(&Query::new("Is it expensive?"));

        assert_eq!(with_context.intent, QueryIntent::FollowUp);
        assert_eq!(without.intent, QueryIntent::Factual);
    }

    #[test]
    fn test_cache_keyed_on_normalized_text() {
        let analyzer = analyzer();
        let first = Query::new("What is the capital of France?");
        let second = Query::new("  what IS the capital of   france?");

        let a = analyzer.analyze(&first);
        let b = analyzer.analyze(&second);

        assert_eq!(analyzer.cache_len(), 1);
        assert_eq!(a.score, b.score);
        // Cached profile is re-stamped with the new query id
        assert_eq!(b.query_id, second.id);
    }

    #[test]
    fn test_cache_disabled_with_zero_capacity() {
        let analyzer = QueryComplexityAnalyzer::new(AnalyzerConfig {
            cache_capacity: 0,
            ..AnalyzerConfig::default()
        });
        analyzer.analyze(&Query::new("What is the capital of France?"));
        assert_eq!(analyzer.cache_len(), 0);
    }

    #[test]
    fn test_named_entities_skip_sentence_openers() {
        assert_eq!(count_named_entities("What about Paris and Berlin?"), 2);
        assert_eq!(count_named_entities("Where is the NATO summit?"), 1);
    }
}
