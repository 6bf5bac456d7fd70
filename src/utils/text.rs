//! Text helpers shared by the analyzer, generator and scorers
//!
//! All comparisons are lexical and case-insensitive. Tokens are runs of
//! letters and digits, optionally with one internal apostrophe ("don't").

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// English function words ignored by overlap measures
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "to", "in", "on", "at", "by", "for", "with",
    "from", "as", "is", "are", "was", "were", "be", "been", "being", "it", "its", "this", "that",
    "these", "those", "which", "who", "whom", "what", "there", "their", "then", "than", "so",
    "if", "do", "does", "did", "has", "have", "had", "not", "no", "i", "you", "he", "she", "we",
    "they", "me", "my", "your", "our",
];

static WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}]+)?").expect("word pattern is valid")
});

static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)|\n+").expect("sentence pattern is valid"));

static DEFAULT_STOPWORD_SET: Lazy<HashSet<String>> =
    Lazy::new(|| DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect());

/// Default stopword set as owned strings
pub fn default_stopword_set() -> &'static HashSet<String> {
    &DEFAULT_STOPWORD_SET
}

/// Lowercased word tokens in order
pub fn tokenize(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Word tokens that carry meaning: not stopwords, longer than one character
/// unless numeric
pub fn content_words(text: &str, stopwords: &HashSet<String>) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !stopwords.contains(t))
        .filter(|t| t.chars().count() > 1 || t.chars().all(|c| c.is_numeric()))
        .collect()
}

/// Distinct content words
pub fn content_word_set(text: &str, stopwords: &HashSet<String>) -> HashSet<String> {
    content_words(text, stopwords).into_iter().collect()
}

/// Whether a generation token carries no word characters
pub fn is_punctuation(token: &str) -> bool {
    !token.chars().any(|c| c.is_alphanumeric())
}

/// Whether a generation token (which may carry leading whitespace) is a
/// stopword or punctuation
pub fn is_boilerplate_token(token: &str, stopwords: &HashSet<String>) -> bool {
    let trimmed = token.trim();
    if trimmed.is_empty() || is_punctuation(trimmed) {
        return true;
    }
    let word: String = trimmed
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .to_lowercase();
    stopwords.contains(&word)
}

/// Jaccard similarity of two sets
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Fraction of `part` contained in `whole`
pub fn containment(part: &HashSet<String>, whole: &HashSet<String>) -> f64 {
    if part.is_empty() {
        return 0.0;
    }
    part.intersection(whole).count() as f64 / part.len() as f64
}

/// Split text into trimmed, non-empty sentences
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_END
        .split(text)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Lowercase and collapse whitespace, used for cache keys and phrase matching
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .replace('\u{2019}', "'")
}

/// Safely truncate a string at a character boundary, adding ellipsis if truncated.
pub fn truncate_at_char_boundary(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();

    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
