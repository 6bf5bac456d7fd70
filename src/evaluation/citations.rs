//! Which retrieved passages an answer actually cites
//!
//! Explicit markers win: `[2]` refers to the second passage in rank order and
//! `[p-paris]` to a passage by ID; a marker may list several (`[1, 3]`). When
//! no marker resolves, a passage counts as cited if enough of the answer's
//! content words appear in it.

use crate::types::ScoredPassage;
use crate::utils::text::{containment, content_word_set};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]\n]{1,64})\]").expect("citation pattern is valid"));

/// Indices (rank order) of the passages cited by `answer`
pub fn cited_indices(
    answer: &str,
    passages: &[ScoredPassage],
    overlap_threshold: f64,
    stopwords: &HashSet<String>,
) -> Vec<usize> {
    if passages.is_empty() || answer.trim().is_empty() {
        return Vec::new();
    }

    let explicit = explicit_citations(answer, passages);
    if !explicit.is_empty() {
        return explicit.into_iter().collect();
    }

    let answer_words = content_word_set(&strip_markers(answer), stopwords);
    if answer_words.is_empty() {
        return Vec::new();
    }

    passages
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            let passage_words = content_word_set(&p.text, stopwords);
            containment(&answer_words, &passage_words) >= overlap_threshold
        })
        .map(|(i, _)| i)
        .collect()
}

fn explicit_citations(answer: &str, passages: &[ScoredPassage]) -> BTreeSet<usize> {
    let mut cited = BTreeSet::new();
    for capture in MARKER.captures_iter(answer) {
        for reference in capture[1].split(',').map(str::trim) {
            if let Ok(n) = reference.parse::<usize>() {
                if (1..=passages.len()).contains(&n) {
                    cited.insert(n - 1);
                }
            } else if let Some(i) = passages.iter().position(|p| p.passage_id == reference) {
                cited.insert(i);
            }
        }
    }
    cited
}

/// Answer text with citation markers removed
pub fn strip_markers(answer: &str) -> String {
    MARKER.replace_all(answer, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::text::default_stopword_set;

    fn passages() -> Vec<ScoredPassage> {
        [
            ("p-paris", "Paris is the capital and largest city of France."),
            ("p-lyon", "Lyon is known for its cuisine."),
            ("p-berlin", "Berlin is the capital of Germany."),
        ]
        .iter()
        .map(|(id, text)| ScoredPassage {
            passage_id: id.to_string(),
            source_doc_id: "doc".to_string(),
            text: text.to_string(),
            similarity_score: 0.8,
            rerank_score: 0.8,
            retrieval_confidence: 0.8,
        })
        .collect()
    }

    #[test]
    fn test_numeric_markers() {
        let cited = cited_indices(
            "Paris is the capital [1]. Berlin too [3].",
            &passages(),
            0.5,
            default_stopword_set(),
        );
        assert_eq!(cited, vec![0, 2]);
    }

    #[test]
    fn test_id_and_list_markers() {
        let cited = cited_indices(
            "Both are capitals [p-berlin, 1].",
            &passages(),
            0.5,
            default_stopword_set(),
        );
        assert_eq!(cited, vec![0, 2]);
    }

    #[test]
    fn test_implicit_citation_by_overlap() {
        let cited = cited_indices(
            "Paris is the capital of France.",
            &passages(),
            0.5,
            default_stopword_set(),
        );
        assert_eq!(cited, vec![0]);
    }

    #[test]
    fn test_out_of_range_marker_falls_back_to_overlap() {
        let cited = cited_indices(
            "Lyon is famous for cuisine [9].",
            &passages(),
            0.5,
            default_stopword_set(),
        );
        assert_eq!(cited, vec![1]);
    }

    #[test]
    fn test_unrelated_answer_cites_nothing() {
        let cited = cited_indices(
            "Photosynthesis converts light into chemical energy.",
            &passages(),
            0.5,
            default_stopword_set(),
        );
        assert!(cited.is_empty());
    }

    #[test]
    fn test_strip_markers() {
        assert_eq!(strip_markers("Paris [1] is [p-x] big."), "Paris  is  big.");
    }
}
