//! Highlight extraction for search hits.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Maximum number of highlight snippets per result.
const MAX_HIGHLIGHTS: usize = 3;
/// Maximum snippet length, in characters.
const MAX_SNIPPET_CHARS: usize = 200;

fn sentence_splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"(?s)[^.!?]*[.!?]+|[^.!?]+$").expect("valid sentence regex"))
}

fn word_splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"\w+").expect("valid word regex"))
}

/// Extracts up to three sentences that share the most whole words with the
/// query, case-insensitively. Each snippet is capped at 200 characters.
/// Sentences with no overlap are never returned.
pub fn extract_highlights(query: &str, content: &str) -> Vec<String> {
    let query_terms: HashSet<String> = word_splitter()
        .find_iter(query)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    if query_terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, String)> = sentence_splitter()
        .find_iter(content)
        .filter_map(|m| {
            let sentence = m.as_str().trim();
            if sentence.is_empty() {
                return None;
            }
            let overlap = word_splitter()
                .find_iter(sentence)
                .map(|w| w.as_str().to_lowercase())
                .collect::<HashSet<_>>()
                .intersection(&query_terms)
                .count();
            (overlap > 0).then(|| (overlap, sentence.to_string()))
        })
        .collect();

    // Stable sort keeps document order among equally-scored sentences.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(MAX_HIGHLIGHTS)
        .map(|(_, sentence)| {
            if sentence.chars().count() > MAX_SNIPPET_CHARS {
                sentence.chars().take(MAX_SNIPPET_CHARS).collect()
            } else {
                sentence
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn picks_sentences_with_most_overlap() {
        let content = "Rust has ownership. Ownership and borrowing keep Rust safe. \
                       Cats are fluffy.";
        let highlights = extract_highlights("rust ownership", content);
        assert_eq!(highlights.len(), 2);
        assert_eq!(highlights[0], "Ownership and borrowing keep Rust safe.");
        assert_eq!(highlights[1], "Rust has ownership.");
    }

    #[test]
    fn returns_at_most_three() {
        let content = "rust one. rust two. rust three. rust four. rust five.";
        assert_eq!(extract_highlights("rust", content).len(), 3);
    }

    #[test]
    fn no_overlap_means_no_highlights() {
        assert!(extract_highlights("quantum", "Cats are fluffy. Dogs bark.").is_empty());
    }

    #[test]
    fn matching_is_whole_word_and_case_insensitive() {
        let highlights = extract_highlights("cat", "Concatenation is stringy. The CAT sat.");
        assert_eq!(highlights, vec!["The CAT sat.".to_string()]);
    }

    #[test]
    fn snippets_are_capped_at_200_chars() {
        let long_sentence = format!("rust {}.", "x".repeat(400));
        let highlights = extract_highlights("rust", &long_sentence);
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].chars().count(), 200);
    }

    #[test]
    fn trailing_fragment_without_punctuation_counts() {
        let highlights = extract_highlights("rust", "no terminator but rust appears");
        assert_eq!(highlights.len(), 1);
    }
}
