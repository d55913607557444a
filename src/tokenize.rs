//! Text normalization into index terms.
//!
//! Chunks and queries go through the same pipeline: lowercase, strip
//! punctuation, split on whitespace, drop stopwords and very short tokens.
//! Pure functions, no state, never fail.

use std::collections::BTreeMap;

/// Common words excluded from the vocabulary.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should",
];

/// Normalize text into a sequence of terms.
///
/// Lowercases, removes every non-alphanumeric character, splits on
/// whitespace, and drops stopwords and tokens of two characters or fewer.
///
/// # Example
///
/// ```
/// use deepdive::tokenize::tokenize;
///
/// let terms = tokenize("Quantum bits, or qubits!");
/// assert_eq!(terms, vec!["quantum", "bits", "qubits"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|word| word.chars().count() > 2 && !STOPWORDS.contains(&word.as_str()))
        .collect()
}

/// Tokenize and count term occurrences.
///
/// Returns an ordered term → count map, the raw-frequency half of a
/// chunk's TF-IDF vector.
pub fn term_counts(text: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for term in tokenize(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_punctuation() {
        let terms = tokenize("Hello, WORLD! Rust-lang.");
        assert_eq!(terms, vec!["hello", "world", "rustlang"]);
    }

    #[test]
    fn test_stopwords_removed() {
        let terms = tokenize("the cat and the hat");
        assert_eq!(terms, vec!["cat", "hat"]);
    }

    #[test]
    fn test_short_tokens_removed() {
        let terms = tokenize("go to an ML op");
        assert!(terms.is_empty());
    }

    #[test]
    fn test_short_tokens_measured_in_chars() {
        // Multi-byte characters still count one each against the length rule.
        assert!(tokenize("量子 éé").is_empty());
        assert_eq!(tokenize("ééé 量子計算"), vec!["ééé", "量子計算"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(term_counts("").is_empty());
    }

    #[test]
    fn test_only_punctuation() {
        assert!(tokenize("... --- !!!").is_empty());
    }

    #[test]
    fn test_term_counts() {
        let counts = term_counts("alpha beta alpha gamma alpha");
        assert_eq!(counts.get("alpha"), Some(&3));
        assert_eq!(counts.get("beta"), Some(&1));
        assert_eq!(counts.get("gamma"), Some(&1));
    }

    #[test]
    fn test_deterministic() {
        let a = term_counts("one two three two one");
        let b = term_counts("one two three two one");
        assert_eq!(a, b);
    }
}
