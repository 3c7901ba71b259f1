//! Text helpers shared by the profiler, validator and similarity scorers

use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

/// Hex-encoded SHA-256 of the given bytes
pub fn sha256_hex(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    hex::encode(hasher.finalize())
}

/// Approximate token count: the number of Unicode words
pub fn count_tokens(text: &str) -> usize {
    text.unicode_words().count()
}

/// Lowercased Unicode words
pub fn words(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Splits text into trimmed, non-empty sentences, treating line breaks as
/// boundaries as well so list items and headings stand alone
pub fn sentences(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| line.unicode_sentences())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lowercase and keep only alphanumerics, for loose term matching
pub fn normalize_term(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Case-insensitive substring check
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Classic edit distance over chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;

        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }

        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Edit-distance similarity in [0, 1]
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());

    if longest == 0 {
        return 1.0;
    }

    1.0 - levenshtein(a, b) as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_is_stable() {
        let a = sha256_hex("hello");
        let b = sha256_hex("hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sha256_hex("hello "));
    }

    #[test]
    fn test_count_tokens() {
        assert_eq!(count_tokens("The quick brown fox."), 4);
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_sentences_split_on_lines_and_punctuation() {
        let text = "# Title\nFirst one. Second one.\n\n- item";
        let result = sentences(text);
        assert_eq!(result, vec!["# Title", "First one.", "Second one.", "- item"]);
    }

    #[test]
    fn test_normalize_term() {
        assert_eq!(normalize_term("Cache-Store"), "cachestore");
        assert_eq!(normalize_term("`max_tokens`"), "maxtokens");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_edit_similarity() {
        assert_eq!(edit_similarity("", ""), 1.0);
        assert!((edit_similarity("validator", "validater") - (8.0 / 9.0)).abs() < 1e-9);
    }
}
