//! Lexical similarity - always available, no external service

use std::collections::HashMap;

use async_trait::async_trait;

use super::scorer::SimilarityScorer;
use crate::domain::DomainError;
use crate::domain::text::words;

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Cosine similarity over lowercase word frequencies
#[derive(Debug, Clone, Default)]
pub struct LexicalSimilarity;

impl LexicalSimilarity {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous scoring used directly by the validator
    pub fn score(a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let left = words(a);
        let right = words(b);

        for word in left.iter().chain(right.iter()) {
            let next = vocabulary.len();
            vocabulary.entry(word.clone()).or_insert(next);
        }

        let mut va = vec![0.0; vocabulary.len()];
        let mut vb = vec![0.0; vocabulary.len()];

        for word in &left {
            va[vocabulary[word]] += 1.0;
        }
        for word in &right {
            vb[vocabulary[word]] += 1.0;
        }

        cosine_similarity(&va, &vb)
    }
}

#[async_trait]
impl SimilarityScorer for LexicalSimilarity {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, DomainError> {
        Ok(Self::score(a, b))
    }

    fn scorer_name(&self) -> &'static str {
        "lexical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_scores_one() {
        assert_eq!(LexicalSimilarity::score("a b c", "a b c"), 1.0);
        assert_eq!(LexicalSimilarity::score("", ""), 1.0);
    }

    #[test]
    fn test_case_and_punctuation_are_ignored() {
        let score = LexicalSimilarity::score("Cache the Result.", "cache the result");
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_text_scores_zero() {
        assert_eq!(LexicalSimilarity::score("alpha beta", "gamma delta"), 0.0);
        assert_eq!(LexicalSimilarity::score("alpha", ""), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // {a:1,b:1} vs {a:1,c:1} => 1 / 2
        let score = LexicalSimilarity::score("a b", "a c");
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_trait_scoring() {
        let scorer = LexicalSimilarity::new();
        let score = scorer.similarity("one two", "one two").await.unwrap();
        assert_eq!(score, 1.0);
        assert_eq!(scorer.scorer_name(), "lexical");
    }
}
