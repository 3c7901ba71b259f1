//! Similarity scorer trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::DomainError;

/// Scores how similar two texts are, in [0, 1]
#[async_trait]
pub trait SimilarityScorer: Send + Sync + Debug {
    /// Similarity of `a` and `b`; identical inputs must score 1.0
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, DomainError>;

    /// Get the scorer name
    fn scorer_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Mock scorer returning a fixed similarity for non-identical inputs
    #[derive(Debug)]
    pub struct MockSimilarity {
        score: f64,
        error: Option<String>,
    }

    impl MockSimilarity {
        pub fn new(score: f64) -> Self {
            Self { score, error: None }
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }
    }

    #[async_trait]
    impl SimilarityScorer for MockSimilarity {
        async fn similarity(&self, a: &str, b: &str) -> Result<f64, DomainError> {
            if let Some(ref error) = self.error {
                return Err(DomainError::internal(error.clone()));
            }

            if a == b {
                return Ok(1.0);
            }

            Ok(self.score)
        }

        fn scorer_name(&self) -> &'static str {
            "mock"
        }
    }
}
