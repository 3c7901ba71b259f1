//! Similarity service implementations

mod embedding;

pub use embedding::EmbeddingSimilarity;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{SimilarityConfig, SimilarityKind};
use crate::domain::{DomainError, LexicalSimilarity, SimilarityScorer};
use crate::infrastructure::http_client::HttpClient;

/// Create the configured similarity scorer
pub fn create_similarity(
    config: &SimilarityConfig,
) -> Result<Arc<dyn SimilarityScorer>, DomainError> {
    match config.kind {
        SimilarityKind::Lexical => Ok(Arc::new(LexicalSimilarity::new())),
        SimilarityKind::Embedding => {
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                DomainError::config("similarity.api_key is required for embedding similarity")
            })?;

            let client = HttpClient::with_timeout(Duration::from_secs(config.timeout_secs))?;
            let scorer = EmbeddingSimilarity::new(client, api_key, &config.model)
                .with_base_url(&config.base_url);

            Ok(Arc::new(scorer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_lexical_by_default() {
        let scorer = create_similarity(&SimilarityConfig::default()).unwrap();
        assert_eq!(scorer.scorer_name(), "lexical");
    }

    #[test]
    fn test_create_embedding() {
        let config = SimilarityConfig {
            kind: SimilarityKind::Embedding,
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };

        let scorer = create_similarity(&config).unwrap();
        assert_eq!(scorer.scorer_name(), "embedding");
    }

    #[test]
    fn test_embedding_requires_key() {
        let config = SimilarityConfig {
            kind: SimilarityKind::Embedding,
            ..Default::default()
        };

        assert!(create_similarity(&config).is_err());
    }
}
