//! Embedding-backed similarity with a lexical fallback

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::domain::similarity::cosine_similarity;
use crate::domain::{DomainError, LexicalSimilarity, SimilarityScorer};
use crate::infrastructure::http_client::HttpClientTrait;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Cosine similarity of embeddings from an OpenAI-compatible endpoint
#[derive(Debug)]
pub struct EmbeddingSimilarity<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
}

impl<C: HttpClientTrait> EmbeddingSimilarity<C> {
    pub fn new(client: C, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    /// Embeds both texts in one request
    async fn embed_pair(&self, a: &str, b: &str) -> Result<(Vec<f64>, Vec<f64>), DomainError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [a, b],
        });

        let json = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await?;

        let response: EmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::internal(format!("Failed to parse embedding response: {}", e))
        })?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);

        let mut vectors = data.into_iter().map(|d| d.embedding);
        match (vectors.next(), vectors.next()) {
            (Some(first), Some(second)) => Ok((first, second)),
            _ => Err(DomainError::internal("Embedding response is missing vectors")),
        }
    }
}

#[async_trait]
impl<C: HttpClientTrait> SimilarityScorer for EmbeddingSimilarity<C> {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, DomainError> {
        if a == b {
            return Ok(1.0);
        }

        match self.embed_pair(a, b).await {
            Ok((first, second)) => Ok(cosine_similarity(&first, &second)),
            Err(e) => {
                warn!(
                    model = %self.model,
                    error = %e,
                    "Embedding similarity failed, falling back to lexical scoring"
                );
                Ok(LexicalSimilarity::score(a, b))
            }
        }
    }

    fn scorer_name(&self) -> &'static str {
        "embedding"
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::mock::MockHttpClient;

    const TEST_URL: &str = "https://api.openai.com/v1/embeddings";

    #[tokio::test]
    async fn test_scores_cosine_of_embeddings() {
        let client = MockHttpClient::new().with_response(
            TEST_URL,
            serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 1.0]}
                ]
            }),
        );
        let scorer = EmbeddingSimilarity::new(client, "sk-test", "text-embedding-3-small");

        let score = scorer.similarity("first", "second").await.unwrap();
        assert!((score - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_identical_texts_skip_the_request() {
        let client = MockHttpClient::new();
        let scorer = EmbeddingSimilarity::new(client, "sk-test", "text-embedding-3-small");

        assert_eq!(scorer.similarity("same", "same").await.unwrap(), 1.0);
        assert_eq!(scorer.client.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_lexical_on_error() {
        let client = MockHttpClient::new().with_error(TEST_URL, "HTTP 500");
        let scorer = EmbeddingSimilarity::new(client, "sk-test", "text-embedding-3-small");

        let score = scorer.similarity("alpha beta", "beta gamma").await.unwrap();
        assert_eq!(score, LexicalSimilarity::score("alpha beta", "beta gamma"));
    }

    #[tokio::test]
    async fn test_falls_back_when_vectors_missing() {
        let client = MockHttpClient::new()
            .with_response(TEST_URL, serde_json::json!({"data": []}));
        let scorer = EmbeddingSimilarity::new(client, "sk-test", "text-embedding-3-small");

        let score = scorer.similarity("alpha", "alpha beta").await.unwrap();
        assert_eq!(score, LexicalSimilarity::score("alpha", "alpha beta"));
    }
}
