use std::sync::Arc;
use std::time::Duration;

use super::adapter::{RetryPolicy, TransformerAdapter};
use super::{OpenAiCompatibleTransformer, PassthroughTransformer};
use crate::config::{TransformerConfig, TransformerKind};
use crate::domain::{DomainError, Transformer};
use crate::infrastructure::http_client::HttpClient;

/// Factory for creating transformers from configuration
#[derive(Debug)]
pub struct TransformerFactory;

impl TransformerFactory {
    /// Create the configured backend wrapped in its adapter
    pub fn create(config: &TransformerConfig) -> Result<TransformerAdapter, DomainError> {
        let backend = Self::create_backend(config)?;

        let retry = RetryPolicy::new(config.max_retries).with_initial_delay(config.retry_backoff_ms);

        Ok(TransformerAdapter::new(backend)
            .with_max_concurrency(config.max_concurrency)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_retry_policy(retry))
    }

    /// Create the bare backend
    pub fn create_backend(config: &TransformerConfig) -> Result<Arc<dyn Transformer>, DomainError> {
        match config.kind {
            TransformerKind::OpenAi => {
                let api_key = config.api_key.as_deref().ok_or_else(|| {
                    DomainError::config("transformer.api_key is required for the open_ai transformer")
                })?;

                // The adapter owns the timeout; the client gets a slightly longer one
                let client = HttpClient::with_timeout(Duration::from_secs(config.timeout_secs + 5))?;
                let transformer = OpenAiCompatibleTransformer::new(client, api_key, &config.model)
                    .with_base_url(&config.base_url)
                    .with_identity(config.transformer_id(), &config.version);

                Ok(Arc::new(transformer))
            }

            TransformerKind::Passthrough => {
                Ok(Arc::new(
                    PassthroughTransformer::new()
                        .with_identity(config.transformer_id(), &config.version),
                ))
            }
        }
    }
}
