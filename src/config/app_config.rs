use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::cache::CURRENT_SCHEMA_VERSION;
use crate::domain::strategy::MAX_QUALITY;
use crate::domain::{DomainError, IdempotencyConfig, PreservationWeights};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub transformer: TransformerConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub idempotency: IdempotencyConfig,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Which cache store backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// Root directory of the file store
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".transform-cache")
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

fn default_store_timeout_secs() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            path: default_cache_path(),
            schema_version: default_schema_version(),
            store_timeout_secs: default_store_timeout_secs(),
        }
    }
}

/// Transformer backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransformerKind {
    /// OpenAI-compatible chat completions endpoint
    #[default]
    OpenAi,
    /// Returns its input unchanged
    Passthrough,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformerConfig {
    #[serde(default)]
    pub kind: TransformerKind,

    /// Identifier used in cache keys; derived from the backend when unset
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default = "default_transformer_version")]
    pub version: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_transformer_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_transform_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_transformer_version() -> String {
    "1".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_transformer_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_seed() -> u64 {
    42
}

fn default_transform_timeout_secs() -> u64 {
    120
}

fn default_max_concurrency() -> usize {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            kind: TransformerKind::default(),
            id: None,
            version: default_transformer_version(),
            base_url: default_openai_base_url(),
            api_key: None,
            model: default_transformer_model(),
            temperature: 0.0,
            seed: default_seed(),
            timeout_secs: default_transform_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl TransformerConfig {
    /// Identifier used in cache keys and for routing requests
    pub fn transformer_id(&self) -> String {
        match (&self.id, self.kind) {
            (Some(id), _) => id.clone(),
            (None, TransformerKind::OpenAi) => format!("openai:{}", self.model),
            (None, TransformerKind::Passthrough) => "passthrough".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub weights: PreservationWeights,
}

/// Similarity backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityKind {
    #[default]
    Lexical,
    Embedding,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default)]
    pub kind: SimilarityKind,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_similarity_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_similarity_timeout_secs() -> u64 {
    30
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            kind: SimilarityKind::default(),
            base_url: default_openai_base_url(),
            api_key: None,
            model: default_embedding_model(),
            timeout_secs: default_similarity_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Width of the batch worker pool
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Quality estimate assumed when a request carries none
    #[serde(default = "default_quality_estimate")]
    pub default_quality_estimate: f64,
}

fn default_workers() -> usize {
    8
}

fn default_quality_estimate() -> f64 {
    7.0
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            default_quality_estimate: default_quality_estimate(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("TCACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Checks the settings needed to open the cache store
    pub fn validate_cache(&self) -> Result<(), DomainError> {
        if self.cache.schema_version == 0 {
            return Err(DomainError::config("cache.schema_version must be at least 1"));
        }

        if self.cache.store_timeout_secs == 0 {
            return Err(DomainError::config("cache.store_timeout_secs must be positive"));
        }

        Ok(())
    }

    /// Rejects values the service cannot run with
    pub fn validate(&self) -> Result<(), DomainError> {
        self.validate_cache()?;
        self.validation.weights.validate()?;
        self.idempotency.validate()?;

        if self.transformer.timeout_secs == 0 {
            return Err(DomainError::config("transformer.timeout_secs must be positive"));
        }

        let temperature = self.transformer.temperature;
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            return Err(DomainError::config(format!(
                "transformer.temperature must lie in [0, 2], got {}",
                temperature
            )));
        }

        if self.transformer.max_concurrency == 0 {
            return Err(DomainError::config("transformer.max_concurrency must be positive"));
        }

        if self.transformer.version.trim().is_empty() {
            return Err(DomainError::config("transformer.version must not be empty"));
        }

        if self.transformer.kind == TransformerKind::OpenAi && !has_value(&self.transformer.api_key)
        {
            return Err(DomainError::config(
                "transformer.api_key is required for the open_ai transformer",
            ));
        }

        if self.similarity.kind == SimilarityKind::Embedding && !has_value(&self.similarity.api_key)
        {
            return Err(DomainError::config(
                "similarity.api_key is required for embedding similarity",
            ));
        }

        if self.orchestrator.workers == 0 {
            return Err(DomainError::config("orchestrator.workers must be positive"));
        }

        let quality = self.orchestrator.default_quality_estimate;
        if !quality.is_finite() || !(0.0..=MAX_QUALITY).contains(&quality) {
            return Err(DomainError::config(format!(
                "orchestrator.default_quality_estimate must lie in [0, 10], got {}",
                quality
            )));
        }

        Ok(())
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.transformer.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.cache.backend, CacheBackend::File);
        assert_eq!(config.cache.store_timeout_secs, 30);
        assert_eq!(config.cache.schema_version, 1);
        assert_eq!(config.transformer.timeout_secs, 120);
        assert_eq!(config.transformer.max_concurrency, 10);
        assert_eq!(config.transformer.max_retries, 2);
        assert_eq!(config.transformer.retry_backoff_ms, 500);
        assert_eq!(config.transformer.temperature, 0.0);
        assert_eq!(config.transformer.seed, 42);
        assert_eq!(config.orchestrator.workers, 8);
        assert_eq!(config.orchestrator.default_quality_estimate, 7.0);
        assert_eq!(config.idempotency.min_similarity, 0.98);
        assert_eq!(config.idempotency.max_token_drift, 10);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(DomainError::Config { .. })));

        let mut passthrough = AppConfig::default();
        passthrough.transformer.kind = TransformerKind::Passthrough;
        assert!(passthrough.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = valid();
        config.transformer.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.orchestrator.workers = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.cache.schema_version = 0;
        assert!(config.validate_cache().is_err());

        let mut config = valid();
        config.orchestrator.default_quality_estimate = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.validation.weights.entities = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserializes_partial_sections() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "cache": {"backend": "memory"},
            "transformer": {"kind": "passthrough", "seed": 7},
            "similarity": {"kind": "embedding", "api_key": "sk-test"}
        }))
        .unwrap();

        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.store_timeout_secs, 30);
        assert_eq!(config.transformer.kind, TransformerKind::Passthrough);
        assert_eq!(config.transformer.seed, 7);
        assert_eq!(config.similarity.kind, SimilarityKind::Embedding);
        assert!(config.validate().is_ok());
    }
}
