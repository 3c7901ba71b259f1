//! Transform Cache
//!
//! A verified transformation cache for text rewrites:
//! - Deterministic identity hashing of (content, transformer, parameters)
//! - Semantic profiling and tiered compression strategies
//! - Validation and idempotency gates before anything is committed
//! - Append-only file or in-memory stores with integrity checks

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use domain::{CacheStore, DomainError, IdempotencyVerifier, Transformer, Validator};
use infrastructure::cache::CacheStoreFactory;
use infrastructure::services::{ServiceSettings, TransformCacheService};
use infrastructure::similarity::create_similarity;
use infrastructure::transformer::TransformerFactory;
use tracing::info;

/// Open the configured cache store
pub async fn create_store(config: &AppConfig) -> Result<Arc<dyn CacheStore>, DomainError> {
    config.validate_cache()?;
    CacheStoreFactory::new().create(&config.cache).await
}

/// Create a service over the store only, for maintenance commands
pub async fn create_maintenance_service(
    config: &AppConfig,
) -> Result<TransformCacheService, DomainError> {
    let store = create_store(config).await?;

    Ok(TransformCacheService::new(store).with_settings(settings_from(config)))
}

/// Create the full service with transformer, validator and verifier wired from config
pub async fn create_service(config: &AppConfig) -> Result<TransformCacheService, DomainError> {
    config.validate()?;

    let store = create_store(config).await?;
    let transformer = TransformerFactory::create(&config.transformer)?;
    let similarity = create_similarity(&config.similarity)?;

    info!(
        transformer = transformer.transformer_id(),
        version = transformer.transformer_version(),
        backend = ?config.cache.backend,
        "Transform cache service ready"
    );

    Ok(TransformCacheService::new(store)
        .with_transformer(transformer)
        .with_validator(Validator::new(similarity.clone()))
        .with_verifier(IdempotencyVerifier::new(similarity).with_config(config.idempotency.clone()))
        .with_weights(config.validation.weights)
        .with_settings(settings_from(config)))
}

fn settings_from(config: &AppConfig) -> ServiceSettings {
    ServiceSettings {
        store_timeout: Duration::from_secs(config.cache.store_timeout_secs),
        workers: config.orchestrator.workers,
        default_quality_estimate: config.orchestrator.default_quality_estimate,
        schema_version: config.cache.schema_version,
    }
}
