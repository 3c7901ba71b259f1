//! Cache store factory for runtime selection

use std::sync::Arc;

use tracing::info;

use crate::config::{CacheBackend, CacheConfig};
use crate::domain::cache::CacheStore;
use crate::domain::DomainError;

use super::file::FileCacheStore;
use super::in_memory::InMemoryCacheStore;

/// Factory for creating cache store instances
#[derive(Debug, Default)]
pub struct CacheStoreFactory;

impl CacheStoreFactory {
    pub fn new() -> Self {
        Self
    }

    /// Opens the configured store
    pub async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn CacheStore>, DomainError> {
        match config.backend {
            CacheBackend::Memory => {
                info!(schema_version = config.schema_version, "Using in-memory cache store");
                Ok(Arc::new(InMemoryCacheStore::new(config.schema_version)))
            }
            CacheBackend::File => {
                let store = FileCacheStore::open(&config.path, config.schema_version).await?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_memory_store() {
        let config = CacheConfig {
            backend: CacheBackend::Memory,
            schema_version: 4,
            ..Default::default()
        };

        let store = CacheStoreFactory::new().create(&config).await.unwrap();
        assert_eq!(store.metadata().await.unwrap().schema_version, 4);
    }

    #[tokio::test]
    async fn test_create_file_store() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            backend: CacheBackend::File,
            path: dir.path().join("cache"),
            ..Default::default()
        };

        let store = CacheStoreFactory::new().create(&config).await.unwrap();

        assert!(dir.path().join("cache").join("metadata.json").exists());
        assert_eq!(store.entries().await.unwrap().len(), 0);
    }
}
