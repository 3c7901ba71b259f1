//! In-memory cache store implementation

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::cache::{CacheEntry, CacheKey, CacheLookup, CacheStore, StoreMetadata};
use crate::domain::DomainError;

/// Thread-safe in-memory cache store
///
/// Useful for testing and development. Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    metadata: RwLock<StoreMetadata>,
}

impl InMemoryCacheStore {
    pub fn new(schema_version: u32) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            metadata: RwLock::new(StoreMetadata::new(schema_version)),
        }
    }

    fn lock_error(e: impl std::fmt::Display) -> DomainError {
        DomainError::storage(format!("Failed to acquire lock: {}", e))
    }

    fn sync_metadata(&self, total_entries: usize) -> Result<(), DomainError> {
        let mut metadata = self.metadata.write().map_err(Self::lock_error)?;
        metadata.total_entries = total_entries as u64;
        metadata.touch();
        Ok(())
    }

    /// Removes the entry under `key` only if it still fails verification
    ///
    /// The check runs under the write lock, so an entry committed after the
    /// corrupt read is left in place.
    fn purge_if_corrupt(&self, key: &CacheKey) -> Result<bool, DomainError> {
        let remaining = {
            let mut entries = self.entries.write().map_err(Self::lock_error)?;
            let still_corrupt = entries
                .get(key)
                .is_some_and(|entry| entry.verify_integrity(key).is_err());

            if !still_corrupt {
                return Ok(false);
            }

            entries.remove(key);
            entries.len()
        };
        self.sync_metadata(remaining)?;

        Ok(true)
    }

    /// Mutates a stored entry in place, bypassing every check
    #[cfg(test)]
    pub fn tamper(&self, key: &CacheKey, mutate: impl FnOnce(&mut CacheEntry)) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            mutate(entry);
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new(crate::domain::cache::CURRENT_SCHEMA_VERSION)
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn lookup(&self, key: &CacheKey) -> Result<CacheLookup, DomainError> {
        let entry = {
            let entries = self.entries.read().map_err(Self::lock_error)?;
            entries.get(key).cloned()
        };

        let Some(entry) = entry else {
            return Ok(CacheLookup::Miss);
        };

        match entry.verify_integrity(key) {
            Ok(()) => Ok(CacheLookup::Hit(entry)),
            Err(violation) => {
                warn!(
                    target: "data_integrity",
                    key = %key,
                    violation = %violation,
                    "Corrupt cache entry purged"
                );

                self.purge_if_corrupt(key)?;

                Ok(CacheLookup::Corrupted(violation))
            }
        }
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), DomainError> {
        entry.verify_integrity(key).map_err(|violation| {
            DomainError::internal(format!("Refusing to store entry for {}: {}", key, violation))
        })?;

        let total = {
            let mut entries = self.entries.write().map_err(Self::lock_error)?;

            if entries.contains_key(key) {
                return Err(DomainError::conflict(format!(
                    "Cache entry '{}' already exists",
                    key
                )));
            }

            entries.insert(key.clone(), entry);
            entries.len()
        };

        self.sync_metadata(total)
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<bool, DomainError> {
        let (removed, remaining) = {
            let mut entries = self.entries.write().map_err(Self::lock_error)?;
            (entries.remove(key).is_some(), entries.len())
        };

        if removed {
            self.sync_metadata(remaining)?;
        }

        Ok(removed)
    }

    async fn invalidate_before_schema(&self, schema_version: u32) -> Result<usize, DomainError> {
        let (removed, remaining) = {
            let mut entries = self.entries.write().map_err(Self::lock_error)?;
            let before = entries.len();
            entries.retain(|_, entry| entry.schema_version >= schema_version);
            (before - entries.len(), entries.len())
        };

        self.sync_metadata(remaining)?;
        Ok(removed)
    }

    async fn entries(&self) -> Result<Vec<CacheEntry>, DomainError> {
        let entries = self.entries.read().map_err(Self::lock_error)?;
        Ok(entries.values().cloned().collect())
    }

    async fn metadata(&self) -> Result<StoreMetadata, DomainError> {
        let metadata = self.metadata.read().map_err(Self::lock_error)?;
        Ok(metadata.clone())
    }

    async fn record_usage(&self, hits: u64, misses: u64) -> Result<(), DomainError> {
        let mut metadata = self.metadata.write().map_err(Self::lock_error)?;
        metadata.hits += hits;
        metadata.misses += misses;
        metadata.touch();
        Ok(())
    }

    async fn close(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
