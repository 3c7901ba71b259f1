//! Cache store trait definition

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::entry::{CacheEntry, CacheLookup, StoreMetadata};
use super::key::CacheKey;
use crate::domain::DomainError;

/// Append-only, integrity-checked store of committed transformations
///
/// Implementations must make `put` atomic: a concurrent reader either sees the
/// whole entry or none of it. Entries are never overwritten; a changed request
/// yields a new key.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Looks up an entry, re-checking its integrity.
    ///
    /// A corrupt entry is purged before this returns [`CacheLookup::Corrupted`].
    async fn lookup(&self, key: &CacheKey) -> Result<CacheLookup, DomainError>;

    /// Commits an entry; fails with `Conflict` if the key is already present
    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), DomainError>;

    /// Removes one entry, returning whether it existed
    async fn invalidate(&self, key: &CacheKey) -> Result<bool, DomainError>;

    /// Removes every entry whose schema version is below `schema_version`
    async fn invalidate_before_schema(&self, schema_version: u32) -> Result<usize, DomainError>;

    /// Lists every readable entry
    async fn entries(&self) -> Result<Vec<CacheEntry>, DomainError>;

    /// Returns the store-wide metadata record
    async fn metadata(&self) -> Result<StoreMetadata, DomainError>;

    /// Adds lookup counters to the metadata record
    async fn record_usage(&self, hits: u64, misses: u64) -> Result<(), DomainError>;

    /// Flushes pending state; the store must not be used afterwards
    async fn close(&self) -> Result<(), DomainError>;

    /// Returns the entry if present and intact
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, DomainError> {
        Ok(self.lookup(key).await?.into_entry())
    }
}
