//! Cache domain - identity hashing, entries and the store contract

mod entry;
mod key;
mod repository;

pub use entry::{
    CURRENT_SCHEMA_VERSION, CacheEntry, CacheLookup, IntegrityViolation, StoreMetadata,
};
pub use key::{CacheKey, KeyMaterial, TransformParams, compute_key};
pub use repository::CacheStore;

#[cfg(test)]
pub use entry::fixtures;
#[cfg(test)]
pub use repository::MockCacheStore;
