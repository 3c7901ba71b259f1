//! Committed cache entries and store metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::{CacheKey, KeyMaterial};
use crate::domain::idempotency::IdempotencyResult;
use crate::domain::text::sha256_hex;
use crate::domain::validation::ValidationResult;

/// Current on-disk record layout
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// A transformation result that passed both gates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    #[serde(flatten)]
    pub material: KeyMaterial,
    pub output: String,
    /// SHA-256 of `output` at commit time
    pub output_hash: String,
    pub validation: ValidationResult,
    pub idempotency: IdempotencyResult,
    pub committed_at: DateTime<Utc>,
    pub schema_version: u32,
}

impl CacheEntry {
    /// Builds a candidate entry; the key is derived from the material
    pub fn new(
        material: KeyMaterial,
        output: impl Into<String>,
        validation: ValidationResult,
        idempotency: IdempotencyResult,
        schema_version: u32,
    ) -> Self {
        let output = output.into();

        Self {
            key: material.digest(),
            output_hash: sha256_hex(&output),
            material,
            output,
            validation,
            idempotency,
            committed_at: Utc::now(),
            schema_version,
        }
    }

    /// Re-checks the embedded hashes against the key the entry was read under
    pub fn verify_integrity(&self, key: &CacheKey) -> Result<(), IntegrityViolation> {
        if &self.key != key {
            return Err(IntegrityViolation::KeyMismatch);
        }

        if &self.material.digest() != key {
            return Err(IntegrityViolation::MaterialMismatch);
        }

        if sha256_hex(&self.output) != self.output_hash {
            return Err(IntegrityViolation::OutputHashMismatch);
        }

        Ok(())
    }
}

/// Why a stored entry failed its integrity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Record stored under a different key than it claims
    KeyMismatch,
    /// Embedded key material no longer hashes to the key
    MaterialMismatch,
    /// Output bytes no longer match the embedded output hash
    OutputHashMismatch,
    /// Record could not be decoded
    Unreadable,
}

impl std::fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyMismatch => write!(f, "stored key differs from lookup key"),
            Self::MaterialMismatch => write!(f, "key material does not hash to key"),
            Self::OutputHashMismatch => write!(f, "output does not match embedded hash"),
            Self::Unreadable => write!(f, "record could not be decoded"),
        }
    }
}

/// Result of a store lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CacheEntry),
    Miss,
    /// A corrupt entry was found and purged; behaves as a miss
    Corrupted(IntegrityViolation),
}

impl CacheLookup {
    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            Self::Hit(entry) => Some(entry),
            Self::Miss | Self::Corrupted(_) => None,
        }
    }
}

/// Store-wide metadata record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub total_entries: u64,
    #[serde(default)]
    pub hits: u64,
    #[serde(default)]
    pub misses: u64,
}

impl StoreMetadata {
    pub fn new(schema_version: u32) -> Self {
        let now = Utc::now();

        Self {
            schema_version,
            created_at: now,
            last_updated_at: now,
            total_entries: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_updated_at = Utc::now();
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;
    use crate::domain::cache::{compute_key, TransformParams};
    use crate::domain::validation::{Dimension, ValidationBreakdown};
    use std::collections::BTreeMap;

    pub fn passing_validation() -> ValidationResult {
        let scores: BTreeMap<Dimension, f64> =
            Dimension::ALL.iter().map(|d| (*d, 1.0)).collect();

        ValidationResult {
            dimension_scores: scores,
            weighted_total: 1.0,
            threshold: 0.85,
            passed: true,
            breakdown: ValidationBreakdown::default(),
        }
    }

    pub fn exact_idempotency() -> IdempotencyResult {
        IdempotencyResult {
            exact_match: true,
            similarity: 1.0,
            token_drift: 0,
            passed: true,
        }
    }

    pub fn entry_for(content: &str, output: &str) -> CacheEntry {
        let (_, material) =
            compute_key(content, "rewriter", "1.0.0", &TransformParams::new()).unwrap();

        CacheEntry::new(
            material,
            output,
            passing_validation(),
            exact_idempotency(),
            CURRENT_SCHEMA_VERSION,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::entry_for;
    use super::*;

    #[test]
    fn test_fresh_entry_passes_integrity() {
        let entry = entry_for("source text", "short text");
        assert!(entry.verify_integrity(&entry.key.clone()).is_ok());
    }

    #[test]
    fn test_mutated_output_is_detected() {
        let mut entry = entry_for("source text", "short text");
        entry.output.push_str(" tampered");

        assert_eq!(
            entry.verify_integrity(&entry.key.clone()),
            Err(IntegrityViolation::OutputHashMismatch)
        );
    }

    #[test]
    fn test_mutated_material_is_detected() {
        let mut entry = entry_for("source text", "short text");
        entry.material.content_hash = sha256_hex("something else");

        assert_eq!(
            entry.verify_integrity(&entry.key.clone()),
            Err(IntegrityViolation::MaterialMismatch)
        );
    }

    #[test]
    fn test_wrong_lookup_key_is_detected() {
        let entry = entry_for("source text", "short text");
        let other = entry_for("other source", "short text");

        assert_eq!(
            entry.verify_integrity(&other.key),
            Err(IntegrityViolation::KeyMismatch)
        );
    }

    #[test]
    fn test_entry_serde_roundtrip_preserves_equality() {
        let entry = entry_for("source text", "short text");
        let json = serde_json::to_string(&entry).unwrap();
        let decoded: CacheEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, entry);
    }
}
