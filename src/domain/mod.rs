//! Domain layer - Core business logic and entities

pub mod cache;
pub mod error;
pub mod idempotency;
pub mod outcome;
pub mod profile;
pub mod similarity;
pub mod strategy;
pub mod text;
pub mod transformer;
pub mod validation;

pub use cache::{
    CacheEntry, CacheKey, CacheLookup, CacheStore, IntegrityViolation, KeyMaterial,
    StoreMetadata, TransformParams, compute_key,
};
pub use error::DomainError;
pub use idempotency::{IdempotencyConfig, IdempotencyResult, IdempotencyVerifier};
pub use outcome::{TransformOutcome, TransformResponse};
pub use profile::{SemanticProfile, SemanticProfiler, extract_profile};
pub use similarity::{LexicalSimilarity, SimilarityScorer};
pub use strategy::{
    PreservationWeights, StrategyConfig, StrategyTier, ValidationLevel, select_strategy,
};
pub use transformer::{TransformInput, TransformOutput, TransformationRequest, Transformer};
pub use validation::{Dimension, ValidationResult, Validator};
