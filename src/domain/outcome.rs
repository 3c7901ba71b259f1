//! Typed request outcomes
//!
//! Gate failures are outcomes rather than errors so callers branch on them.

use serde::Serialize;

use crate::domain::cache::{CacheEntry, CacheKey};
use crate::domain::idempotency::IdempotencyResult;
use crate::domain::strategy::StrategyTier;
use crate::domain::validation::ValidationResult;

/// Process exit codes of the operational surface
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GATE_FAILURE: i32 = 1;
    pub const TRANSFORMER_ERROR: i32 = 2;
    pub const CORRUPTION_REPAIRED: i32 = 3;
    /// The command itself failed: bad configuration, unusable store, bad arguments
    pub const HARD_FAILURE: i32 = 4;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransformOutcome {
    /// Served from the cache; nothing was computed
    Hit { entry: CacheEntry },

    /// Both gates passed and the entry was persisted
    Committed {
        entry: CacheEntry,
        tier: StrategyTier,
        downgraded: bool,
    },

    /// Validation failed on every attempted tier; nothing was cached
    ValidationFailed {
        output: String,
        validation: ValidationResult,
        tier: StrategyTier,
        attempts: u8,
    },

    /// The output did not converge under re-application; nothing was cached
    IdempotencyViolation {
        output: String,
        validation: ValidationResult,
        idempotency: IdempotencyResult,
        tier: StrategyTier,
        flagged_for_review: bool,
    },

    /// The transformer failed after retries
    TransformerFailed { message: String },

    /// The caller cancelled before the shared computation finished
    Cancelled,
}

impl TransformOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Hit { .. } | Self::Committed { .. })
    }

    /// Output text, trusted or not
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Hit { entry } | Self::Committed { entry, .. } => Some(&entry.output),
            Self::ValidationFailed { output, .. } | Self::IdempotencyViolation { output, .. } => {
                Some(output)
            }
            Self::TransformerFailed { .. } | Self::Cancelled => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Hit { .. } => "hit",
            Self::Committed { .. } => "committed",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::IdempotencyViolation { .. } => "idempotency_violation",
            Self::TransformerFailed { .. } => "transformer_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one request plus what happened to the cache on the way
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformResponse {
    pub key: CacheKey,
    pub outcome: TransformOutcome,
    /// A corrupt entry for this key was purged during the request
    pub corruption_repaired: bool,
}

impl TransformResponse {
    pub fn new(key: CacheKey, outcome: TransformOutcome) -> Self {
        Self {
            key,
            outcome,
            corruption_repaired: false,
        }
    }

    pub fn with_corruption_repaired(mut self, repaired: bool) -> Self {
        self.corruption_repaired = repaired;
        self
    }

    /// Transformer errors win over gate failures, which win over repairs
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            TransformOutcome::TransformerFailed { .. } | TransformOutcome::Cancelled => {
                exit_code::TRANSFORMER_ERROR
            }
            TransformOutcome::ValidationFailed { .. }
            | TransformOutcome::IdempotencyViolation { .. } => exit_code::GATE_FAILURE,
            TransformOutcome::Hit { .. } | TransformOutcome::Committed { .. } => {
                if self.corruption_repaired {
                    exit_code::CORRUPTION_REPAIRED
                } else {
                    exit_code::SUCCESS
                }
            }
        }
    }
}
