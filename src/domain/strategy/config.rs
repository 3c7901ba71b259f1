//! Strategy configuration types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;
use crate::domain::validation::Dimension;

/// Named compression tier from the decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyTier {
    Aggressive,
    Moderate,
    Balanced,
    Selective,
    Light,
    Minimal,
}

impl StrategyTier {
    /// Upper bound on how much of the source may be removed, in percent
    pub fn max_reduction_pct(self) -> u8 {
        match self {
            Self::Aggressive => 60,
            Self::Moderate => 40,
            Self::Balanced => 30,
            Self::Selective => 25,
            Self::Light => 15,
            Self::Minimal => 10,
        }
    }

    pub fn validation_level(self) -> ValidationLevel {
        match self {
            Self::Aggressive | Self::Balanced => ValidationLevel::Standard,
            Self::Moderate => ValidationLevel::Enhanced,
            Self::Selective | Self::Light => ValidationLevel::Strict,
            Self::Minimal => ValidationLevel::VeryStrict,
        }
    }

    /// The tier to retry with after a validation failure
    ///
    /// Always removes less and never validates more leniently; `None` once
    /// the most conservative tier has been tried.
    pub fn next_conservative(self) -> Option<Self> {
        match self {
            Self::Aggressive => Some(Self::Moderate),
            Self::Moderate | Self::Balanced => Some(Self::Selective),
            Self::Selective => Some(Self::Light),
            Self::Light => Some(Self::Minimal),
            Self::Minimal => None,
        }
    }
}

impl fmt::Display for StrategyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aggressive => "aggressive",
            Self::Moderate => "moderate",
            Self::Balanced => "balanced",
            Self::Selective => "selective",
            Self::Light => "light",
            Self::Minimal => "minimal",
        };
        f.write_str(name)
    }
}

/// How strictly transformer output is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Standard,
    Enhanced,
    Strict,
    VeryStrict,
}

impl ValidationLevel {
    /// Minimum weighted total required to pass
    pub fn threshold(self) -> f64 {
        match self {
            Self::Standard => 0.85,
            Self::Enhanced => 0.88,
            Self::Strict => 0.90,
            Self::VeryStrict => 0.92,
        }
    }
}

/// Per-dimension weights for the validation total
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreservationWeights {
    #[serde(default = "default_entity_weight")]
    pub entities: f64,
    #[serde(default = "default_decision_weight")]
    pub decision_logic: f64,
    #[serde(default = "default_marker_weight")]
    pub task_markers: f64,
    #[serde(default = "default_relationship_weight")]
    pub relationships: f64,
    #[serde(default = "default_anchor_weight")]
    pub anchors: f64,
}

fn default_entity_weight() -> f64 {
    0.30
}

fn default_decision_weight() -> f64 {
    0.25
}

fn default_marker_weight() -> f64 {
    0.20
}

fn default_relationship_weight() -> f64 {
    0.15
}

fn default_anchor_weight() -> f64 {
    0.10
}

impl Default for PreservationWeights {
    fn default() -> Self {
        Self {
            entities: default_entity_weight(),
            decision_logic: default_decision_weight(),
            task_markers: default_marker_weight(),
            relationships: default_relationship_weight(),
            anchors: default_anchor_weight(),
        }
    }
}

impl PreservationWeights {
    pub fn weight(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::EntityPreservation => self.entities,
            Dimension::DecisionLogic => self.decision_logic,
            Dimension::TaskMarkers => self.task_markers,
            Dimension::Relationships => self.relationships,
            Dimension::AnchorRetention => self.anchors,
        }
    }

    pub fn total(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.weight(*d)).sum()
    }

    /// Weights must be finite, non-negative and not all zero
    pub fn validate(&self) -> Result<(), DomainError> {
        for dimension in Dimension::ALL {
            let weight = self.weight(dimension);

            if !weight.is_finite() || weight < 0.0 {
                return Err(DomainError::config(format!(
                    "Invalid weight {} for {}",
                    weight, dimension
                )));
            }
        }

        if self.total() <= 0.0 {
            return Err(DomainError::config("Preservation weights sum to zero"));
        }

        Ok(())
    }
}

/// Transformation configuration chosen once per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub tier: StrategyTier,
    pub max_reduction_pct: u8,
    pub validation_level: ValidationLevel,
    pub preservation_weights: PreservationWeights,
}

impl StrategyConfig {
    /// Builds the table row for `tier` with default weights
    pub fn for_tier(tier: StrategyTier) -> Self {
        Self {
            tier,
            max_reduction_pct: tier.max_reduction_pct(),
            validation_level: tier.validation_level(),
            preservation_weights: PreservationWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: PreservationWeights) -> Self {
        self.preservation_weights = weights;
        self
    }

    /// The retry configuration after a validation failure, keeping weights
    pub fn downgrade(&self) -> Option<Self> {
        self.tier
            .next_conservative()
            .map(|tier| Self::for_tier(tier).with_weights(self.preservation_weights))
    }

    pub fn threshold(&self) -> f64 {
        self.validation_level.threshold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TIERS: [StrategyTier; 6] = [
        StrategyTier::Aggressive,
        StrategyTier::Moderate,
        StrategyTier::Balanced,
        StrategyTier::Selective,
        StrategyTier::Light,
        StrategyTier::Minimal,
    ];

    #[test]
    fn test_thresholds() {
        assert_eq!(ValidationLevel::Standard.threshold(), 0.85);
        assert_eq!(ValidationLevel::Enhanced.threshold(), 0.88);
        assert_eq!(ValidationLevel::Strict.threshold(), 0.90);
        assert_eq!(ValidationLevel::VeryStrict.threshold(), 0.92);
    }

    #[test]
    fn test_downgrade_never_lowers_the_bar() {
        for tier in ALL_TIERS {
            if let Some(next) = tier.next_conservative() {
                assert!(next.max_reduction_pct() < tier.max_reduction_pct());
                assert!(next.validation_level() >= tier.validation_level());
            }
        }
    }

    #[test]
    fn test_downgrade_chain_terminates() {
        let mut config = StrategyConfig::for_tier(StrategyTier::Aggressive);
        let mut steps = 0;

        while let Some(next) = config.downgrade() {
            config = next;
            steps += 1;
        }

        assert_eq!(config.tier, StrategyTier::Minimal);
        assert_eq!(steps, 4);
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = PreservationWeights::default();
        assert!((weights.total() - 1.0).abs() < 1e-9);
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let negative = PreservationWeights {
            anchors: -0.1,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let zero = PreservationWeights {
            entities: 0.0,
            decision_logic: 0.0,
            task_markers: 0.0,
            relationships: 0.0,
            anchors: 0.0,
        };
        assert!(zero.validate().is_err());
    }
}
