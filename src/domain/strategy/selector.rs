//! Fixed decision table mapping (quality, size) to a strategy

use super::config::{StrategyConfig, StrategyTier};

/// Token count at which an input counts as large
pub const LARGE_INPUT_TOKENS: usize = 2000;

/// Highest quality estimate on the scale
pub const MAX_QUALITY: f64 = 10.0;

/// Picks the tier for a quality estimate (0-10) and input size
///
/// Out-of-range quality is clamped onto the scale. A NaN estimate carries no
/// information and maps to the most conservative tier.
pub fn select_tier(quality_estimate: f64, token_count: usize) -> StrategyTier {
    if quality_estimate.is_nan() {
        return StrategyTier::Minimal;
    }

    let quality = quality_estimate.clamp(0.0, MAX_QUALITY);
    let large = token_count >= LARGE_INPUT_TOKENS;

    if quality < 6.0 {
        StrategyTier::Aggressive
    } else if quality < 7.0 {
        if large {
            StrategyTier::Moderate
        } else {
            StrategyTier::Balanced
        }
    } else if quality <= 8.0 {
        if large {
            StrategyTier::Selective
        } else {
            StrategyTier::Light
        }
    } else {
        StrategyTier::Minimal
    }
}

/// Selects the full strategy configuration with default weights
pub fn select_strategy(quality_estimate: f64, token_count: usize) -> StrategyConfig {
    StrategyConfig::for_tier(select_tier(quality_estimate, token_count))
}
