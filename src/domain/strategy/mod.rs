//! Strategy domain - bounded transformation configuration per request

mod config;
mod selector;

pub use config::{PreservationWeights, StrategyConfig, StrategyTier, ValidationLevel};
pub use selector::{LARGE_INPUT_TOKENS, MAX_QUALITY, select_strategy, select_tier};
