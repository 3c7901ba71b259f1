//! Validation domain - multi-dimensional semantic-preservation scoring

mod result;
mod validator;

pub use result::{Dimension, ValidationBreakdown, ValidationResult};
pub use validator::{DEFAULT_DECISION_SIMILARITY, DEFAULT_FUZZY_THRESHOLD, Validator};
