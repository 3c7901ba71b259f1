//! Semantic profile domain - structural fingerprint of source content

mod entity;
mod extractor;

pub use entity::{DecisionPoint, Relationship, SemanticProfile};
pub use extractor::{
    MAX_EXAMPLES, MAX_RELATIONSHIPS, SemanticProfiler, extract_profile, render_prose,
};
