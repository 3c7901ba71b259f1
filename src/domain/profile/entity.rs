//! Semantic profile types

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A conditional or threshold expression found in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPoint {
    /// The sentence the condition was found in
    pub text: String,
    /// Numbers and entities the condition depends on
    pub operands: Vec<String>,
}

impl DecisionPoint {
    pub fn new(text: impl Into<String>, operands: Vec<String>) -> Self {
        Self {
            text: text.into(),
            operands,
        }
    }
}

/// Two entities referenced together in one source sentence
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
}

impl Relationship {
    /// Builds an unordered pair; the lexically smaller term becomes `source`
    pub fn between(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());

        if a <= b {
            Self { source: a, target: b }
        } else {
            Self { source: b, target: a }
        }
    }
}

/// Structural fingerprint of a source document
///
/// Derived only from the source content and used as the read-only ground
/// truth when scoring transformer output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticProfile {
    /// Technical terms and named entities
    pub entities: BTreeSet<String>,
    /// Conditional / threshold logic, in document order
    pub decision_points: Vec<DecisionPoint>,
    /// Headings and explicit step delimiters, in document order
    pub task_markers: Vec<String>,
    /// Bounded sample of illustrative examples
    pub examples: Vec<String>,
    /// Thresholds and quality criteria later checked for retention
    pub anchors: BTreeSet<String>,
    /// Entity pairs referenced together
    pub relationships: BTreeSet<Relationship>,
}

impl SemanticProfile {
    /// True when nothing structural was found
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.decision_points.is_empty()
            && self.task_markers.is_empty()
            && self.examples.is_empty()
            && self.anchors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_is_unordered() {
        assert_eq!(
            Relationship::between("Validator", "CacheStore"),
            Relationship::between("CacheStore", "Validator")
        );
        assert_eq!(Relationship::between("b", "a").source, "a");
    }

    #[test]
    fn test_default_profile_is_empty() {
        assert!(SemanticProfile::default().is_empty());
    }
}
