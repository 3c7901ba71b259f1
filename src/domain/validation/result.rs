//! Validation result types

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One independently scored preservation dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    EntityPreservation,
    DecisionLogic,
    TaskMarkers,
    Relationships,
    AnchorRetention,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::EntityPreservation,
        Dimension::DecisionLogic,
        Dimension::TaskMarkers,
        Dimension::Relationships,
        Dimension::AnchorRetention,
    ];
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EntityPreservation => "entity_preservation",
            Self::DecisionLogic => "decision_logic",
            Self::TaskMarkers => "task_markers",
            Self::Relationships => "relationships",
            Self::AnchorRetention => "anchor_retention",
        };
        f.write_str(name)
    }
}

/// What was lost, per dimension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationBreakdown {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unrecoverable_decisions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_task_markers: Vec<String>,
    #[serde(default)]
    pub task_markers_out_of_order: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub broken_relationships: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_anchors: Vec<String>,
    /// Informational: sampled examples still present verbatim
    #[serde(default)]
    pub examples_retained: usize,
}

/// Outcome of scoring one transformer output against a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub dimension_scores: BTreeMap<Dimension, f64>,
    pub weighted_total: f64,
    /// Threshold the total was compared against
    pub threshold: f64,
    pub passed: bool,
    #[serde(default)]
    pub breakdown: ValidationBreakdown,
}

impl ValidationResult {
    pub fn score(&self, dimension: Dimension) -> f64 {
        self.dimension_scores.get(&dimension).copied().unwrap_or(0.0)
    }

    /// Dimensions that were not fully preserved, lowest score first
    pub fn weakest_dimensions(&self) -> Vec<(Dimension, f64)> {
        let mut weak: Vec<(Dimension, f64)> = self
            .dimension_scores
            .iter()
            .filter(|(_, score)| **score < 1.0)
            .map(|(d, s)| (*d, *s))
            .collect();

        weak.sort_by(|a, b| a.1.total_cmp(&b.1));
        weak
    }
}
