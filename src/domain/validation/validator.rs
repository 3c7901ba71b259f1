//! Semantic-preservation validator (first quality gate)

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::result::{Dimension, ValidationBreakdown, ValidationResult};
use crate::domain::profile::{DecisionPoint, SemanticProfile, render_prose};
use crate::domain::similarity::{LexicalSimilarity, SimilarityScorer};
use crate::domain::strategy::StrategyConfig;
use crate::domain::text::{contains_ignore_case, edit_similarity, normalize_term, sentences};

/// Minimum edit similarity for a fuzzy entity match
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

/// Minimum similarity for an operand-less decision to count as recoverable
pub const DEFAULT_DECISION_SIMILARITY: f64 = 0.6;

/// Scores transformer output against the source profile
#[derive(Debug, Clone)]
pub struct Validator {
    similarity: Arc<dyn SimilarityScorer>,
    fuzzy_threshold: f64,
    decision_similarity: f64,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Arc::new(LexicalSimilarity::new()))
    }
}

/// Output pre-processed once per validation
///
/// `prose` is rendered by the same markdown walk the profile was built from,
/// so markup around a term does not hide it.
struct OutputIndex<'a> {
    raw: &'a str,
    prose: String,
    lower: String,
    compact: String,
    prose_compact: String,
    tokens: BTreeSet<String>,
    sentences: Vec<String>,
}

fn compact(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

impl<'a> OutputIndex<'a> {
    fn new(raw: &'a str) -> Self {
        let prose = render_prose(raw);

        Self {
            raw,
            lower: raw.to_lowercase(),
            compact: compact(raw),
            prose_compact: compact(&prose),
            tokens: raw
                .split_whitespace()
                .map(normalize_term)
                .filter(|t| !t.is_empty())
                .collect(),
            sentences: sentences(&prose),
            prose,
        }
    }
}

impl Validator {
    pub fn new(similarity: Arc<dyn SimilarityScorer>) -> Self {
        Self {
            similarity,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            decision_similarity: DEFAULT_DECISION_SIMILARITY,
        }
    }

    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_decision_similarity(mut self, threshold: f64) -> Self {
        self.decision_similarity = threshold.clamp(0.0, 1.0);
        self
    }

    /// Scores `output` on every dimension and applies the strategy's threshold
    pub async fn validate(
        &self,
        profile: &SemanticProfile,
        output: &str,
        strategy: &StrategyConfig,
    ) -> ValidationResult {
        let index = OutputIndex::new(output);
        let mut breakdown = ValidationBreakdown::default();
        let mut scores = BTreeMap::new();

        scores.insert(
            Dimension::EntityPreservation,
            self.score_entities(profile, &index, &mut breakdown),
        );
        scores.insert(
            Dimension::DecisionLogic,
            self.score_decisions(profile, &index, &mut breakdown).await,
        );
        scores.insert(
            Dimension::TaskMarkers,
            Self::score_task_markers(profile, &index, &mut breakdown),
        );
        scores.insert(
            Dimension::Relationships,
            Self::score_relationships(profile, &index, &mut breakdown),
        );
        scores.insert(
            Dimension::AnchorRetention,
            Self::score_anchors(profile, &index, &mut breakdown),
        );

        breakdown.examples_retained = profile
            .examples
            .iter()
            .filter(|example| output.contains(example.as_str()))
            .count();

        let weights = &strategy.preservation_weights;
        let weighted: f64 = scores.iter().map(|(d, s)| weights.weight(*d) * s).sum();
        let weighted_total = (weighted / weights.total()).clamp(0.0, 1.0);
        let threshold = strategy.threshold();
        let passed = weighted_total >= threshold;

        debug!(
            tier = %strategy.tier,
            weighted_total,
            threshold,
            passed,
            "Validated transformer output"
        );

        ValidationResult {
            dimension_scores: scores,
            weighted_total,
            threshold,
            passed,
            breakdown,
        }
    }

    fn fraction(kept: usize, total: usize) -> f64 {
        if total == 0 {
            1.0
        } else {
            kept as f64 / total as f64
        }
    }

    fn entity_retained(&self, entity: &str, index: &OutputIndex<'_>) -> bool {
        if index.lower.contains(&entity.to_lowercase()) {
            return true;
        }

        let normalized = normalize_term(entity);
        if normalized.is_empty() {
            return false;
        }

        if index.tokens.contains(&normalized) {
            return true;
        }

        index
            .tokens
            .iter()
            .any(|token| edit_similarity(token, &normalized) >= self.fuzzy_threshold)
    }

    fn score_entities(
        &self,
        profile: &SemanticProfile,
        index: &OutputIndex<'_>,
        breakdown: &mut ValidationBreakdown,
    ) -> f64 {
        for entity in &profile.entities {
            if !self.entity_retained(entity, index) {
                breakdown.missing_entities.push(entity.clone());
            }
        }

        let total = profile.entities.len();
        Self::fraction(total - breakdown.missing_entities.len(), total)
    }

    async fn decision_recoverable(&self, decision: &DecisionPoint, index: &OutputIndex<'_>) -> bool {
        if !decision.operands.is_empty() {
            return index.sentences.iter().any(|sentence| {
                decision
                    .operands
                    .iter()
                    .all(|operand| contains_ignore_case(sentence, operand))
            });
        }

        // No operands: find the lexically closest sentence, confirm with the scorer
        let candidate = index.sentences.iter().max_by(|a, b| {
            LexicalSimilarity::score(&decision.text, a)
                .total_cmp(&LexicalSimilarity::score(&decision.text, b))
        });

        let Some(candidate) = candidate else {
            return false;
        };

        let score = match self.similarity.similarity(&decision.text, candidate).await {
            Ok(score) => score,
            Err(e) => {
                warn!(
                    scorer = self.similarity.scorer_name(),
                    error = %e,
                    "Similarity scorer failed, using lexical fallback"
                );
                LexicalSimilarity::score(&decision.text, candidate)
            }
        };

        score >= self.decision_similarity
    }

    async fn score_decisions(
        &self,
        profile: &SemanticProfile,
        index: &OutputIndex<'_>,
        breakdown: &mut ValidationBreakdown,
    ) -> f64 {
        for decision in &profile.decision_points {
            if !self.decision_recoverable(decision, index).await {
                breakdown.unrecoverable_decisions.push(decision.text.clone());
            }
        }

        let total = profile.decision_points.len();
        Self::fraction(total - breakdown.unrecoverable_decisions.len(), total)
    }

    /// Markers must be syntactically exact; a present-but-reordered set
    /// scores half
    ///
    /// Each marker is searched from the end of the previous one, so an early
    /// mention of a later marker's text does not count as reordering.
    fn score_task_markers(
        profile: &SemanticProfile,
        index: &OutputIndex<'_>,
        breakdown: &mut ValidationBreakdown,
    ) -> f64 {
        let mut cursor = 0;

        for marker in &profile.task_markers {
            let marker = marker.as_str();

            match index.prose[cursor..].find(marker) {
                Some(offset) => cursor += offset + marker.len(),
                None if index.prose.contains(marker) => {
                    breakdown.task_markers_out_of_order = true;
                }
                // Only outside the rendered prose, e.g. in a code block
                None if index.raw.contains(marker) => {}
                None => breakdown.missing_task_markers.push(marker.to_string()),
            }
        }

        let total = profile.task_markers.len();
        let mut score = Self::fraction(total - breakdown.missing_task_markers.len(), total);

        if breakdown.task_markers_out_of_order {
            score *= 0.5;
        }

        score
    }

    fn score_relationships(
        profile: &SemanticProfile,
        index: &OutputIndex<'_>,
        breakdown: &mut ValidationBreakdown,
    ) -> f64 {
        for relationship in &profile.relationships {
            let consistent = index.sentences.iter().any(|sentence| {
                contains_ignore_case(sentence, &relationship.source)
                    && contains_ignore_case(sentence, &relationship.target)
            });

            if !consistent {
                breakdown
                    .broken_relationships
                    .push(format!("{} <-> {}", relationship.source, relationship.target));
            }
        }

        let total = profile.relationships.len();
        Self::fraction(total - breakdown.broken_relationships.len(), total)
    }

    fn score_anchors(
        profile: &SemanticProfile,
        index: &OutputIndex<'_>,
        breakdown: &mut ValidationBreakdown,
    ) -> f64 {
        for anchor in &profile.anchors {
            let anchor_compact = compact(anchor);

            if !index.prose_compact.contains(&anchor_compact)
                && !index.compact.contains(&anchor_compact)
            {
                breakdown.missing_anchors.push(anchor.clone());
            }
        }

        let total = profile.anchors.len();
        Self::fraction(total - breakdown.missing_anchors.len(), total)
    }
}
