//! Idempotency verifier (second quality gate)

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::similarity::{LexicalSimilarity, SimilarityScorer};
use crate::domain::text::count_tokens;
use crate::domain::transformer::{TransformInput, Transformer};
use crate::domain::DomainError;

/// Convergence verdict for one transformer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyResult {
    pub exact_match: bool,
    pub similarity: f64,
    pub token_drift: usize,
    pub passed: bool,
}

impl IdempotencyResult {
    /// Byte-identical reapplication; passes regardless of thresholds
    pub fn exact() -> Self {
        Self {
            exact_match: true,
            similarity: 1.0,
            token_drift: 0,
            passed: true,
        }
    }

    /// Non-identical reapplication judged against the thresholds
    pub fn approximate(similarity: f64, token_drift: usize, config: &IdempotencyConfig) -> Self {
        let similarity = similarity.clamp(0.0, 1.0);

        Self {
            exact_match: false,
            similarity,
            token_drift,
            passed: similarity >= config.min_similarity && token_drift <= config.max_token_drift,
        }
    }
}

/// Convergence thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    #[serde(default = "default_max_token_drift")]
    pub max_token_drift: usize,
}

fn default_min_similarity() -> f64 {
    0.98
}

fn default_max_token_drift() -> usize {
    10
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            min_similarity: default_min_similarity(),
            max_token_drift: default_max_token_drift(),
        }
    }
}

impl IdempotencyConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(DomainError::config(format!(
                "idempotency.min_similarity must lie in [0, 1], got {}",
                self.min_similarity
            )));
        }
        Ok(())
    }
}

/// Re-applies the transformer to its own output and checks the result converged
#[derive(Debug, Clone)]
pub struct IdempotencyVerifier {
    similarity: Arc<dyn SimilarityScorer>,
    config: IdempotencyConfig,
}

impl Default for IdempotencyVerifier {
    fn default() -> Self {
        Self::new(Arc::new(LexicalSimilarity::new()))
    }
}

impl IdempotencyVerifier {
    pub fn new(similarity: Arc<dyn SimilarityScorer>) -> Self {
        Self {
            similarity,
            config: IdempotencyConfig::default(),
        }
    }

    pub fn with_config(mut self, config: IdempotencyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    /// Runs `transformer` on `output` with the parameters of `input`
    ///
    /// Transformer errors propagate; a failing similarity service falls back
    /// to lexical scoring.
    pub async fn verify(
        &self,
        transformer: &dyn Transformer,
        input: &TransformInput,
        output: &str,
    ) -> Result<IdempotencyResult, DomainError> {
        let reapplied = transformer.transform(&input.with_content(output)).await?;

        if reapplied.text == output {
            debug!(transformer = %input.transformer_id, "Reapplication is byte-identical");
            return Ok(IdempotencyResult::exact());
        }

        let similarity = match self.similarity.similarity(output, &reapplied.text).await {
            Ok(score) => score,
            Err(e) => {
                warn!(
                    scorer = self.similarity.scorer_name(),
                    error = %e,
                    "Similarity service failed, falling back to lexical scoring"
                );
                LexicalSimilarity::score(output, &reapplied.text)
            }
        };

        let token_drift = count_tokens(output).abs_diff(count_tokens(&reapplied.text));
        let result = IdempotencyResult::approximate(similarity, token_drift, &self.config);

        debug!(
            transformer = %input.transformer_id,
            similarity = result.similarity,
            token_drift = result.token_drift,
            passed = result.passed,
            "Idempotency verified"
        );

        Ok(result)
    }
}
