//! Transformation request types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cache::TransformParams;
use crate::domain::strategy::StrategyConfig;

/// A caller's request to transform one document; immutable once issued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRequest {
    pub id: Uuid,
    pub content: String,
    pub params: TransformParams,
    pub transformer_id: String,
    pub created_at: DateTime<Utc>,
}

impl TransformationRequest {
    pub fn new(content: impl Into<String>, transformer_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            params: TransformParams::default(),
            transformer_id: transformer_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_params(mut self, params: TransformParams) -> Self {
        self.params = params;
        self
    }
}

/// What the transformer adapter receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformInput {
    pub content: String,
    pub strategy: StrategyConfig,
    pub transformer_id: String,
    pub transformer_version: String,
    pub temperature: f64,
    pub seed: u64,
}

impl TransformInput {
    /// Same parameters, different content; used to re-apply a transformation
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }
}

/// What the transformer adapter returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformOutput {
    pub text: String,
}

impl TransformOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
