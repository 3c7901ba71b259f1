use async_trait::async_trait;

use crate::domain::{DomainError, TransformInput, TransformOutput, Transformer};

/// Transformer that returns its input unchanged
///
/// Every output is a fixed point, which makes it useful for exercising the
/// pipeline without an upstream service.
#[derive(Debug, Clone)]
pub struct PassthroughTransformer {
    id: String,
    version: String,
}

impl PassthroughTransformer {
    pub fn new() -> Self {
        Self {
            id: "passthrough".to_string(),
            version: "1".to_string(),
        }
    }

    pub fn with_identity(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.id = id.into();
        self.version = version.into();
        self
    }
}

impl Default for PassthroughTransformer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transformer for PassthroughTransformer {
    async fn transform(&self, input: &TransformInput) -> Result<TransformOutput, DomainError> {
        Ok(TransformOutput::new(input.content.clone()))
    }

    fn transformer_id(&self) -> &str {
        &self.id
    }

    fn transformer_version(&self) -> &str {
        &self.version
    }
}
