//! Transformer domain - the external black-box rewriter boundary

mod provider;
mod request;

pub use provider::Transformer;
pub use request::{TransformInput, TransformOutput, TransformationRequest};

#[cfg(test)]
pub use provider::mock::MockTransformer;
