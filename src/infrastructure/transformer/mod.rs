//! Transformer backends and the adapter every call goes through

pub mod adapter;
pub mod factory;
pub mod openai;
pub mod passthrough;

pub use adapter::{RetryPolicy, TransformerAdapter};
pub use factory::TransformerFactory;
pub use openai::OpenAiCompatibleTransformer;
pub use passthrough::PassthroughTransformer;
