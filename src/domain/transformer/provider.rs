use async_trait::async_trait;
use std::fmt::Debug;

use super::request::{TransformInput, TransformOutput};
use crate::domain::DomainError;

/// Trait for black-box text transformers (LLM rewriters, compressors, ...)
///
/// Implementations are not assumed to be deterministic.
#[async_trait]
pub trait Transformer: Send + Sync + Debug {
    /// Transform the input content
    async fn transform(&self, input: &TransformInput) -> Result<TransformOutput, DomainError>;

    /// Stable identifier used in cache keys
    fn transformer_id(&self) -> &str;

    /// Version used in cache keys; bump it whenever behavior changes
    fn transformer_version(&self) -> &str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Behavior = Box<dyn Fn(&str) -> String + Send + Sync>;

    /// Scripted transformer that counts its invocations
    pub struct MockTransformer {
        id: String,
        version: String,
        behavior: Behavior,
        delay: Option<Duration>,
        failures_remaining: AtomicUsize,
        calls: AtomicUsize,
    }

    impl Debug for MockTransformer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockTransformer")
                .field("id", &self.id)
                .field("version", &self.version)
                .field("calls", &self.calls.load(Ordering::SeqCst))
                .finish()
        }
    }

    impl MockTransformer {
        /// Transformer applying `behavior` to the input content
        pub fn new(behavior: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
            Self {
                id: "mock".to_string(),
                version: "1.0.0".to_string(),
                behavior: Box::new(behavior),
                delay: None,
                failures_remaining: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        /// Returns its input unchanged - a trivial fixed point
        pub fn identity() -> Self {
            Self::new(|content| content.to_string())
        }

        pub fn with_id(mut self, id: impl Into<String>) -> Self {
            self.id = id.into();
            self
        }

        pub fn with_version(mut self, version: impl Into<String>) -> Self {
            self.version = version.into();
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Fails the first `count` calls with a transformer error
        pub fn failing_times(self, count: usize) -> Self {
            self.failures_remaining.store(count, Ordering::SeqCst);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transformer for MockTransformer {
        async fn transform(
            &self,
            input: &TransformInput,
        ) -> Result<TransformOutput, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let failed = self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();

            if failed {
                return Err(DomainError::transformer(&self.id, "scripted failure"));
            }

            Ok(TransformOutput::new((self.behavior)(&input.content)))
        }

        fn transformer_id(&self) -> &str {
            &self.id
        }

        fn transformer_version(&self) -> &str {
            &self.version
        }
    }
}
