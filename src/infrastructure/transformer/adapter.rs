//! Transformer adapter - concurrency cap, timeout and retry around any transformer

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::domain::{DomainError, TransformInput, TransformOutput, Transformer};

/// Retry policy for transformer calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Fraction of the delay added as random jitter
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (0-indexed), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }

        let factor = rand::thread_rng().gen_range(0.0..=self.jitter);
        base + base.mul_f64(factor)
    }
}

/// Wraps a transformer with the resource policy every call goes through
///
/// Concurrency is capped independently of how many callers are waiting.
#[derive(Debug, Clone)]
pub struct TransformerAdapter {
    inner: Arc<dyn Transformer>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl TransformerAdapter {
    pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(inner: Arc<dyn Transformer>) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(Self::DEFAULT_MAX_CONCURRENCY)),
            timeout: Self::DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn attempt(&self, input: &TransformInput) -> Result<TransformOutput, DomainError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DomainError::internal("Transformer semaphore closed"))?;

        match tokio::time::timeout(self.timeout, self.inner.transform(input)).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::timeout(
                format!("transform via {}", self.inner.transformer_id()),
                self.timeout.as_secs(),
            )),
        }
    }
}

#[async_trait]
impl Transformer for TransformerAdapter {
    async fn transform(&self, input: &TransformInput) -> Result<TransformOutput, DomainError> {
        let max_attempts = self.retry.max_retries + 1;
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for_attempt(attempt - 1);
                debug!(
                    transformer = %self.inner.transformer_id(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying transformer call"
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(input).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() => {
                    warn!(
                        transformer = %self.inner.transformer_id(),
                        attempt = attempt + 1,
                        error = %e,
                        "Transformer call failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DomainError::transformer(self.inner.transformer_id(), "No attempts were made")
        }))
    }

    fn transformer_id(&self) -> &str {
        self.inner.transformer_id()
    }

    fn transformer_version(&self) -> &str {
        self.inner.transformer_version()
    }
}
