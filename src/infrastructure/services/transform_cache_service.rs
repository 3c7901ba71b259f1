//! Transformation cache service - the request pipeline
//!
//! key -> lookup -> (miss) profile + strategy -> transform -> validate ->
//! verify idempotency -> commit. Nothing is committed unless both gates pass.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{StreamExt, stream};
use metrics::counter;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::cache::{
    CURRENT_SCHEMA_VERSION, CacheEntry, CacheKey, CacheLookup, CacheStore, KeyMaterial,
    compute_key,
};
use crate::domain::text::count_tokens;
use crate::domain::{
    DomainError, IdempotencyVerifier, PreservationWeights, SemanticProfiler, TransformInput,
    TransformOutcome, TransformResponse, TransformationRequest, Transformer, Validator,
    select_strategy,
};
use crate::infrastructure::transformer::TransformerAdapter;

use super::singleflight::SingleFlight;

/// Runtime settings of the pipeline
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub store_timeout: Duration,
    pub workers: usize,
    pub default_quality_estimate: f64,
    pub schema_version: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(30),
            workers: 8,
            default_quality_estimate: 7.0,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}

/// Cache usage summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub mean_weighted_total: f64,
    pub mean_idempotency_similarity: f64,
    pub schema_version: u32,
}

/// Everything derived from a request before touching the store
struct PreparedRequest {
    key: CacheKey,
    material: KeyMaterial,
    request: TransformationRequest,
    adapter: Arc<TransformerAdapter>,
}

/// State shared with spawned computations
#[derive(Clone)]
struct Pipeline {
    store: Arc<dyn CacheStore>,
    profiler: SemanticProfiler,
    validator: Validator,
    verifier: IdempotencyVerifier,
    weights: PreservationWeights,
    settings: ServiceSettings,
}

impl Pipeline {
    async fn with_store_timeout<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        tokio::time::timeout(self.settings.store_timeout, fut)
            .await
            .map_err(|_| {
                DomainError::timeout(
                    format!("cache {}", operation),
                    self.settings.store_timeout.as_secs(),
                )
            })?
    }

    async fn lookup(&self, key: &CacheKey) -> Result<CacheLookup, DomainError> {
        let lookup = self.with_store_timeout("lookup", self.store.lookup(key)).await?;

        if let CacheLookup::Corrupted(violation) = &lookup {
            counter!("transform_cache_corruption_repairs_total").increment(1);
            warn!(
                target: "data_integrity",
                key = %key,
                violation = %violation,
                "Corrupt entry repaired, treating request as a miss"
            );
        }

        Ok(lookup)
    }

    /// Commits `entry`; if another writer got there first, returns theirs
    async fn commit(&self, key: &CacheKey, entry: CacheEntry) -> Result<CacheEntry, DomainError> {
        match self
            .with_store_timeout("put", self.store.put(key, entry.clone()))
            .await
        {
            Ok(()) => {
                counter!("transform_cache_commits_total").increment(1);
                info!(key = %key, "Transformation committed");
                Ok(entry)
            }
            Err(DomainError::Conflict { message }) => match self.lookup(key).await? {
                CacheLookup::Hit(existing) => Ok(existing),
                _ => Err(DomainError::conflict(message)),
            },
            Err(e) => Err(e),
        }
    }

    fn transformer_failed(
        &self,
        key: CacheKey,
        error: DomainError,
        repaired: bool,
    ) -> Result<TransformResponse, DomainError> {
        if matches!(error, DomainError::Config { .. }) {
            return Err(error);
        }

        counter!("transform_cache_transformer_errors_total").increment(1);
        warn!(key = %key, error = %error, "Transformer failed");

        Ok(TransformResponse::new(
            key,
            TransformOutcome::TransformerFailed {
                message: error.to_string(),
            },
        )
        .with_corruption_repaired(repaired))
    }

    /// The miss path; runs at most once per key at a time
    async fn compute(&self, prepared: PreparedRequest) -> Result<TransformResponse, DomainError> {
        let PreparedRequest {
            key,
            material,
            request,
            adapter,
        } = prepared;

        // Another flight may have committed since the caller's lookup
        let repaired = match self.lookup(&key).await? {
            CacheLookup::Hit(entry) => {
                return Ok(TransformResponse::new(key, TransformOutcome::Hit { entry }));
            }
            CacheLookup::Corrupted(_) => true,
            CacheLookup::Miss => false,
        };

        let profile = self.profiler.extract(&request.content);
        let quality = request
            .params
            .quality_estimate
            .unwrap_or(self.settings.default_quality_estimate);
        let mut strategy =
            select_strategy(quality, count_tokens(&request.content)).with_weights(self.weights);
        let mut attempts: u8 = 0;

        loop {
            attempts += 1;
            debug!(key = %key, tier = %strategy.tier, attempt = attempts, "Transforming");

            let input = TransformInput {
                content: request.content.clone(),
                strategy: strategy.clone(),
                transformer_id: adapter.transformer_id().to_string(),
                transformer_version: adapter.transformer_version().to_string(),
                temperature: request.params.temperature,
                seed: request.params.seed,
            };

            let output = match adapter.transform(&input).await {
                Ok(output) => output,
                Err(e) => return self.transformer_failed(key, e, repaired),
            };

            let validation = self
                .validator
                .validate(&profile, &output.text, &strategy)
                .await;

            if !validation.passed {
                counter!("transform_cache_validation_failures_total").increment(1);
                info!(
                    key = %key,
                    tier = %strategy.tier,
                    weighted_total = validation.weighted_total,
                    threshold = validation.threshold,
                    "Validation failed"
                );

                if attempts == 1 {
                    if let Some(next) = strategy.downgrade() {
                        info!(
                            key = %key,
                            from = %strategy.tier,
                            to = %next.tier,
                            "Retrying with a more conservative strategy"
                        );
                        strategy = next;
                        continue;
                    }
                }

                return Ok(TransformResponse::new(
                    key,
                    TransformOutcome::ValidationFailed {
                        output: output.text,
                        validation,
                        tier: strategy.tier,
                        attempts,
                    },
                )
                .with_corruption_repaired(repaired));
            }

            let idempotency = match self
                .verifier
                .verify(adapter.as_ref(), &input, &output.text)
                .await
            {
                Ok(result) => result,
                Err(e) => return self.transformer_failed(key, e, repaired),
            };

            if !idempotency.passed {
                counter!("transform_cache_idempotency_violations_total").increment(1);
                warn!(
                    key = %key,
                    similarity = idempotency.similarity,
                    token_drift = idempotency.token_drift,
                    "Output did not converge, flagged for review"
                );

                return Ok(TransformResponse::new(
                    key,
                    TransformOutcome::IdempotencyViolation {
                        output: output.text,
                        validation,
                        idempotency,
                        tier: strategy.tier,
                        flagged_for_review: true,
                    },
                )
                .with_corruption_repaired(repaired));
            }

            let entry = CacheEntry::new(
                material.clone(),
                output.text,
                validation,
                idempotency,
                self.settings.schema_version,
            );
            let entry = self.commit(&key, entry).await?;

            return Ok(TransformResponse::new(
                key,
                TransformOutcome::Committed {
                    entry,
                    tier: strategy.tier,
                    downgraded: attempts > 1,
                },
            )
            .with_corruption_repaired(repaired));
        }
    }
}

/// Verified transformation cache
pub struct TransformCacheService {
    pipeline: Arc<Pipeline>,
    transformers: HashMap<String, Arc<TransformerAdapter>>,
    flights: SingleFlight<CacheKey, Result<TransformResponse, DomainError>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for TransformCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCacheService")
            .field("transformers", &self.transformers.keys().collect::<Vec<_>>())
            .field("settings", &self.pipeline.settings)
            .finish()
    }
}

impl TransformCacheService {
    /// Service over `store` with no transformers registered yet
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                store,
                profiler: SemanticProfiler::new(),
                validator: Validator::default(),
                verifier: IdempotencyVerifier::default(),
                weights: PreservationWeights::default(),
                settings: ServiceSettings::default(),
            }),
            transformers: HashMap::new(),
            flights: SingleFlight::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn pipeline_mut(&mut self) -> &mut Pipeline {
        Arc::make_mut(&mut self.pipeline)
    }

    /// Registers another transformer, addressed by its id
    pub fn with_transformer(mut self, transformer: TransformerAdapter) -> Self {
        self.transformers.insert(
            transformer.transformer_id().to_string(),
            Arc::new(transformer),
        );
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.pipeline_mut().validator = validator;
        self
    }

    pub fn with_verifier(mut self, verifier: IdempotencyVerifier) -> Self {
        self.pipeline_mut().verifier = verifier;
        self
    }

    pub fn with_weights(mut self, weights: PreservationWeights) -> Self {
        self.pipeline_mut().weights = weights;
        self
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.pipeline_mut().settings = settings;
        self
    }

    /// Resolves the transformer and derives the cache key
    fn prepare(&self, request: TransformationRequest) -> Result<PreparedRequest, DomainError> {
        let adapter = self
            .transformers
            .get(&request.transformer_id)
            .cloned()
            .ok_or_else(|| {
                DomainError::config(format!("Unknown transformer '{}'", request.transformer_id))
            })?;

        let (key, material) = compute_key(
            &request.content,
            adapter.transformer_id(),
            adapter.transformer_version(),
            &request.params,
        )?;

        Ok(PreparedRequest {
            key,
            material,
            request,
            adapter,
        })
    }

    async fn run(&self, prepared: PreparedRequest) -> Result<TransformResponse, DomainError> {
        let key = prepared.key.clone();

        let repaired = match self.pipeline.lookup(&key).await? {
            CacheLookup::Hit(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                counter!("transform_cache_hits_total").increment(1);
                debug!(key = %key, "Cache hit");
                return Ok(TransformResponse::new(key, TransformOutcome::Hit { entry }));
            }
            CacheLookup::Corrupted(_) => true,
            CacheLookup::Miss => false,
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("transform_cache_misses_total").increment(1);

        let pipeline = self.pipeline.clone();
        let flight = self.flights.join(key.clone(), move || async move {
            pipeline.compute(prepared).await
        })?;

        if !flight.is_leader() {
            debug!(key = %key, "Joined in-flight computation");
        }

        let response = flight.wait().await??;
        let repaired = repaired || response.corruption_repaired;

        Ok(response.with_corruption_repaired(repaired))
    }

    /// Serves a request from the cache or computes, verifies and commits it
    ///
    /// Gate failures come back as outcomes; only configuration and store
    /// errors are returned as `Err`.
    pub async fn process(
        &self,
        request: TransformationRequest,
    ) -> Result<TransformResponse, DomainError> {
        let prepared = self.prepare(request)?;
        self.run(prepared).await
    }

    /// Like [`process`](Self::process), returning `Cancelled` as soon as the
    /// token fires. The shared computation keeps running for other callers.
    pub async fn process_cancellable(
        &self,
        request: TransformationRequest,
        token: &CancellationToken,
    ) -> Result<TransformResponse, DomainError> {
        let prepared = self.prepare(request)?;
        let key = prepared.key.clone();

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!(key = %key, "Request cancelled by caller");
                Ok(TransformResponse::new(key, TransformOutcome::Cancelled))
            }
            result = self.run(prepared) => result,
        }
    }

    /// Processes requests on a bounded worker pool; results arrive in completion order
    pub async fn process_many(
        &self,
        requests: Vec<TransformationRequest>,
    ) -> Vec<(Uuid, Result<TransformResponse, DomainError>)> {
        let workers = self.pipeline.settings.workers.max(1);

        stream::iter(requests)
            .map(|request| async move {
                let id = request.id;
                (id, self.process(request).await)
            })
            .buffer_unordered(workers)
            .collect()
            .await
    }

    pub async fn invalidate(&self, key: &CacheKey) -> Result<bool, DomainError> {
        let removed = self
            .pipeline
            .with_store_timeout("invalidate", self.pipeline.store.invalidate(key))
            .await?;

        info!(key = %key, removed, "Cache entry invalidated");
        Ok(removed)
    }

    pub async fn invalidate_all_before(&self, schema_version: u32) -> Result<usize, DomainError> {
        let removed = self
            .pipeline
            .with_store_timeout(
                "invalidate_all",
                self.pipeline.store.invalidate_before_schema(schema_version),
            )
            .await?;

        info!(schema_version, removed, "Cache entries invalidated");
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<CacheStats, DomainError> {
        let store = &self.pipeline.store;
        let metadata = self
            .pipeline
            .with_store_timeout("metadata", store.metadata())
            .await?;
        let entries = self
            .pipeline
            .with_store_timeout("entries", store.entries())
            .await?;

        let hits = metadata.hits + self.hits.load(Ordering::Relaxed);
        let misses = metadata.misses + self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        let mean = |values: Vec<f64>| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };

        Ok(CacheStats {
            entries: entries.len(),
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            mean_weighted_total: mean(
                entries.iter().map(|e| e.validation.weighted_total).collect(),
            ),
            mean_idempotency_similarity: mean(
                entries.iter().map(|e| e.idempotency.similarity).collect(),
            ),
            schema_version: metadata.schema_version,
        })
    }

    /// Flushes usage counters and closes the store
    pub async fn close(&self) -> Result<(), DomainError> {
        let hits = self.hits.swap(0, Ordering::Relaxed);
        let misses = self.misses.swap(0, Ordering::Relaxed);

        let store = &self.pipeline.store;
        self.pipeline
            .with_store_timeout("record_usage", store.record_usage(hits, misses))
            .await?;
        self.pipeline
            .with_store_timeout("close", store.close())
            .await
    }
}
