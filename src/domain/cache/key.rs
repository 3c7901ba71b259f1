//! Deterministic cache identity
//!
//! A cache key is the SHA-256 digest of the content hash, the transformer
//! identity and the canonicalized parameters. Content is hashed on its own so
//! metadata-only changes never require re-hashing large payloads.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::domain::text::sha256_hex;
use crate::domain::DomainError;

/// Decimal places floats are rounded to before hashing
pub const FLOAT_PRECISION: i32 = 6;

/// Upper bound accepted for sampling temperature
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Hex-encoded SHA-256 digest identifying one cached transformation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Parses a hex key, rejecting anything that is not a 64-char lowercase digest
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();

        let well_formed = value.len() == 64
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));

        if !well_formed {
            return Err(DomainError::config(format!(
                "Invalid cache key '{}': expected 64 lowercase hex characters",
                value
            )));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-supplied transformation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    /// Sampling temperature passed to the transformer
    pub temperature: f64,
    /// Fixed seed passed to the transformer
    pub seed: u64,
    /// Caller's quality estimate (0-10) used for strategy selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_estimate: Option<f64>,
    /// Free-form transformer options
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            seed: 42,
            quality_estimate: None,
            options: BTreeMap::new(),
        }
    }
}

impl TransformParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_quality_estimate(mut self, quality: f64) -> Self {
        self.quality_estimate = Some(quality);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Checks the parameters and renders the canonical, hash-stable JSON form
    ///
    /// Object keys are sorted, floats rounded to [`FLOAT_PRECISION`] decimals.
    /// Temperature and seed are excluded: they are separate key components.
    pub fn canonicalize(&self) -> Result<String, DomainError> {
        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(DomainError::config(format!(
                "Invalid temperature {}: must be between 0 and {}",
                self.temperature, MAX_TEMPERATURE
            )));
        }

        let mut root = Map::new();

        if let Some(quality) = self.quality_estimate {
            if !quality.is_finite() {
                return Err(DomainError::config("Quality estimate must be a finite number"));
            }
            root.insert("quality_estimate".to_string(), rounded_number(quality)?);
        }

        let mut options = Map::new();
        for (key, value) in &self.options {
            if key.trim().is_empty() {
                return Err(DomainError::config("Option keys cannot be empty"));
            }
            options.insert(key.clone(), canonical_value(value)?);
        }
        root.insert("options".to_string(), Value::Object(options));

        serde_json::to_string(&sort_value(Value::Object(root)))
            .map_err(|e| DomainError::config(format!("Failed to canonicalize params: {}", e)))
    }
}

/// Everything a key is derived from, embedded in each stored entry so the
/// key can be re-derived when the entry is read back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub content_hash: String,
    pub transformer_id: String,
    pub transformer_version: String,
    pub canonical_params: String,
    pub temperature: f64,
    pub seed: u64,
}

impl KeyMaterial {
    /// Re-derives the digest from the embedded components
    pub fn digest(&self) -> CacheKey {
        let temperature = format!("{:.*}", FLOAT_PRECISION as usize, self.temperature);
        let seed = self.seed.to_string();

        let mut hasher = Sha256::new();

        for part in [
            self.content_hash.as_str(),
            self.transformer_id.as_str(),
            self.transformer_version.as_str(),
            self.canonical_params.as_str(),
            temperature.as_str(),
            seed.as_str(),
        ] {
            // Length prefix keeps ("ab", "c") distinct from ("a", "bc")
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }

        CacheKey(hex::encode(hasher.finalize()))
    }
}

/// Computes the cache identity for a transformation
pub fn compute_key(
    content: &str,
    transformer_id: &str,
    transformer_version: &str,
    params: &TransformParams,
) -> Result<(CacheKey, KeyMaterial), DomainError> {
    if transformer_id.trim().is_empty() {
        return Err(DomainError::config("Transformer ID cannot be empty"));
    }

    if transformer_version.trim().is_empty() {
        return Err(DomainError::config("Transformer version cannot be empty"));
    }

    let material = KeyMaterial {
        content_hash: sha256_hex(content),
        transformer_id: transformer_id.to_string(),
        transformer_version: transformer_version.to_string(),
        canonical_params: params.canonicalize()?,
        temperature: params.temperature,
        seed: params.seed,
    };

    Ok((material.digest(), material))
}

fn rounded_number(value: f64) -> Result<Value, DomainError> {
    let factor = 10f64.powi(FLOAT_PRECISION);
    let mut rounded = (value * factor).round() / factor;

    // -0.0 and 0.0 must hash identically
    if rounded == 0.0 {
        rounded = 0.0;
    }

    Number::from_f64(rounded)
        .map(Value::Number)
        .ok_or_else(|| DomainError::config(format!("Non-finite number {} in params", value)))
}

fn canonical_value(value: &Value) -> Result<Value, DomainError> {
    match value {
        Value::Number(n) if n.is_f64() => {
            let f = n
                .as_f64()
                .ok_or_else(|| DomainError::config("Unrepresentable number in params"))?;
            rounded_number(f)
        }
        Value::Array(items) => items
            .iter()
            .map(canonical_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, inner) in map {
                if key.trim().is_empty() {
                    return Err(DomainError::config("Option keys cannot be empty"));
                }
                out.insert(key.clone(), canonical_value(inner)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, sort_value(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}
