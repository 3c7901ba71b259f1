//! Check command - serves one document through the cache

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::cache::CacheKey;
use crate::domain::strategy::StrategyTier;
use crate::domain::{
    IdempotencyResult, TransformOutcome, TransformParams, TransformResponse,
    TransformationRequest, ValidationResult,
};

/// Arguments for the check command
#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Document to transform
    #[arg(long)]
    pub file: PathBuf,

    /// Quality estimate (0-10) driving strategy selection
    #[arg(long)]
    pub quality: Option<f64>,

    /// Extra transformer option as key=value; JSON values are parsed
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,

    /// Transformer id (defaults to the configured transformer)
    #[arg(long)]
    pub transformer: Option<String>,
}

/// Machine-readable summary of one check
#[derive(Debug, Serialize)]
pub struct CheckReport<'a> {
    pub key: &'a CacheKey,
    pub status: &'static str,
    /// `hit` when served from the cache, `miss` otherwise
    pub cache: &'static str,
    pub cached: bool,
    pub corruption_repaired: bool,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<StrategyTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downgraded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<&'a ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency: Option<&'a IdempotencyResult>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub flagged_for_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<&'a str>,
}

impl<'a> CheckReport<'a> {
    pub fn from_response(response: &'a TransformResponse) -> Self {
        let outcome = &response.outcome;

        let mut report = Self {
            key: &response.key,
            status: outcome.label(),
            cache: if matches!(outcome, TransformOutcome::Hit { .. }) {
                "hit"
            } else {
                "miss"
            },
            cached: outcome.is_cached(),
            corruption_repaired: response.corruption_repaired,
            exit_code: response.exit_code(),
            tier: None,
            downgraded: None,
            validation: None,
            idempotency: None,
            flagged_for_review: false,
            error: None,
            output: outcome.output(),
        };

        match outcome {
            TransformOutcome::Hit { entry } => {
                report.validation = Some(&entry.validation);
                report.idempotency = Some(&entry.idempotency);
            }
            TransformOutcome::Committed {
                entry,
                tier,
                downgraded,
            } => {
                report.tier = Some(*tier);
                report.downgraded = Some(*downgraded);
                report.validation = Some(&entry.validation);
                report.idempotency = Some(&entry.idempotency);
            }
            TransformOutcome::ValidationFailed {
                validation, tier, ..
            } => {
                report.tier = Some(*tier);
                report.validation = Some(validation);
            }
            TransformOutcome::IdempotencyViolation {
                validation,
                idempotency,
                tier,
                flagged_for_review,
                ..
            } => {
                report.tier = Some(*tier);
                report.validation = Some(validation);
                report.idempotency = Some(idempotency);
                report.flagged_for_review = *flagged_for_review;
            }
            TransformOutcome::TransformerFailed { message } => {
                report.error = Some(message.as_str());
            }
            TransformOutcome::Cancelled => {}
        }

        report
    }
}

/// Run the check command; returns the process exit code
pub async fn run(args: CheckArgs) -> anyhow::Result<i32> {
    let config = super::bootstrap()?;

    let content = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let service = crate::create_service(&config).await?;
    let request = build_request(&args, &config, content);
    info!(request_id = %request.id, file = %args.file.display(), "Checking document");

    let result = service.process(request).await;
    service.close().await?;
    let response = result?;

    super::print_json(&CheckReport::from_response(&response))?;

    Ok(response.exit_code())
}

/// Builds the request; the quality estimate is always explicit so keys stay stable
pub fn build_request(args: &CheckArgs, config: &AppConfig, content: String) -> TransformationRequest {
    let quality = args
        .quality
        .unwrap_or(config.orchestrator.default_quality_estimate);

    let params = args.params.iter().fold(
        TransformParams::new()
            .with_temperature(config.transformer.temperature)
            .with_seed(config.transformer.seed)
            .with_quality_estimate(quality),
        |params, (key, value)| params.with_option(key.clone(), value.clone()),
    );

    let transformer_id = args
        .transformer
        .clone()
        .unwrap_or_else(|| config.transformer.transformer_id());

    TransformationRequest::new(content, transformer_id).with_params(params)
}

/// Parses `key=value`; the value is JSON when it parses as JSON, a string otherwise
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid param '{}': expected key=value", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid param '{}': empty key", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    Ok((key.to_string(), value))
}
