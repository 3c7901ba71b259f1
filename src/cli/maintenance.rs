//! Maintenance commands - invalidation and statistics
//!
//! These only open the store, so they work without transformer credentials.

use clap::Args;
use serde::Serialize;

use crate::domain::cache::CacheKey;
use crate::domain::outcome::exit_code;
use crate::infrastructure::services::TransformCacheService;

/// Arguments for the invalidate command
#[derive(Args, Clone, Debug)]
pub struct InvalidateArgs {
    /// Hex-encoded cache key
    pub key: String,
}

/// Arguments for the invalidate-all command
#[derive(Args, Clone, Debug)]
pub struct InvalidateAllArgs {
    /// Remove entries whose schema version is below this one
    #[arg(long)]
    pub before_schema: u32,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct InvalidateReport {
    pub key: CacheKey,
    pub removed: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct InvalidateAllReport {
    pub before_schema: u32,
    pub removed: usize,
}

/// Run the invalidate command
pub async fn invalidate(args: InvalidateArgs) -> anyhow::Result<i32> {
    let config = super::bootstrap()?;
    let key = CacheKey::parse(args.key)?;

    let service = crate::create_maintenance_service(&config).await?;
    let report = invalidate_key(&service, key).await;
    service.close().await?;

    super::print_json(&report?)?;
    Ok(exit_code::SUCCESS)
}

/// Run the invalidate-all command
pub async fn invalidate_all(args: InvalidateAllArgs) -> anyhow::Result<i32> {
    let config = super::bootstrap()?;

    let service = crate::create_maintenance_service(&config).await?;
    let report = invalidate_before(&service, args.before_schema).await;
    service.close().await?;

    super::print_json(&report?)?;
    Ok(exit_code::SUCCESS)
}

/// Run the stats command
pub async fn stats() -> anyhow::Result<i32> {
    let config = super::bootstrap()?;

    let service = crate::create_maintenance_service(&config).await?;
    let stats = service.stats().await;
    service.close().await?;

    super::print_json(&stats?)?;
    Ok(exit_code::SUCCESS)
}

async fn invalidate_key(
    service: &TransformCacheService,
    key: CacheKey,
) -> anyhow::Result<InvalidateReport> {
    let removed = service.invalidate(&key).await?;
    Ok(InvalidateReport { key, removed })
}

async fn invalidate_before(
    service: &TransformCacheService,
    before_schema: u32,
) -> anyhow::Result<InvalidateAllReport> {
    let removed = service.invalidate_all_before(before_schema).await?;
    Ok(InvalidateAllReport {
        before_schema,
        removed,
    })
}
