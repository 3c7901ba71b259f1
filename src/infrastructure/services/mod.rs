//! Infrastructure services

mod singleflight;
mod transform_cache_service;

pub use singleflight::{Flight, SingleFlight};
pub use transform_cache_service::{CacheStats, ServiceSettings, TransformCacheService};
