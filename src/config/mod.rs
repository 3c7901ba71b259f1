//! Configuration loaded from files and `TCACHE__*` environment variables

mod app_config;

pub use app_config::{
    AppConfig, CacheBackend, CacheConfig, LogFormat, LoggingConfig, OrchestratorConfig,
    SimilarityConfig, SimilarityKind, TransformerConfig, TransformerKind, ValidationConfig,
};
