//! Infrastructure layer - External service implementations

pub mod cache;
pub mod http_client;
pub mod logging;
pub mod services;
pub mod similarity;
pub mod transformer;
