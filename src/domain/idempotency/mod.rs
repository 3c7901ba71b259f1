//! Idempotency domain - convergence check by re-application

mod verifier;

pub use verifier::{IdempotencyConfig, IdempotencyResult, IdempotencyVerifier};
