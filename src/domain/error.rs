use thiserror::Error;

/// Core domain errors
///
/// Every field is an owned string so the error can be cloned and handed to
/// every caller waiting on a shared computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Transformer error: {transformer} - {message}")]
    Transformer { transformer: String, message: String },

    /// The transformer refused the request itself; repeating it cannot help
    #[error("Transformer rejected request: {transformer} - {message}")]
    Rejected { transformer: String, message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Cache corruption for key {key}: {message}")]
    Corruption { key: String, message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Timeout: {operation} exceeded {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn transformer(transformer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transformer {
            transformer: transformer.into(),
            message: message.into(),
        }
    }

    pub fn rejected(transformer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            transformer: transformer.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn corruption(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corruption {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a failed transformer call may be attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transformer { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let error = DomainError::config("temperature must be finite");
        assert_eq!(
            error.to_string(),
            "Configuration error: temperature must be finite"
        );
    }

    #[test]
    fn test_transformer_error() {
        let error = DomainError::transformer("openai", "HTTP 502");
        assert_eq!(error.to_string(), "Transformer error: openai - HTTP 502");
    }

    #[test]
    fn test_timeout_error() {
        let error = DomainError::timeout("transform", 120);
        assert_eq!(error.to_string(), "Timeout: transform exceeded 120s");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DomainError::transformer("t", "boom").is_retryable());
        assert!(DomainError::timeout("transform", 1).is_retryable());
        assert!(!DomainError::config("bad").is_retryable());
        assert!(!DomainError::storage("disk").is_retryable());
        assert!(!DomainError::rejected("t", "HTTP 400").is_retryable());
    }
}
