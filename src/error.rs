use std::time::Duration;
use thiserror::Error;

/// Error categorization for the ingestion pipeline
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (fatal to the run)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing credential: {0} (set it in your environment or .env file)")]
    MissingCredential(String),

    // I/O errors (potentially transient)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors (usually permanent)
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Network errors (transient - should retry)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network timeout after {timeout:?}: {message}")]
    NetworkTimeout { timeout: Duration, message: String },

    #[error("Rate limit exceeded: retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    // Provider HTTP status errors
    #[error("Provider error: {code} - {message}")]
    Provider { code: u16, message: String },

    #[error("Service temporarily unavailable: {service} - {reason}")]
    ServiceUnavailable { service: String, reason: String },

    // Client errors (permanent - don't retry)
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    // Parse errors
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    // Catalog store errors
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Error categorization for retry strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Permanent errors - should not retry
    Permanent,
    /// Transient errors - safe to retry
    Transient,
    /// Rate limited - retry with backoff
    RateLimited,
}

impl Error {
    /// Categorize error for retry logic
    pub fn category(&self) -> ErrorCategory {
        match self {
            // Permanent errors - don't retry
            Error::Config(_)
            | Error::MissingCredential(_)
            | Error::InvalidInput { .. }
            | Error::AuthenticationFailed(_)
            | Error::Parse { .. }
            | Error::Storage(_)
            | Error::Serde(_) => ErrorCategory::Permanent,

            // Rate limited - retry with backoff
            Error::RateLimitExceeded { .. } => ErrorCategory::RateLimited,

            // Transient errors - retry with exponential backoff
            Error::Http(_)
            | Error::NetworkTimeout { .. }
            | Error::ServiceUnavailable { .. }
            | Error::Io(_) => ErrorCategory::Transient,

            // Status-code errors depend on the code
            Error::Provider { code, .. } => match *code {
                // Rate limiting (handle first to avoid unreachable pattern)
                429 => ErrorCategory::RateLimited,
                // 4xx client errors are permanent
                400..=499 => ErrorCategory::Permanent,
                // Everything else treated as transient
                _ => ErrorCategory::Transient,
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::RateLimited
        )
    }

    /// Get suggested retry delay for rate limited errors
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_permanent() {
        let err = Error::InvalidInput {
            field: "doi".to_string(),
            reason: "must start with 10.".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(!err.is_retryable());
    }

    #[test]
    fn provider_status_categories() {
        let unauthorized = Error::Provider {
            code: 401,
            message: "bad key".to_string(),
        };
        assert_eq!(unauthorized.category(), ErrorCategory::Permanent);

        let throttled = Error::Provider {
            code: 429,
            message: "slow down".to_string(),
        };
        assert_eq!(throttled.category(), ErrorCategory::RateLimited);
        assert!(throttled.is_retryable());

        let upstream = Error::Provider {
            code: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(upstream.category(), ErrorCategory::Transient);
    }

    #[test]
    fn timeout_is_transient() {
        let err = Error::NetworkTimeout {
            timeout: Duration::from_secs(30),
            message: "request timed out".to_string(),
        };
        assert!(err.is_retryable());
    }
}
