//! Error types for StatRoute Core

use crate::provider::Provider;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Rate limit exceeded for {provider}{}", retry_after_secs.map(|s| format!(": retry after {}s", s)).unwrap_or_default())]
    RateLimited {
        provider: Provider,
        retry_after_secs: Option<u64>,
    },

    #[error("Circuit breaker open for provider {0}")]
    CircuitOpen(Provider),

    #[error("All providers failed (attempted: {})", format_providers(attempted))]
    AllProvidersFailed { attempted: Vec<Provider> },

    #[error("All {} batch branches failed", failures.len())]
    BatchFailed { failures: Vec<(String, String)> },

    #[error("Internal error: {0}")]
    Internal(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration not found")]
    ConfigNotFound,

    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_providers(providers: &[Provider]) -> String {
    if providers.is_empty() {
        return "none".to_string();
    }
    providers
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_message_with_retry_after() {
        let err = Error::RateLimited {
            provider: Provider::Comtrade,
            retry_after_secs: Some(30),
        };
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded for COMTRADE: retry after 30s"
        );
    }

    #[test]
    fn test_rate_limited_message_without_retry_after() {
        let err = Error::RateLimited {
            provider: Provider::Fred,
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "Rate limit exceeded for FRED");
    }

    #[test]
    fn test_all_providers_failed_lists_attempts() {
        let err = Error::AllProvidersFailed {
            attempted: vec![Provider::Imf, Provider::WorldBank],
        };
        assert_eq!(
            err.to_string(),
            "All providers failed (attempted: IMF, WORLDBANK)"
        );

        let err = Error::AllProvidersFailed { attempted: vec![] };
        assert!(err.to_string().contains("none"));
    }
}
