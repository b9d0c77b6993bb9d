use std::time::Duration;
use thiserror::Error;

/// Errors returned by a generation capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// Connection or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The provider did not answer in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limit hit; the provider may say when to retry.
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Provider-supplied message.
        message: String,
        /// Server-specified delay before retrying.
        retry_after: Option<Duration>,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Credentials missing or rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The request itself is invalid and will never succeed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The response stream broke mid-way.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Anything else.
    #[error("Provider error: {0}")]
    Other(String),
}

impl AdapterError {
    /// Returns `true` for failures that are worth retrying: network, timeout,
    /// rate limits, and HTTP 408/429/5xx.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. } | Self::Stream(_) => {
                true
            }
            Self::Http { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::Authentication(_) | Self::InvalidRequest(_) | Self::Other(_) => false,
        }
    }

    /// Classifies a free-form provider message into a typed error.
    ///
    /// Used by bridges whose underlying client only surfaces strings.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();

        if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
            Self::RateLimited {
                message,
                retry_after: None,
            }
        } else if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("api key")
        {
            Self::Authentication(message)
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout(Duration::ZERO)
        } else if let Some(status) = ["500", "502", "503", "504"]
            .iter()
            .find(|code| lower.contains(*code))
            .and_then(|code| code.parse().ok())
        {
            Self::Http { status, message }
        } else if lower.contains("connection") || lower.contains("network") || lower.contains("dns") {
            Self::Network(message)
        } else if lower.contains("400") || lower.contains("invalid") {
            Self::InvalidRequest(message)
        } else {
            Self::Other(message)
        }
    }
}

/// Errors returned by the pipeline to the task layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// A provider call failed for good: either not retryable or out of retries.
    #[error("{provider} call failed for task {task_id} (attempt {attempt_number}, {retries} retries): {source}")]
    Terminal {
        /// Adapter name.
        provider: String,
        /// Task the call belonged to.
        task_id: String,
        /// Task attempt number.
        attempt_number: usize,
        /// Retries performed before giving up.
        retries: usize,
        /// The last error observed.
        #[source]
        source: AdapterError,
    },

    /// The streaming driver went away before reporting a result.
    #[error("Continuation stream closed before completion")]
    StreamClosed,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProviderError {
    /// The underlying adapter error, when there is one.
    #[must_use]
    pub const fn adapter_error(&self) -> Option<&AdapterError> {
        match self {
            Self::Terminal { source, .. } => Some(source),
            Self::StreamClosed | Self::InvalidConfig(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AdapterError::Network("reset".into()).is_transient());
        assert!(AdapterError::Http { status: 503, message: String::new() }.is_transient());
        assert!(AdapterError::Http { status: 429, message: String::new() }.is_transient());
        assert!(!AdapterError::Http { status: 404, message: String::new() }.is_transient());
        assert!(!AdapterError::Authentication("bad key".into()).is_transient());
        assert!(!AdapterError::InvalidRequest("too long".into()).is_transient());
    }

    #[test]
    fn test_from_message() {
        assert!(matches!(
            AdapterError::from_message("HTTP 429 Too Many Requests"),
            AdapterError::RateLimited { .. }
        ));
        assert!(matches!(
            AdapterError::from_message("401 Unauthorized"),
            AdapterError::Authentication(_)
        ));
        assert!(matches!(
            AdapterError::from_message("upstream returned 503"),
            AdapterError::Http { status: 503, .. }
        ));
        assert!(matches!(
            AdapterError::from_message("connection reset by peer"),
            AdapterError::Network(_)
        ));
        assert!(matches!(
            AdapterError::from_message("something odd"),
            AdapterError::Other(_)
        ));
    }

    #[test]
    fn test_terminal_display_carries_context() {
        let err = ProviderError::Terminal {
            provider: "scripted".into(),
            task_id: "CG-AL-E001".into(),
            attempt_number: 2,
            retries: 5,
            source: AdapterError::Network("reset".into()),
        };
        let text = err.to_string();
        assert!(text.contains("scripted"));
        assert!(text.contains("CG-AL-E001"));
        assert!(text.contains("attempt 2"));
        assert!(text.contains("Network error: reset"));
    }
}
