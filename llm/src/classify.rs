//! Retry classification of provider errors.

use std::time::Duration;

use crate::errors::AdapterError;

/// Decides whether a failed call is retried, and how long to wait.
///
/// Provider-aware implementations can override [`retry_delay`](Self::retry_delay)
/// to honour server-specified delays such as a rate-limit `retry-after`.
pub trait ErrorClassifier: Send + Sync {
    /// Returns `true` when the error is transient.
    fn is_retryable(&self, error: &AdapterError) -> bool;

    /// Delay before the next retry; `fallback` is the linear backoff value.
    fn retry_delay(&self, _error: &AdapterError, fallback: Duration) -> Duration {
        fallback
    }
}

/// Classifier based on [`AdapterError::is_transient`] that honours rate-limit
/// `retry_after` hints, capped at `max_server_delay`.
#[derive(Debug, Clone)]
pub struct DefaultClassifier {
    /// Upper bound applied to server-specified delays.
    pub max_server_delay: Duration,
}

impl Default for DefaultClassifier {
    fn default() -> Self {
        Self {
            max_server_delay: Duration::from_secs(120),
        }
    }
}

impl ErrorClassifier for DefaultClassifier {
    fn is_retryable(&self, error: &AdapterError) -> bool {
        error.is_transient()
    }

    fn retry_delay(&self, error: &AdapterError, fallback: Duration) -> Duration {
        match error {
            AdapterError::RateLimited {
                retry_after: Some(delay),
                ..
            } => (*delay).min(self.max_server_delay),
            _ => fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classifier_uses_transient_flag() {
        let classifier = DefaultClassifier::default();
        assert!(classifier.is_retryable(&AdapterError::Timeout(Duration::from_secs(30))));
        assert!(!classifier.is_retryable(&AdapterError::Authentication("no key".into())));
    }

    #[test]
    fn test_retry_after_overrides_fallback() {
        let classifier = DefaultClassifier::default();
        let limited = AdapterError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(
            classifier.retry_delay(&limited, Duration::from_secs(1)),
            Duration::from_secs(7)
        );

        let network = AdapterError::Network("reset".into());
        assert_eq!(
            classifier.retry_delay(&network, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_server_delay_is_capped() {
        let classifier = DefaultClassifier {
            max_server_delay: Duration::from_secs(10),
        };
        let limited = AdapterError::RateLimited {
            message: String::new(),
            retry_after: Some(Duration::from_secs(600)),
        };
        assert_eq!(
            classifier.retry_delay(&limited, Duration::from_secs(1)),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_trait_default_delay_is_fallback() {
        struct AlwaysRetry;

        impl ErrorClassifier for AlwaysRetry {
            fn is_retryable(&self, _error: &AdapterError) -> bool {
                true
            }
        }

        let limited = AdapterError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(
            AlwaysRetry.retry_delay(&limited, Duration::from_millis(1500)),
            Duration::from_millis(1500)
        );
    }
}
