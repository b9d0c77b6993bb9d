//! Retry-wrapped provider calls.

use std::future::Future;

use crate::classify::ErrorClassifier;
use crate::config::RetryConfig;
use crate::errors::{AdapterError, ProviderError};

/// Identifies the call chain a retried call belongs to; attached to the
/// terminal error and to every log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryScope {
    /// Adapter name.
    pub provider: String,
    /// Task identifier.
    pub task_id: String,
    /// Task attempt number.
    pub attempt_number: usize,
}

impl RetryScope {
    /// Creates a scope.
    #[must_use]
    pub fn new(provider: impl Into<String>, task_id: impl Into<String>, attempt_number: usize) -> Self {
        Self {
            provider: provider.into(),
            task_id: task_id.into(),
            attempt_number,
        }
    }

    fn terminal(&self, retries: usize, source: AdapterError) -> ProviderError {
        ProviderError::Terminal {
            provider: self.provider.clone(),
            task_id: self.task_id.clone(),
            attempt_number: self.attempt_number,
            retries,
            source,
        }
    }
}

/// Invokes `call` until it succeeds, the error is not retryable, or
/// `config.max_retries` retries have been spent.
///
/// Between retries it sleeps for the classifier's
/// [`retry_delay`](ErrorClassifier::retry_delay), given the linear fallback
/// `base_delay * (retry_index + 1)`.
///
/// # Errors
///
/// Returns [`ProviderError::Terminal`] carrying the last error together with
/// the provider, task and attempt of `scope`.
pub async fn call_with_retry<F, Fut, T>(
    mut call: F,
    classifier: &dyn ErrorClassifier,
    scope: &RetryScope,
    config: &RetryConfig,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut retry_index = 0;

    loop {
        let error = match call().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let retryable = classifier.is_retryable(&error);
        if !retryable || retry_index >= config.max_retries {
            tracing::error!(
                event = "provider_call_failed",
                provider = %scope.provider,
                task_id = %scope.task_id,
                attempt = scope.attempt_number,
                retries = retry_index,
                retryable,
                error = %error,
                "provider_call_failed"
            );
            return Err(scope.terminal(retry_index, error));
        }

        let delay = classifier.retry_delay(&error, config.fallback_delay(retry_index));
        tracing::warn!(
            event = "provider_retry",
            provider = %scope.provider,
            task_id = %scope.task_id,
            attempt = scope.attempt_number,
            retry = retry_index + 1,
            max_retries = config.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "provider_retry"
        );

        tokio::time::sleep(delay).await;
        retry_index += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::classify::DefaultClassifier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn scope() -> RetryScope {
        RetryScope::new("scripted", "CG-AL-E001", 1)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let value = call_with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AdapterError::Network("reset".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            &DefaultClassifier::default(),
            &scope(),
            &RetryConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1000ms + 2000ms of linear backoff
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_not_retried() {
        let calls = AtomicUsize::new(0);

        let err = call_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(AdapterError::Authentication("bad key".into())) }
            },
            &DefaultClassifier::default(),
            &scope(),
            &RetryConfig::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            ProviderError::Terminal {
                provider,
                task_id,
                attempt_number,
                retries,
                source,
            } => {
                assert_eq!(provider, "scripted");
                assert_eq!(task_id, "CG-AL-E001");
                assert_eq!(attempt_number, 1);
                assert_eq!(retries, 0);
                assert!(matches!(source, AdapterError::Authentication(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_wrap_last_error() {
        let calls = AtomicUsize::new(0);
        let config = RetryConfig::default().with_max_retries(2);

        let err = call_with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err::<(), _>(AdapterError::Http {
                        status: 503,
                        message: format!("overloaded #{n}"),
                    })
                }
            },
            &DefaultClassifier::default(),
            &scope(),
            &config,
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let ProviderError::Terminal { retries, source, .. } = err else {
            panic!("expected terminal error");
        };
        assert_eq!(retries, 2);
        assert_eq!(source.to_string(), "HTTP 503: overloaded #2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_delay_overrides_backoff() {
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        call_with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(AdapterError::RateLimited {
                            message: "slow down".into(),
                            retry_after: Some(Duration::from_secs(30)),
                        })
                    } else {
                        Ok(())
                    }
                }
            },
            &DefaultClassifier::default(),
            &scope(),
            &RetryConfig::default(),
        )
        .await
        .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
