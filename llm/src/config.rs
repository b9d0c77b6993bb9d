//! Caller-supplied configuration for retries, continuation and streaming.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;

/// Continuation behaviour for truncated responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContinuationConfig {
    /// Whether truncated responses are continued at all (default: true).
    pub enabled: bool,
    /// Maximum number of follow-up rounds (default: 3).
    pub max_continuations: usize,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_continuations: 3,
        }
    }
}

impl ContinuationConfig {
    /// Configuration that never continues.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            max_continuations: 0,
        }
    }

    /// Set the maximum number of follow-up rounds.
    #[must_use]
    pub const fn with_max_continuations(mut self, max: usize) -> Self {
        self.max_continuations = max;
        self
    }

    /// Set whether continuation is enabled.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Retry behaviour for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    /// Retries after the first failure (default: 5).
    pub max_retries: usize,
    /// Base of the linear backoff in milliseconds (default: 1000).
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// Set the number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max: usize) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the linear backoff base. Saturates at `u64::MAX` milliseconds.
    #[must_use]
    pub fn with_base_delay(mut self, base: Duration) -> Self {
        self.base_delay_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Linear backoff for the zero-based `retry_index`: `base * (retry_index + 1)`.
    #[must_use]
    pub fn fallback_delay(&self, retry_index: usize) -> Duration {
        let factor = u64::try_from(retry_index + 1).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Full pipeline configuration.
///
/// Has no file format of its own; the binary deserializes it from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Continuation settings.
    pub continuation: ContinuationConfig,
    /// Retry settings.
    pub retry: RetryConfig,
    /// Bounded channel size for streamed chunks (default: 100).
    pub channel_capacity: usize,
    /// Attempts a task gets before giving up; only used to number fix feedback (default: 3).
    pub max_attempts: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            continuation: ContinuationConfig::default(),
            retry: RetryConfig::default(),
            channel_capacity: 100,
            max_attempts: 3,
        }
    }
}

impl PipelineConfig {
    /// Create a new `PipelineConfig` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the continuation settings.
    #[must_use]
    pub const fn with_continuation(mut self, continuation: ContinuationConfig) -> Self {
        self.continuation = continuation;
        self
    }

    /// Set the retry settings.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the streamed chunk channel size.
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Checks values that would make the pipeline unusable.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidConfig`] for a zero channel capacity or
    /// a zero attempt budget.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.channel_capacity == 0 {
            return Err(ProviderError::InvalidConfig(
                "channelCapacity must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ProviderError::InvalidConfig(
                "maxAttempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.continuation.enabled);
        assert_eq!(config.continuation.max_continuations, 3);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.channel_capacity, 100);
    }

    #[test]
    fn test_linear_fallback_delay() {
        let retry = RetryConfig::default().with_base_delay(Duration::from_millis(250));
        assert_eq!(retry.fallback_delay(0), Duration::from_millis(250));
        assert_eq!(retry.fallback_delay(3), Duration::from_millis(1000));
    }

    #[test]
    fn test_base_delay_saturates() {
        let retry = RetryConfig::default().with_base_delay(Duration::MAX);
        assert_eq!(retry.base_delay_ms, u64::MAX);
        assert_eq!(retry.fallback_delay(2), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        assert!(PipelineConfig::default().validate().is_ok());

        let err = PipelineConfig::default()
            .with_channel_capacity(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(ref m) if m.contains("channelCapacity")));

        let config: PipelineConfig = serde_json::from_str(r#"{"maxAttempts": 0}"#).unwrap();
        assert!(matches!(config.validate(), Err(ProviderError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"continuation": {"maxContinuations": 1}}"#).unwrap();
        assert!(config.continuation.enabled);
        assert_eq!(config.continuation.max_continuations, 1);
        assert_eq!(config.retry.max_retries, 5);
    }
}
