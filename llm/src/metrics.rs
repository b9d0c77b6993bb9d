//! Token estimation for providers that do not report usage.

use crate::types::TokenUsage;

/// Estimate token count from text using the standard 4-chars-per-token heuristic.
///
/// Counts characters rather than bytes and rounds up.
///
/// # Examples
///
/// ```
/// use gauge_llm::metrics::estimate_tokens;
///
/// assert_eq!(estimate_tokens("hello"), 2);
/// assert_eq!(estimate_tokens("hello world"), 3);
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    u64::try_from(text.chars().count().div_ceil(4)).unwrap_or(u64::MAX)
}

/// Estimated usage for a prompt/completion pair.
#[must_use]
pub fn estimate_usage(prompt: &str, completion: &str) -> TokenUsage {
    TokenUsage::new(estimate_tokens(prompt), estimate_tokens(completion))
}
