//! Confidence bands reported by the extraction strategies.
//!
//! Downstream consumers branch on these exact values, so they are part of the
//! public contract rather than tuning knobs.

/// A strategy result is accepted only when its confidence exceeds this value.
pub const ACCEPT_THRESHOLD: f64 = 0.5;

/// Paired `BEGIN-CODE` / `END-CODE` (or `BEGIN-DIFF` / `END-DIFF`) markers.
pub const DELIMITER: f64 = 0.95;

/// Fenced block tagged with a language hint for the expected kind.
pub const TAGGED_FENCE: f64 = 0.9;

/// Untagged fenced block whose contents look like the expected kind.
pub const UNTAGGED_FENCE_MATCH: f64 = 0.8;

/// Untagged fenced block whose contents look like something else.
pub const UNTAGGED_FENCE_MISMATCH: f64 = 0.6;

/// Anchored keyword or diff-line pattern match.
pub const PATTERN: f64 = 0.7;

/// Whole response used as-is, detected kind matches expectation.
pub const FALLBACK_MATCH: f64 = 0.3;

/// Whole response used as-is, detected kind does not match.
pub const FALLBACK_MISMATCH: f64 = 0.1;
