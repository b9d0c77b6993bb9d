//! Extraction engine for LLM code responses.
//!
//! - [`extract`] - Ordered strategy cascade with confidence scores
//! - [`clean_code`] - Strips fences, delimiters and leading prose
//! - [`validate_code`] - Reports structural issues without failing
//! - [`detect_kind`] - Heuristic AL / diff classification
//! - [`build_fix_feedback`] - Fix-mode prompt section for a failed attempt

pub mod clean;
pub mod confidence;
pub mod engine;
pub mod feedback;
pub mod kind;
mod patterns;
pub mod validate;

pub use clean::clean_code;
pub use engine::{extract, ExtractionMethod, ExtractionResult};
pub use feedback::{build_continuation_feedback, build_fix_feedback};
pub use kind::{detect_kind, CodeKind};
pub use validate::{validate_code, ValidationIssue};
