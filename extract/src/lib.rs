//! Code extraction for LLM responses.
//!
//! This crate locates the intended code artifact inside arbitrarily formatted
//! provider output. Strategies run in a fixed priority order and each reports a
//! confidence score; the engine never fails outright and instead falls back to
//! the whole response with a low score.

pub mod extraction;

pub use extraction::{
    build_fix_feedback, clean_code, detect_kind, extract, validate_code, CodeKind,
    ExtractionMethod, ExtractionResult, ValidationIssue,
};

/// Common imports for callers of the extraction engine.
pub mod prelude {
    pub use crate::extraction::confidence;
    pub use crate::extraction::{
        clean_code, detect_kind, extract, validate_code, CodeKind, ExtractionMethod,
        ExtractionResult, ValidationIssue,
    };
}
