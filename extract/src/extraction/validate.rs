//! Structural checks on cleaned code. Issues are reported, never thrown.

use thiserror::Error;

use super::kind::CodeKind;
use super::patterns::{AL_BLOCK_START, AL_OBJECT_HEADER, EXPLANATORY_LINE};

/// A problem found by [`validate_code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    /// Nothing left after cleaning.
    #[error("code is empty")]
    Empty,

    /// No object header or procedure/trigger block was found.
    #[error("no AL object declaration or procedure block found")]
    MissingStructure,

    /// Natural-language explanation leaked into the artifact.
    #[error("explanatory text found at line {line}: {text}")]
    LeakedProse {
        /// 1-based line number.
        line: usize,
        /// The offending line, trimmed.
        text: String,
    },

    /// Markdown fence markers remain in the artifact.
    #[error("stray code fence marker found at line {line}")]
    StrayFence {
        /// 1-based line number.
        line: usize,
    },

    /// A diff without any added or removed line.
    #[error("diff contains no '+' or '-' change lines")]
    NoChangeLines,

    /// A diff without `---` / `+++` headers.
    #[error("diff is missing '---' / '+++' header lines")]
    MissingDiffHeaders,
}

/// Checks `code` for the expected structure and for formatting leftovers.
///
/// Returns every issue found; an empty list means the code looks usable.
///
/// # Examples
///
/// ```
/// use gauge_extract::{validate_code, CodeKind, ValidationIssue};
///
/// assert!(validate_code("codeunit 1 A { }", CodeKind::Al).is_empty());
/// assert_eq!(validate_code("", CodeKind::Al), vec![ValidationIssue::Empty]);
/// ```
#[must_use]
pub fn validate_code(code: &str, kind: CodeKind) -> Vec<ValidationIssue> {
    if code.trim().is_empty() {
        return vec![ValidationIssue::Empty];
    }

    let mut issues = Vec::new();

    match kind {
        CodeKind::Diff => check_diff(code, &mut issues),
        CodeKind::Al | CodeKind::Unknown => {
            let structured = code
                .lines()
                .any(|line| AL_OBJECT_HEADER.is_match(line) || AL_BLOCK_START.is_match(line));
            if !structured {
                issues.push(ValidationIssue::MissingStructure);
            }
        }
    }

    for (idx, line) in code.lines().enumerate() {
        if line.contains("```") {
            issues.push(ValidationIssue::StrayFence { line: idx + 1 });
        } else if EXPLANATORY_LINE.is_match(line) {
            issues.push(ValidationIssue::LeakedProse {
                line: idx + 1,
                text: line.trim().to_string(),
            });
        }
    }

    issues
}

fn check_diff(code: &str, issues: &mut Vec<ValidationIssue>) {
    let has_headers = code.lines().any(|l| l.starts_with("---"))
        && code.lines().any(|l| l.starts_with("+++"));
    if !has_headers {
        issues.push(ValidationIssue::MissingDiffHeaders);
    }

    let has_changes = code.lines().any(|l| {
        (l.starts_with('+') && !l.starts_with("+++")) || (l.starts_with('-') && !l.starts_with("---"))
    });
    if !has_changes {
        issues.push(ValidationIssue::NoChangeLines);
    }
}
