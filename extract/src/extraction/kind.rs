//! Output kinds and heuristic kind detection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::patterns::AL_KEYWORDS;

/// Minimum number of distinct AL keywords before text is classified as AL.
const MIN_DISTINCT_KEYWORDS: usize = 2;

/// Kind of artifact a task expects, or that detection recognised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeKind {
    /// AL source code (Business Central objects).
    #[default]
    Al,
    /// Unified diff against existing code.
    Diff,
    /// Nothing recognisable.
    Unknown,
}

impl CodeKind {
    /// Fence language tags that mark a block as this kind.
    #[must_use]
    pub const fn fence_hints(self) -> &'static [&'static str] {
        match self {
            Self::Al => &["al"],
            Self::Diff => &["diff", "patch"],
            Self::Unknown => &[],
        }
    }

    /// Opening and closing custom delimiter markers for this kind.
    #[must_use]
    pub const fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            Self::Diff => ("BEGIN-DIFF", "END-DIFF"),
            Self::Al | Self::Unknown => ("BEGIN-CODE", "END-CODE"),
        }
    }

    /// Lowercase tag used in logs and serialized output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Al => "al",
            Self::Diff => "diff",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "al" | "code" => Ok(Self::Al),
            "diff" | "patch" => Ok(Self::Diff),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown code kind '{other}' (expected 'al' or 'diff')")),
        }
    }
}

/// Classifies text as a diff, AL code, or unknown.
///
/// A diff needs both `---` and `+++` markers together with a hunk marker
/// (`@@`) or a diff-tool signature. Otherwise the text counts as AL when at
/// least two distinct AL keywords appear as whole words.
///
/// # Examples
///
/// ```
/// use gauge_extract::{detect_kind, CodeKind};
///
/// assert_eq!(detect_kind("codeunit 50100 Foo { procedure Bar() begin end; }"), CodeKind::Al);
/// assert_eq!(detect_kind("--- a/x.al\n+++ b/x.al\n@@ -1 +1 @@\n-a\n+b"), CodeKind::Diff);
/// assert_eq!(detect_kind("just some words"), CodeKind::Unknown);
/// ```
#[must_use]
pub fn detect_kind(text: &str) -> CodeKind {
    if looks_like_diff(text) {
        return CodeKind::Diff;
    }

    if distinct_keywords(text) >= MIN_DISTINCT_KEYWORDS {
        CodeKind::Al
    } else {
        CodeKind::Unknown
    }
}

fn looks_like_diff(text: &str) -> bool {
    let has_markers = text.contains("---") && text.contains("+++");
    let has_hunk_or_tool =
        text.contains("@@") || text.contains("diff --git") || text.contains("Index:");
    has_markers && has_hunk_or_tool
}

fn distinct_keywords(text: &str) -> usize {
    AL_KEYWORDS
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect::<BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_requires_hunk_or_signature() {
        assert_eq!(detect_kind("--- old\n+++ new\n"), CodeKind::Unknown);
        assert_eq!(detect_kind("--- old\n+++ new\n@@ -1 +1 @@"), CodeKind::Diff);
        assert_eq!(
            detect_kind("diff --git a/x b/x\n--- a/x\n+++ b/x\n"),
            CodeKind::Diff
        );
    }

    #[test]
    fn test_keywords_counted_once_each() {
        // "table" three times is still a single distinct keyword.
        assert_eq!(detect_kind("table table TABLE"), CodeKind::Unknown);
        assert_eq!(detect_kind("table 18 Customer { fields { } }"), CodeKind::Al);
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        assert_eq!(detect_kind("tablet pages endless"), CodeKind::Unknown);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("AL".parse::<CodeKind>(), Ok(CodeKind::Al));
        assert_eq!("patch".parse::<CodeKind>(), Ok(CodeKind::Diff));
        assert!("rust".parse::<CodeKind>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&CodeKind::Diff).unwrap();
        assert_eq!(json, "\"diff\"");
    }
}
