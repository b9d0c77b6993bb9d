//! Post-extraction cleanup of code text.

use super::kind::CodeKind;
use super::patterns::{
    EXPLANATORY_LINE, FENCE_ARTIFACT_LINE, LEADING_DELIMITER, LEADING_FENCE, TRAILING_DELIMITER,
    TRAILING_FENCE,
};

/// Headers prepended to a diff that arrives without any.
const SYNTHETIC_DIFF_HEADER: &str = "--- a/code.al\n+++ b/code.al\n";

/// Strips formatting noise from extracted code.
///
/// Normalizes line endings, removes leading/trailing fences and custom
/// delimiters, drops a leading explanatory sentence and any line that is only
/// a fence marker. Diffs that do not start with a header get minimal
/// unified-diff headers.
///
/// # Examples
///
/// ```
/// use gauge_extract::{clean_code, CodeKind};
///
/// let cleaned = clean_code("Here is the code:\n```al\ntable 1 X {}\n```", CodeKind::Al);
/// assert_eq!(cleaned, "table 1 X {}");
/// ```
#[must_use]
pub fn clean_code(code: &str, kind: CodeKind) -> String {
    let mut text = code.replace("\r\n", "\n").replace('\r', "\n");

    text = strip_leading_explanation(&text);
    text = strip_wrappers(&text);

    let kept: Vec<&str> = text
        .lines()
        .filter(|line| !FENCE_ARTIFACT_LINE.is_match(line))
        .collect();
    let cleaned = kept.join("\n").trim().to_string();

    if kind == CodeKind::Diff && !cleaned.is_empty() && !has_diff_header(&cleaned) {
        return format!("{SYNTHETIC_DIFF_HEADER}{cleaned}");
    }

    cleaned
}

/// Removes fence and delimiter wrappers anchored at either end, repeatedly,
/// so a fence nested in delimiters is unwrapped too.
fn strip_wrappers(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = LEADING_FENCE.replace(&current, "");
        let next = TRAILING_FENCE.replace(&next, "");
        let next = LEADING_DELIMITER.replace(&next, "");
        let next = TRAILING_DELIMITER.replace(&next, "");
        let next = next.trim().to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_leading_explanation(text: &str) -> String {
    let trimmed = text.trim_start();
    match trimmed.split_once('\n') {
        Some((first, rest)) if EXPLANATORY_LINE.is_match(first) => rest.to_string(),
        _ => trimmed.to_string(),
    }
}

fn has_diff_header(text: &str) -> bool {
    text.starts_with("---") || text.starts_with("diff ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tagged_fence() {
        assert_eq!(
            clean_code("```al\ncodeunit 1 A {}\n```", CodeKind::Al),
            "codeunit 1 A {}"
        );
    }

    #[test]
    fn test_strips_delimiters_and_nested_fence() {
        let input = "BEGIN-CODE\n```al\ntable 1 X {}\n```\nEND-CODE";
        assert_eq!(clean_code(input, CodeKind::Al), "table 1 X {}");
    }

    #[test]
    fn test_normalizes_line_endings() {
        assert_eq!(
            clean_code("table 1 X\r\n{\r\n}\r\n", CodeKind::Al),
            "table 1 X\n{\n}"
        );
    }

    #[test]
    fn test_removes_stray_fence_lines() {
        let input = "codeunit 1 A\n{\n```\n}";
        assert_eq!(clean_code(input, CodeKind::Al), "codeunit 1 A\n{\n}");
    }

    #[test]
    fn test_keeps_code_that_is_not_prose() {
        let input = "codeunit 1 A {}\nprocedure X() begin end;";
        assert_eq!(clean_code(input, CodeKind::Al), input);
    }

    #[test]
    fn test_synthesizes_diff_headers() {
        let cleaned = clean_code("@@ -1 +1 @@\n-a\n+b", CodeKind::Diff);
        assert_eq!(cleaned, "--- a/code.al\n+++ b/code.al\n@@ -1 +1 @@\n-a\n+b");
    }

    #[test]
    fn test_existing_diff_headers_untouched() {
        let diff = "--- a/x.al\n+++ b/x.al\n@@ -1 +1 @@\n-a\n+b";
        assert_eq!(clean_code(diff, CodeKind::Diff), diff);

        let git = "diff --git a/x b/x\n--- a/x\n+++ b/x";
        assert_eq!(clean_code(git, CodeKind::Diff), git);
    }

    #[test]
    fn test_empty_stays_empty() {
        assert_eq!(clean_code("  \n ", CodeKind::Diff), "");
    }
}
