//! Prompt sections fed back to the model on fix and continuation rounds.

use super::kind::CodeKind;

/// Build the fix-mode feedback for an attempt that failed to compile or pass tests.
///
/// Includes:
/// - Attempt counter (e.g., "Attempt 2/3")
/// - Every error reported for the previous attempt
/// - The previous code (so the model can compare)
/// - Instruction to return the full corrected artifact inside delimiters
///
/// # Examples
///
/// ```
/// use gauge_extract::{build_fix_feedback, CodeKind};
///
/// let errors = vec!["AL0118: The name 'Foo' does not exist".to_string()];
/// let feedback = build_fix_feedback("codeunit 1 A {}", &errors, 2, 3, CodeKind::Al);
/// assert!(feedback.contains("Attempt 2/3"));
/// assert!(feedback.contains("AL0118"));
/// ```
#[must_use]
pub fn build_fix_feedback(
    previous_code: &str,
    errors: &[String],
    attempt: usize,
    max_attempts: usize,
    kind: CodeKind,
) -> String {
    let mut feedback =
        format!("Attempt {attempt}/{max_attempts}: the previous code did not pass.\n\n");

    feedback.push_str("Errors:\n");
    if errors.is_empty() {
        feedback.push_str("  - (no error details were reported)\n");
    }
    for error in errors {
        feedback.push_str("  - ");
        feedback.push_str(error.trim());
        feedback.push('\n');
    }

    feedback.push_str("\nPrevious code:\n");
    feedback.push_str(previous_code.trim());

    let (open, close) = kind.delimiters();
    feedback.push_str(&format!(
        "\n\nFix all errors and return the complete corrected {kind} between {open} and {close}."
    ));

    feedback
}

/// Build the instruction appended to the original prompt on a continuation round.
///
/// `tail` is the end of the text generated so far; the model is asked to resume
/// right after it without repeating it.
#[must_use]
pub fn build_continuation_feedback(tail: &str) -> String {
    let mut feedback = String::from(
        "\n\nYour previous response was cut off because it reached the length limit. \
         Continue EXACTLY where it stopped. Do not repeat text that was already written, \
         do not restart the code, and do not add explanations.\n\n",
    );
    feedback.push_str("Your response so far ended with:\n");
    feedback.push_str(tail);
    feedback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_fix_feedback() {
        let errors = vec![
            "line 3: syntax error".to_string(),
            "  line 9: missing semicolon ".to_string(),
        ];
        let feedback = build_fix_feedback("codeunit 1 A {}", &errors, 2, 3, CodeKind::Al);

        assert!(feedback.contains("Attempt 2/3"));
        assert!(feedback.contains("  - line 3: syntax error\n"));
        assert!(feedback.contains("  - line 9: missing semicolon\n"));
        assert!(feedback.contains("Previous code:\ncodeunit 1 A {}"));
        assert!(feedback.contains("between BEGIN-CODE and END-CODE"));
    }

    #[test]
    fn test_fix_feedback_for_diff_uses_diff_delimiters() {
        let feedback = build_fix_feedback("@@", &[], 3, 3, CodeKind::Diff);
        assert!(feedback.contains("no error details"));
        assert!(feedback.contains("BEGIN-DIFF and END-DIFF"));
    }

    #[test]
    fn test_continuation_feedback_ends_with_tail() {
        let feedback = build_continuation_feedback("Message('Hi');");
        assert!(feedback.starts_with("\n\n"));
        assert!(feedback.contains("Continue EXACTLY"));
        assert!(feedback.ends_with("ended with:\nMessage('Hi');"));
    }
}
