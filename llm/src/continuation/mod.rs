//! Continuation of truncated responses.
//!
//! - [`blocking`] - Follow-up rounds for non-streaming calls
//! - [`streaming`] - One chunk stream spanning several provider streams
//! - [`merge`] - Overlap trimming between rounds

pub mod blocking;
pub mod merge;
pub mod streaming;

use gauge_extract::extraction::build_continuation_feedback;
use serde_json::Value;

use crate::types::{
    FinishReason, GenerationContext, Request, Response, CONTINUATION_ATTEMPT_KEY,
    PREVIOUS_CONTENT_LENGTH_KEY,
};
use merge::char_suffix;

pub use blocking::{continue_generation, generate_with_continuation};
pub use merge::{find_overlap, merge_code};
pub use streaming::{stream_with_continuation, ContinuationStream};

/// Trailing characters of accumulated output quoted back in a continuation prompt.
pub const CONTINUATION_TAIL_CHARS: usize = 500;

/// Returns `true` iff the provider stopped because it hit the token cap.
#[must_use]
pub fn was_truncated(response: &Response) -> bool {
    response.finish_reason == FinishReason::Length
}

/// Advisory text describing how continuation went, or `None` when there is
/// nothing to report.
#[must_use]
pub fn create_truncation_warning(continuation_count: usize, was_truncated: bool) -> Option<String> {
    match (was_truncated, continuation_count) {
        (false, 0) => None,
        (true, 0) => Some(
            "Response was truncated at the token limit and was not continued. \
             Consider increasing the token limit."
                .to_string(),
        ),
        (true, n) => Some(format!(
            "Response is still incomplete after {n} continuation attempts. \
             Consider increasing the token limit or the continuation budget."
        )),
        (false, n) => Some(format!("Response required {n} continuations to complete.")),
    }
}

/// Request for continuation round `round`: the original prompt, the
/// instruction to resume, and the tail of what was produced so far.
pub(crate) fn continuation_request(request: &Request, accumulated: &str) -> Request {
    let tail = char_suffix(accumulated, CONTINUATION_TAIL_CHARS);
    request.with_prompt(format!(
        "{}{}",
        request.prompt,
        build_continuation_feedback(tail)
    ))
}

/// Context for continuation round `round`, carrying the round number and the
/// accumulated length in its metadata.
pub(crate) fn continuation_context(
    context: &GenerationContext,
    round: usize,
    accumulated: &str,
) -> GenerationContext {
    let mut next = context.clone();
    next.metadata
        .insert(CONTINUATION_ATTEMPT_KEY.to_string(), Value::from(round));
    next.metadata.insert(
        PREVIOUS_CONTENT_LENGTH_KEY.to_string(),
        Value::from(accumulated.chars().count()),
    );
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_was_truncated() {
        let mut response = Response::default();
        assert!(!was_truncated(&response));
        response.finish_reason = FinishReason::Length;
        assert!(was_truncated(&response));
        response.finish_reason = FinishReason::ContentFilter;
        assert!(!was_truncated(&response));
    }

    #[test]
    fn test_truncation_warning_variants() {
        assert_eq!(create_truncation_warning(0, false), None);

        let unattempted = create_truncation_warning(0, true).unwrap_or_default();
        assert!(unattempted.contains("increasing the token limit"));

        let exhausted = create_truncation_warning(3, true).unwrap_or_default();
        assert!(exhausted.contains("still incomplete after 3"));

        let recovered = create_truncation_warning(2, false).unwrap_or_default();
        assert!(recovered.contains("required 2 continuations"));
    }

    #[test]
    fn test_continuation_request_quotes_bounded_tail() {
        let request = Request::new("Write a codeunit.").with_max_tokens(128);
        let accumulated = format!("{}{}", "#".repeat(1000), "~".repeat(500));

        let next = continuation_request(&request, &accumulated);

        assert!(next.prompt.starts_with("Write a codeunit."));
        assert!(next.prompt.contains("Continue EXACTLY"));
        assert!(next.prompt.ends_with(&"~".repeat(500)));
        assert!(!next.prompt.contains('#'));
        assert_eq!(next.max_tokens, Some(128));
    }

    #[test]
    fn test_continuation_context_bookkeeping() {
        let context = GenerationContext::new("CG-AL-E001", 1);
        let next = continuation_context(&context, 2, "héllo");
        assert_eq!(next.continuation_attempt(), Some(2));
        assert_eq!(next.previous_content_length(), Some(5));
        assert_eq!(next.task_id, "CG-AL-E001");
        assert!(context.metadata.is_empty());
    }
}
