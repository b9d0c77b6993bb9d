//! Continuation loop for non-streaming calls.

use std::future::Future;

use crate::adapter::GenerationAdapter;
use crate::config::ContinuationConfig;
use crate::errors::{AdapterError, ProviderError};
use crate::types::{ContinuationResult, GenerationContext, Request, Response};

use super::merge::merge_code;
use super::{continuation_context, continuation_request, was_truncated};

/// Extends `initial` with follow-up rounds while it is truncated.
///
/// Each round calls `call` with a continuation request and context, merges
/// the new content into the accumulated text and adds its usage. The loop
/// stops when a round finishes for any reason other than the token cap, when
/// `config.max_continuations` rounds have been made, or when a round fails.
///
/// Every issued round counts towards `continuation_count`, failed ones
/// included. A failed round is logged and kept in `round_error`; the output
/// accumulated so far is returned and marked as truncated.
///
/// The returned response carries the merged content and the summed usage;
/// model, duration and finish reason come from the last successful round.
pub async fn continue_generation<F, Fut>(
    initial: Response,
    request: &Request,
    context: &GenerationContext,
    config: &ContinuationConfig,
    mut call: F,
) -> ContinuationResult
where
    F: FnMut(Request, GenerationContext) -> Fut,
    Fut: Future<Output = Result<Response, ProviderError>>,
{
    let kind = context.expected_kind;
    let mut content = initial.content.clone();
    let mut usage = initial.usage;
    let mut last = initial;
    let mut continuation_count = 0;
    let mut round_error = None;

    while config.enabled && was_truncated(&last) && continuation_count < config.max_continuations
    {
        let round = continuation_count + 1;
        tracing::info!(
            event = "continuation_round",
            task_id = %context.task_id,
            round,
            max_continuations = config.max_continuations,
            accumulated_chars = content.chars().count(),
            "continuation_round"
        );

        let next_request = continuation_request(request, &content);
        let next_context = continuation_context(context, round, &content);
        continuation_count = round;

        match call(next_request, next_context).await {
            Ok(response) => {
                content = merge_code(&content, &response.content, kind);
                usage += response.usage;
                last = response;
            }
            Err(e) => {
                tracing::warn!(
                    event = "continuation_round_failed",
                    task_id = %context.task_id,
                    round,
                    error = %e,
                    "continuation_round_failed"
                );
                round_error = Some(e);
                break;
            }
        }
    }

    ContinuationResult {
        was_truncated: round_error.is_some() || was_truncated(&last),
        continuation_count,
        round_error,
        response: Response {
            content,
            usage,
            ..last
        },
    }
}

/// Calls `adapter.generate` and continues the response while it is truncated.
///
/// # Errors
///
/// Returns the adapter error of the initial call. Failed continuation rounds
/// never fail the whole generation; they end up in `round_error`.
pub async fn generate_with_continuation(
    adapter: &dyn GenerationAdapter,
    request: &Request,
    context: &GenerationContext,
    config: &ContinuationConfig,
) -> Result<ContinuationResult, AdapterError> {
    let initial = adapter.generate(request, context).await?;

    Ok(continue_generation(initial, request, context, config, |next, ctx| async move {
        adapter
            .generate(&next, &ctx)
            .await
            .map_err(|source| ProviderError::Terminal {
                provider: adapter.name().to_string(),
                task_id: ctx.task_id.clone(),
                attempt_number: ctx.attempt,
                retries: 0,
                source,
            })
    })
    .await)
}
