//! Continuation across provider streams.
//!
//! [`stream_with_continuation`] spawns a driver task that drains one provider
//! stream after another, re-emitting every chunk with a global index and a
//! running accumulated text, and reports the merged result through
//! [`ContinuationStream::finish`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use gauge_extract::CodeKind;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use crate::adapter::{ChunkStream, GenerationAdapter, StreamOptions};
use crate::config::{ContinuationConfig, PipelineConfig};
use crate::errors::{AdapterError, ProviderError};
use crate::types::{
    ContinuationResult, FinishReason, GenerationContext, Request, Response, StreamChunk,
    StreamItem, StreamingContinuationResult, TokenUsage,
};

use super::merge::merge_code;
use super::{continuation_context, continuation_request, was_truncated};

type Completion = Result<StreamingContinuationResult, ProviderError>;

/// Chunks of a streamed generation, possibly spanning several provider calls.
///
/// Yields [`StreamChunk`]s and ends with a terminal chunk (`done = true`)
/// carrying the merged text and the aggregated usage. Call
/// [`finish`](Self::finish) for the final result.
pub struct ContinuationStream {
    chunks: ReceiverStream<StreamChunk>,
    completion: oneshot::Receiver<Completion>,
}

impl ContinuationStream {
    /// Waits for the driver and returns the final result. Chunks not yet
    /// consumed are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Terminal`] when the first round could not be
    /// streamed, [`ProviderError::InvalidConfig`] for a rejected configuration,
    /// or [`ProviderError::StreamClosed`] if the driver task died.
    pub async fn finish(mut self) -> Completion {
        while self.chunks.next().await.is_some() {}
        self.completion
            .await
            .map_err(|_| ProviderError::StreamClosed)?
    }
}

impl Stream for ContinuationStream {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamChunk>> {
        self.chunks.poll_next_unpin(cx)
    }
}

/// Streams a generation and continues it while the provider reports truncation.
///
/// Continuation rounds use the same prompt construction and merge rule as
/// [`continue_generation`](super::continue_generation). While a continuation
/// round is in flight, `accumulated` is the merged text so far followed by the
/// round's raw text; overlap is only trimmed once the round completes.
///
/// Cancelling `options.cancel` drops the in-flight provider stream, starts no
/// further round, and still emits the terminal chunk; the result then reports
/// `cancelled` and `was_truncated`.
///
/// An invalid `config` yields no chunks and resolves [`ContinuationStream::finish`]
/// with [`ProviderError::InvalidConfig`].
///
/// Must be called from within a tokio runtime.
#[must_use]
pub fn stream_with_continuation(
    adapter: Arc<dyn GenerationAdapter>,
    request: Request,
    context: GenerationContext,
    config: &PipelineConfig,
    options: StreamOptions,
) -> ContinuationStream {
    let (done_tx, done_rx) = oneshot::channel();
    if let Err(e) = config.validate() {
        let (_, rx) = mpsc::channel(1);
        let _ = done_tx.send(Err(e));
        return ContinuationStream {
            chunks: ReceiverStream::new(rx),
            completion: done_rx,
        };
    }
    let (tx, rx) = mpsc::channel(config.channel_capacity);

    let driver = Driver {
        kind: context.expected_kind,
        adapter,
        request,
        context,
        config: config.continuation,
        options,
        tx,
        merged: String::new(),
        round_text: String::new(),
        usage: TokenUsage::default(),
        last: None,
        round: 0,
        emitted: 0,
        cancelled: false,
        round_error: None,
        started: Instant::now(),
    };

    tokio::spawn(
        async move {
            let _ = done_tx.send(driver.run().await);
        }
        .instrument(tracing::Span::current()),
    );

    ContinuationStream {
        chunks: ReceiverStream::new(rx),
        completion: done_rx,
    }
}

enum DriverState {
    Starting,
    Streaming(ChunkStream),
    DecidingContinuation,
    Continuing,
    Done,
}

enum Opened {
    Stream(ChunkStream),
    Cancelled,
    Failed(AdapterError),
}

enum RoundEnd {
    Completed(Response),
    Cancelled,
    ReceiverGone,
    Failed(AdapterError),
}

struct Driver {
    kind: CodeKind,
    adapter: Arc<dyn GenerationAdapter>,
    request: Request,
    context: GenerationContext,
    config: ContinuationConfig,
    options: StreamOptions,
    tx: mpsc::Sender<StreamChunk>,
    /// Merged text of every finished round.
    merged: String,
    /// Raw text of the round in flight.
    round_text: String,
    usage: TokenUsage,
    /// Last round that completed with a response.
    last: Option<Response>,
    /// Continuation rounds issued so far, failed ones included; 0 while in
    /// the initial round.
    round: usize,
    emitted: u64,
    cancelled: bool,
    round_error: Option<ProviderError>,
    started: Instant,
}

impl Driver {
    async fn run(mut self) -> Completion {
        let mut state = DriverState::Starting;

        loop {
            state = match state {
                DriverState::Starting => {
                    let (request, context) = (self.request.clone(), self.context.clone());
                    match self.open(&request, &context).await {
                        Opened::Stream(stream) => DriverState::Streaming(stream),
                        Opened::Cancelled => {
                            self.on_cancelled();
                            DriverState::Done
                        }
                        Opened::Failed(e) => return Err(self.round_failure(e)),
                    }
                }
                DriverState::Streaming(stream) => match self.drain(stream).await {
                    RoundEnd::Completed(response) => {
                        self.complete_round(response);
                        DriverState::DecidingContinuation
                    }
                    RoundEnd::Cancelled => {
                        self.on_cancelled();
                        self.fold_partial();
                        DriverState::Done
                    }
                    RoundEnd::ReceiverGone => {
                        self.fold_partial();
                        DriverState::Done
                    }
                    RoundEnd::Failed(e) if self.round == 0 => {
                        return Err(self.round_failure(e));
                    }
                    RoundEnd::Failed(e) => {
                        self.on_round_failed(e);
                        self.fold_partial();
                        DriverState::Done
                    }
                },
                DriverState::DecidingContinuation => {
                    let truncated = self.last.as_ref().is_some_and(was_truncated);
                    if self.config.enabled
                        && truncated
                        && self.round < self.config.max_continuations
                    {
                        DriverState::Continuing
                    } else {
                        DriverState::Done
                    }
                }
                DriverState::Continuing if self.options.cancel.is_cancelled() => {
                    self.on_cancelled();
                    DriverState::Done
                }
                DriverState::Continuing => {
                    let round = self.round + 1;
                    tracing::info!(
                        event = "continuation_round",
                        task_id = %self.context.task_id,
                        round,
                        max_continuations = self.config.max_continuations,
                        accumulated_chars = self.merged.chars().count(),
                        streaming = true,
                        "continuation_round"
                    );

                    let request = continuation_request(&self.request, &self.merged);
                    let context = continuation_context(&self.context, round, &self.merged);
                    self.round = round;
                    match self.open(&request, &context).await {
                        Opened::Stream(stream) => DriverState::Streaming(stream),
                        Opened::Cancelled => {
                            self.on_cancelled();
                            DriverState::Done
                        }
                        Opened::Failed(e) => {
                            self.on_round_failed(e);
                            DriverState::Done
                        }
                    }
                }
                DriverState::Done => break,
            };
        }

        self.emit_terminal().await;
        Ok(self.into_result())
    }

    async fn open(&self, request: &Request, context: &GenerationContext) -> Opened {
        tokio::select! {
            biased;
            () = self.options.cancel.cancelled() => Opened::Cancelled,
            opened = self.adapter.generate_stream(request, context, &self.options) => match opened {
                Ok(stream) => Opened::Stream(stream),
                Err(e) => Opened::Failed(e),
            },
        }
    }

    /// Drains one provider stream. Dropping `stream` on early return abandons
    /// the underlying response.
    async fn drain(&mut self, mut stream: ChunkStream) -> RoundEnd {
        let cancel = self.options.cancel.clone();

        loop {
            let item = tokio::select! {
                biased;
                () = cancel.cancelled() => return RoundEnd::Cancelled,
                item = stream.next() => item,
            };

            match item {
                Some(Ok(StreamItem::Chunk(chunk))) => {
                    if chunk.text.is_empty() {
                        continue;
                    }
                    if let Some(end) = self.emit(chunk.text).await {
                        return end;
                    }
                }
                Some(Ok(StreamItem::Complete(response))) => return RoundEnd::Completed(response),
                Some(Err(e)) => return RoundEnd::Failed(e),
                None => {
                    return RoundEnd::Failed(AdapterError::Stream(
                        "provider stream ended without a completed response".to_string(),
                    ));
                }
            }
        }
    }

    /// Sends one chunk. `round_text` only keeps text the consumer received.
    async fn emit(&mut self, text: String) -> Option<RoundEnd> {
        let kept = self.round_text.len();
        self.round_text.push_str(&text);
        let accumulated = if self.round == 0 {
            self.round_text.clone()
        } else {
            format!("{}{}", self.merged, self.round_text)
        };
        let chunk = StreamChunk {
            text,
            accumulated,
            index: self.emitted,
            done: false,
            usage: None,
        };

        let sent = tokio::select! {
            biased;
            () = self.options.cancel.cancelled() => {
                self.round_text.truncate(kept);
                return Some(RoundEnd::Cancelled);
            }
            sent = self.tx.send(chunk) => sent,
        };

        if sent.is_err() {
            self.round_text.truncate(kept);
            return Some(RoundEnd::ReceiverGone);
        }
        self.emitted += 1;
        None
    }

    fn complete_round(&mut self, response: Response) {
        let text = if self.round_text.is_empty() {
            response.content.clone()
        } else {
            std::mem::take(&mut self.round_text)
        };
        self.merged = if self.round == 0 {
            text
        } else {
            merge_code(&self.merged, &text, self.kind)
        };
        self.usage += response.usage;
        self.last = Some(response);
    }

    /// Keeps the text of an unfinished round; the consumer has already seen it.
    fn fold_partial(&mut self) {
        if self.round_text.is_empty() {
            return;
        }
        let partial = std::mem::take(&mut self.round_text);
        self.merged = if self.round == 0 {
            partial
        } else {
            merge_code(&self.merged, &partial, self.kind)
        };
    }

    fn on_cancelled(&mut self) {
        self.cancelled = true;
        tracing::info!(
            event = "continuation_stream_cancelled",
            task_id = %self.context.task_id,
            round = self.round,
            emitted = self.emitted,
            "continuation_stream_cancelled"
        );
    }

    fn on_round_failed(&mut self, error: AdapterError) {
        tracing::warn!(
            event = "continuation_round_failed",
            task_id = %self.context.task_id,
            round = self.round,
            error = %error,
            streaming = true,
            "continuation_round_failed"
        );
        self.round_error = Some(self.round_failure(error));
    }

    fn round_failure(&self, source: AdapterError) -> ProviderError {
        ProviderError::Terminal {
            provider: self.adapter.name().to_string(),
            task_id: self.context.task_id.clone(),
            attempt_number: self.context.attempt,
            retries: 0,
            source,
        }
    }

    async fn emit_terminal(&mut self) {
        let terminal = StreamChunk {
            text: String::new(),
            accumulated: self.merged.clone(),
            index: self.emitted,
            done: true,
            usage: Some(self.usage),
        };
        if self.tx.send(terminal).await.is_ok() {
            self.emitted += 1;
        }
    }

    fn into_result(self) -> StreamingContinuationResult {
        let incomplete = self.cancelled || self.round_error.is_some();
        let (model, duration_ms, finish_reason) = match self.last {
            Some(last) => (last.model, last.duration_ms, last.finish_reason),
            None => (
                String::new(),
                u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
                FinishReason::Length,
            ),
        };

        StreamingContinuationResult {
            result: ContinuationResult {
                response: Response {
                    content: self.merged,
                    model,
                    usage: self.usage,
                    duration_ms,
                    finish_reason,
                },
                continuation_count: self.round,
                was_truncated: incomplete || finish_reason == FinishReason::Length,
                round_error: self.round_error,
            },
            chunk_count: self.emitted,
            cancelled: self.cancelled,
        }
    }
}
