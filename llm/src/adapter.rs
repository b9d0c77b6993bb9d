//! The generation capability consumed by the pipeline.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use gauge_extract::build_fix_feedback;
use tokio_util::sync::CancellationToken;

use crate::discovery::ModelInfo;
use crate::errors::AdapterError;
use crate::types::{GenerationContext, Request, Response, StreamChunk, StreamItem};

/// Stream of provider chunks terminated by a single [`StreamItem::Complete`].
pub type ChunkStream = BoxStream<'static, Result<StreamItem, AdapterError>>;

/// Options threaded through streaming calls.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Abandons the in-flight stream when cancelled.
    pub cancel: CancellationToken,
}

impl StreamOptions {
    /// Options with a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A provider that can generate and fix code.
///
/// Implementations only need [`name`](Self::name) and
/// [`generate`](Self::generate); fix mode, streaming and model listing have
/// defaults built on top of them.
#[async_trait]
pub trait GenerationAdapter: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate new code for the request.
    async fn generate(
        &self,
        request: &Request,
        context: &GenerationContext,
    ) -> Result<Response, AdapterError>;

    /// Fix previously generated code given its errors.
    ///
    /// The default appends fix feedback to the prompt and calls
    /// [`generate`](Self::generate).
    async fn generate_fix(
        &self,
        request: &Request,
        code: &str,
        errors: &[String],
        context: &GenerationContext,
    ) -> Result<Response, AdapterError> {
        let feedback = build_fix_feedback(
            code,
            errors,
            context.attempt,
            context.max_attempts(),
            context.expected_kind,
        );
        let prompt = format!("{}\n\n{feedback}", request.prompt);
        self.generate(&request.with_prompt(prompt), context).await
    }

    /// Stream a generation.
    ///
    /// The default performs a blocking [`generate`](Self::generate) and
    /// replays it as one chunk followed by the completed response.
    async fn generate_stream(
        &self,
        request: &Request,
        context: &GenerationContext,
        options: &StreamOptions,
    ) -> Result<ChunkStream, AdapterError> {
        let response = tokio::select! {
            biased;
            () = options.cancel.cancelled() => {
                return Err(AdapterError::Stream("cancelled before the response arrived".into()));
            }
            response = self.generate(request, context) => response?,
        };

        let mut items = Vec::with_capacity(2);
        if !response.content.is_empty() {
            items.push(Ok(StreamItem::Chunk(StreamChunk {
                text: response.content.clone(),
                accumulated: response.content.clone(),
                index: 0,
                done: false,
                usage: None,
            })));
        }
        items.push(Ok(StreamItem::Complete(response)));
        Ok(stream::iter(items).boxed())
    }

    /// Models this provider offers. Empty when the provider cannot list them.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, AdapterError> {
        Ok(Vec::new())
    }
}
