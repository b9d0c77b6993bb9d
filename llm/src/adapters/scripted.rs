use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use gauge_extract::build_fix_feedback;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::adapter::{ChunkStream, GenerationAdapter, StreamOptions};
use crate::discovery::ModelInfo;
use crate::errors::AdapterError;
use crate::metrics::estimate_usage;
use crate::types::{
    FinishReason, GenerationContext, Request, Response, StreamChunk, StreamItem, TokenUsage,
};

/// Characters per streamed chunk unless configured otherwise.
const DEFAULT_CHUNK_CHARS: usize = 16;

type Reply = Result<Response, AdapterError>;

/// Which capability a recorded call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// `generate`
    Generate,
    /// `generate_fix`
    Fix,
    /// `generate_stream`
    Stream,
}

/// One call received by a [`ScriptedAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Capability invoked.
    pub capability: Capability,
    /// Request as the provider would have received it.
    pub request: Request,
    /// Context passed alongside.
    pub context: GenerationContext,
}

/// One provider round in a JSON script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedRound {
    /// Text the provider returns.
    pub content: String,
    /// Finish reason of the round (default: stop).
    pub finish_reason: FinishReason,
    /// Reported usage; estimated from the text when absent.
    pub usage: Option<TokenUsage>,
    /// Reported model.
    pub model: Option<String>,
    /// Reported call duration.
    pub duration_ms: u64,
    /// When set, the round fails with an error classified from this message.
    pub error: Option<String>,
}

impl ScriptedRound {
    /// The reply this round stands for.
    ///
    /// # Errors
    ///
    /// Returns the scripted error, classified with [`AdapterError::from_message`].
    pub fn into_reply(self) -> Result<Response, AdapterError> {
        if let Some(message) = self.error {
            return Err(AdapterError::from_message(message));
        }
        Ok(Response {
            content: self.content,
            model: self.model.unwrap_or_default(),
            usage: self.usage.unwrap_or_default(),
            duration_ms: self.duration_ms,
            finish_reason: self.finish_reason,
        })
    }
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Reply>,
    last: Option<Reply>,
    calls: Vec<RecordedCall>,
}

/// Adapter that replays a fixed queue of replies.
///
/// Once the queue is exhausted the last reply repeats, which models a provider
/// that keeps answering the same way. Every call is recorded. Replies with
/// zero usage get usage estimated from the prompt and the content.
#[derive(Clone)]
pub struct ScriptedAdapter {
    name: String,
    script: Arc<Mutex<Script>>,
    chunk_chars: usize,
    /// Zero-based call index from which streams never complete.
    hang_from: Option<usize>,
    models: Vec<ModelInfo>,
}

impl ScriptedAdapter {
    /// Creates an adapter that replays `replies` in order.
    #[must_use]
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            name: "scripted".to_string(),
            script: Arc::new(Mutex::new(Script {
                queue: replies.into_iter().collect(),
                ..Script::default()
            })),
            chunk_chars: DEFAULT_CHUNK_CHARS,
            hang_from: None,
            models: Vec::new(),
        }
    }

    /// Creates an adapter from successful responses only.
    #[must_use]
    pub fn from_responses(responses: impl IntoIterator<Item = Response>) -> Self {
        Self::new(responses.into_iter().map(Ok))
    }

    /// Creates an adapter from JSON script rounds.
    #[must_use]
    pub fn from_rounds(rounds: impl IntoIterator<Item = ScriptedRound>) -> Self {
        Self::new(rounds.into_iter().map(ScriptedRound::into_reply))
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets how many characters each streamed chunk carries.
    #[must_use]
    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }

    /// Makes streams emit their chunks and then never complete.
    #[must_use]
    pub const fn hang_streams(self) -> Self {
        self.hang_streams_from(0)
    }

    /// Like [`hang_streams`](Self::hang_streams), for calls from the
    /// zero-based index `call` onwards.
    #[must_use]
    pub const fn hang_streams_from(mut self, call: usize) -> Self {
        self.hang_from = Some(call);
        self
    }

    /// Sets the models reported by `list_models`.
    #[must_use]
    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().await.calls.clone()
    }

    /// Number of calls received so far.
    pub async fn call_count(&self) -> usize {
        self.script.lock().await.calls.len()
    }

    async fn reply(
        &self,
        capability: Capability,
        request: Request,
        context: &GenerationContext,
    ) -> Reply {
        let mut script = self.script.lock().await;

        let reply = match script.queue.pop_front() {
            Some(reply) => {
                script.last = Some(reply.clone());
                reply
            }
            None => script
                .last
                .clone()
                .unwrap_or_else(|| Err(AdapterError::Other("script is empty".to_string()))),
        };

        let prompt = request.prompt.clone();
        script.calls.push(RecordedCall {
            capability,
            request,
            context: context.clone(),
        });
        drop(script);

        reply.map(|mut response| {
            if response.usage == TokenUsage::default() {
                response.usage = estimate_usage(&prompt, &response.content);
            }
            if response.model.is_empty() {
                response.model.clone_from(&self.name);
            }
            response
        })
    }

    fn chunk(&self, response: Response, hang: bool) -> ChunkStream {
        let chars: Vec<char> = response.content.chars().collect();
        let mut accumulated = String::new();
        let mut items = Vec::new();

        for (index, piece) in chars.chunks(self.chunk_chars).enumerate() {
            let text: String = piece.iter().collect();
            accumulated.push_str(&text);
            items.push(Ok(StreamItem::Chunk(StreamChunk {
                text,
                accumulated: accumulated.clone(),
                index: u64::try_from(index).unwrap_or(u64::MAX),
                done: false,
                usage: None,
            })));
        }

        if hang {
            return stream::iter(items).chain(stream::pending()).boxed();
        }
        items.push(Ok(StreamItem::Complete(response)));
        stream::iter(items).boxed()
    }
}

#[async_trait]
impl GenerationAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: &Request,
        context: &GenerationContext,
    ) -> Result<Response, AdapterError> {
        self.reply(Capability::Generate, request.clone(), context)
            .await
    }

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
        let request = request.with_prompt(format!("{}\n\n{feedback}", request.prompt));
        self.reply(Capability::Fix, request, context).await
    }

    async fn generate_stream(
        &self,
        request: &Request,
        context: &GenerationContext,
        _options: &StreamOptions,
    ) -> Result<ChunkStream, AdapterError> {
        let call = self.call_count().await;
        let response = self
            .reply(Capability::Stream, request.clone(), context)
            .await?;
        let hang = self.hang_from.is_some_and(|from| call >= from);
        Ok(self.chunk(response, hang))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, AdapterError> {
        Ok(self.models.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn response(content: &str, finish_reason: FinishReason) -> Response {
        Response {
            content: content.to_string(),
            finish_reason,
            ..Response::default()
        }
    }

    #[tokio::test]
    async fn test_replays_then_repeats_last() {
        let adapter = ScriptedAdapter::from_responses([
            response("one", FinishReason::Length),
            response("two", FinishReason::Stop),
        ]);
        let ctx = GenerationContext::new("t", 1);
        let req = Request::new("p");

        assert_eq!(adapter.generate(&req, &ctx).await.unwrap().content, "one");
        assert_eq!(adapter.generate(&req, &ctx).await.unwrap().content, "two");
        assert_eq!(adapter.generate(&req, &ctx).await.unwrap().content, "two");
        assert_eq!(adapter.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_empty_script_errors() {
        let adapter = ScriptedAdapter::new([]);
        let err = adapter
            .generate(&Request::new("p"), &GenerationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Other(_)));
    }

    #[tokio::test]
    async fn test_missing_usage_is_estimated() {
        let adapter = ScriptedAdapter::from_responses([response("abcdefgh", FinishReason::Stop)]);
        let reply = adapter
            .generate(&Request::new("abcd"), &GenerationContext::default())
            .await
            .unwrap();
        assert_eq!(reply.usage, TokenUsage::new(1, 2));
        assert_eq!(reply.model, "scripted");
    }

    #[tokio::test]
    async fn test_fix_records_feedback_prompt() {
        let adapter = ScriptedAdapter::from_responses([response("fixed", FinishReason::Stop)]);
        let ctx = GenerationContext::new("t", 2).with_max_attempts(3);
        let errors = vec!["AL0118: unknown identifier".to_string()];

        adapter
            .generate_fix(&Request::new("Write it."), "codeunit 1 A {}", &errors, &ctx)
            .await
            .unwrap();

        let calls = adapter.calls().await;
        assert_eq!(calls[0].capability, Capability::Fix);
        assert!(calls[0].request.prompt.starts_with("Write it."));
        assert!(calls[0].request.prompt.contains("Attempt 2/3"));
        assert!(calls[0].request.prompt.contains("AL0118"));
    }

    #[tokio::test]
    async fn test_stream_splits_by_characters() {
        let adapter = ScriptedAdapter::from_responses([response("héllo wörld", FinishReason::Stop)])
            .with_chunk_chars(4);
        let mut stream = adapter
            .generate_stream(&Request::new("p"), &GenerationContext::default(), &StreamOptions::new())
            .await
            .unwrap();

        let mut texts = Vec::new();
        let mut completed = None;
        while let Some(item) = stream.next().await {
            match item.unwrap() {
                StreamItem::Chunk(chunk) => texts.push(chunk.text),
                StreamItem::Complete(response) => completed = Some(response),
            }
        }

        assert_eq!(texts, vec!["héll", "o wö", "rld"]);
        assert_eq!(completed.unwrap().content, "héllo wörld");
    }

    #[test]
    fn test_scripted_round_json() {
        let rounds: Vec<ScriptedRound> = serde_json::from_str(
            r#"[
                {"content": "begin", "finish_reason": "length"},
                {"error": "HTTP 503 upstream overloaded"}
            ]"#,
        )
        .unwrap();

        let replies: Vec<Reply> = rounds.into_iter().map(ScriptedRound::into_reply).collect();
        assert_eq!(replies[0].as_ref().unwrap().finish_reason, FinishReason::Length);
        assert!(matches!(replies[1], Err(AdapterError::Http { status: 503, .. })));
    }
}
