//! Shared data types for requests, responses, usage accounting and stream chunks.

use gauge_extract::CodeKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::{Add, AddAssign};

use crate::errors::ProviderError;

/// Metadata key carrying the 1-based continuation round number.
pub const CONTINUATION_ATTEMPT_KEY: &str = "continuationAttempt";

/// Metadata key carrying the accumulated content length (in characters) before a round.
pub const PREVIOUS_CONTENT_LENGTH_KEY: &str = "previousContentLength";

/// Metadata key carrying the attempt budget of the task, used to number fix feedback.
pub const MAX_ATTEMPTS_KEY: &str = "maxAttempts";

/// A single generation request. Continuation rounds derive new requests by
/// replacing only the prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The prompt text.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u64>,
    /// Sequences that stop generation.
    pub stop_sequences: Option<Vec<String>>,
    /// System prompt.
    pub system_prompt: Option<String>,
}

impl Request {
    /// Creates a request with only a prompt set.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the max-token cap.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the stop sequences.
    #[must_use]
    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        self.stop_sequences = Some(stop);
        self
    }

    /// Returns a copy of this request with a different prompt.
    #[must_use]
    pub fn with_prompt(&self, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..self.clone()
        }
    }
}

/// Why a provider stopped generating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural completion.
    #[default]
    Stop,
    /// Hit the token cap; output is truncated.
    Length,
    /// Blocked by a safety filter.
    ContentFilter,
    /// Provider-side failure.
    Error,
}

/// Token accounting for one or more calls. Fields add up field-wise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u64,
    /// Tokens generated.
    pub completion_tokens: u64,
    /// Total tokens as reported by the provider.
    pub total_tokens: u64,
    /// Estimated cost in USD, when known.
    pub estimated_cost: Option<f64>,
}

impl TokenUsage {
    /// Creates usage with `total_tokens` set to the sum of both parts.
    #[must_use]
    pub const fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            estimated_cost: None,
        }
    }

    /// Sets the estimated cost.
    #[must_use]
    pub const fn with_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = Some(cost);
        self
    }

    /// Field-wise sum. The cost is summed when either side defines it.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        let estimated_cost = match (self.estimated_cost, other.estimated_cost) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        };
        Self {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
            estimated_cost,
        }
    }
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.combine(&rhs)
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.combine(&rhs);
    }
}

/// Response from one provider call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Generated text.
    pub content: String,
    /// Model identifier reported by the provider.
    pub model: String,
    /// Token usage of this call.
    pub usage: TokenUsage,
    /// Wall-clock duration of this call in milliseconds.
    pub duration_ms: u64,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
}

/// Per-task information passed alongside every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    /// Benchmark task identifier.
    pub task_id: String,
    /// 1-based attempt number within the task.
    pub attempt: usize,
    /// Free-form task description.
    pub description: String,
    /// Code produced by the previous attempt (fix mode).
    pub previous_code: Option<String>,
    /// Errors reported for the previous attempt (fix mode).
    pub previous_errors: Vec<String>,
    /// Kind of artifact the task expects.
    pub expected_kind: CodeKind,
    /// Open bag for bookkeeping that is not part of the core contract.
    pub metadata: Map<String, Value>,
}

impl GenerationContext {
    /// Creates a context for the given task and attempt.
    #[must_use]
    pub fn new(task_id: impl Into<String>, attempt: usize) -> Self {
        Self {
            task_id: task_id.into(),
            attempt,
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the expected artifact kind.
    #[must_use]
    pub const fn with_expected_kind(mut self, kind: CodeKind) -> Self {
        self.expected_kind = kind;
        self
    }

    /// Sets the previous code and errors for fix mode.
    #[must_use]
    pub fn with_previous(mut self, code: impl Into<String>, errors: Vec<String>) -> Self {
        self.previous_code = Some(code.into());
        self.previous_errors = errors;
        self
    }

    /// Sets the attempt budget of the task.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.metadata
            .insert(MAX_ATTEMPTS_KEY.to_string(), Value::from(max_attempts));
        self
    }

    /// Attempt budget of the task; falls back to the current attempt when unset.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.metadata
            .get(MAX_ATTEMPTS_KEY)
            .and_then(Value::as_u64)
            .and_then(|max| usize::try_from(max).ok())
            .unwrap_or(self.attempt)
            .max(self.attempt)
    }

    /// Continuation round this context belongs to, if any.
    #[must_use]
    pub fn continuation_attempt(&self) -> Option<u64> {
        self.metadata
            .get(CONTINUATION_ATTEMPT_KEY)
            .and_then(Value::as_u64)
    }

    /// Accumulated content length before this round, if this is a continuation.
    #[must_use]
    pub fn previous_content_length(&self) -> Option<u64> {
        self.metadata
            .get(PREVIOUS_CONTENT_LENGTH_KEY)
            .and_then(Value::as_u64)
    }
}

/// One incremental piece of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// New text in this chunk.
    pub text: String,
    /// All text accumulated so far, this chunk included.
    pub accumulated: String,
    /// Monotonically increasing sequence index.
    pub index: u64,
    /// Whether this is the terminal chunk.
    pub done: bool,
    /// Usage, populated only on the terminal chunk.
    pub usage: Option<TokenUsage>,
}

/// Item of a provider stream: chunks followed by a single completed response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// An incremental chunk.
    Chunk(StreamChunk),
    /// The completed response, carrying finish reason and usage.
    Complete(Response),
}

/// Result of a generation that may have been extended by continuation rounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinuationResult {
    /// Merged content and aggregated usage; model, duration and finish
    /// reason come from the last round.
    pub response: Response,
    /// Number of follow-up calls issued, failed ones included (the initial
    /// call is not counted).
    pub continuation_count: usize,
    /// Whether the output is incomplete: the last round still hit the token
    /// cap, or a follow-up round failed or was cancelled.
    pub was_truncated: bool,
    /// Why the last follow-up round failed, if it did. The output produced
    /// before the failure is still in `response`.
    #[serde(skip)]
    pub round_error: Option<ProviderError>,
}

impl ContinuationResult {
    /// Aggregated usage over all rounds.
    #[must_use]
    pub const fn usage(&self) -> &TokenUsage {
        &self.response.usage
    }

    /// Merged content over all rounds.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.response.content
    }
}

/// Result of a streamed generation with continuation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamingContinuationResult {
    /// Same shape as the non-streaming result.
    pub result: ContinuationResult,
    /// Number of chunks emitted, the terminal chunk included.
    pub chunk_count: u64,
    /// Whether the stream was abandoned through the cancellation token.
    pub cancelled: bool,
}
