//! Response reconstruction between a code-generation benchmark and LLM providers.
//!
//! A provider answer goes through three stages before it reaches the task
//! layer:
//!
//! 1. [`retry::call_with_retry`] calls the provider and retries transient
//!    failures with linear backoff (or a server-specified delay).
//! 2. [`continuation`] notices truncated output and asks the provider to
//!    resume, merging rounds with a bounded suffix/prefix overlap. Both a
//!    blocking loop and a chunk stream spanning several provider streams are
//!    provided.
//! 3. [`gauge_extract`] locates the intended code in the merged text and
//!    reports how confident it is.
//!
//! [`generator::Generator`] strings the stages together for one task attempt.

pub mod adapter;
/// Provider adapters: a rig bridge and a scripted replay adapter.
pub mod adapters;
pub mod classify;
pub mod config;
pub mod continuation;
pub mod discovery;
/// Adapter-level and pipeline-level errors.
pub mod errors;
pub mod generator;
pub mod metrics;
pub mod retry;
pub mod types;

/// Common imports for driving the pipeline.
pub mod prelude {
    pub use crate::adapter::{ChunkStream, GenerationAdapter, StreamOptions};
    pub use crate::classify::{DefaultClassifier, ErrorClassifier};
    pub use crate::config::{ContinuationConfig, PipelineConfig, RetryConfig};
    pub use crate::continuation::{
        continue_generation, create_truncation_warning, generate_with_continuation,
        stream_with_continuation, was_truncated, ContinuationStream,
    };
    pub use crate::discovery::{ModelCatalog, ModelInfo};
    pub use crate::errors::{AdapterError, ProviderError};
    pub use crate::generator::{AttemptRecord, CodeGeneration, GenerationTask, Generator};
    pub use crate::retry::{call_with_retry, RetryScope};
    pub use crate::types::{
        ContinuationResult, FinishReason, GenerationContext, Request, Response, StreamChunk,
        StreamItem, StreamingContinuationResult, TokenUsage,
    };
    pub use gauge_extract::{CodeKind, ExtractionResult};
}
