use async_trait::async_trait;
use rig::completion::{message::AssistantContent, CompletionError, CompletionModel, Usage};
use serde_json::json;
use tokio::time::Instant;

use crate::adapter::GenerationAdapter;
use crate::discovery::ModelInfo;
use crate::errors::AdapterError;
use crate::metrics::estimate_usage;
use crate::types::{FinishReason, GenerationContext, Request, Response, TokenUsage};

/// Bridges any rig [`CompletionModel`] into a [`GenerationAdapter`].
///
/// rig does not report why generation stopped, so the finish reason is
/// inferred: a response whose output tokens reach the request's `max_tokens`
/// is treated as truncated.
#[derive(Clone)]
pub struct RigAdapter<M: CompletionModel> {
    name: String,
    model_id: String,
    model: M,
    models: Vec<ModelInfo>,
}

impl<M: CompletionModel> RigAdapter<M> {
    /// Wraps `model`; `name` identifies the provider and `model_id` is
    /// reported on every response.
    pub fn new(name: impl Into<String>, model_id: impl Into<String>, model: M) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
            model,
            models: Vec::new(),
        }
    }

    /// Sets the models reported by `list_models`.
    #[must_use]
    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }
}

#[async_trait]
impl<M> GenerationAdapter for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: &Request,
        _context: &GenerationContext,
    ) -> Result<Response, AdapterError> {
        let mut builder = self
            .model
            .completion_request(request.prompt.as_str())
            .temperature_opt(request.temperature)
            .max_tokens_opt(request.max_tokens);
        if let Some(system_prompt) = &request.system_prompt {
            builder = builder.preamble(system_prompt.clone());
        }
        if let Some(stop) = &request.stop_sequences {
            builder = builder.additional_params(json!({ "stop": stop }));
        }

        let start = Instant::now();
        let response = self
            .model
            .completion(builder.build())
            .await
            .map_err(map_completion_error)?;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let content: String = response
            .choice
            .iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();

        let mut usage = map_usage(&response.usage);
        if usage == TokenUsage::default() {
            usage = estimate_usage(&request.prompt, &content);
        }

        Ok(Response {
            finish_reason: infer_finish_reason(&usage, request.max_tokens),
            content,
            model: self.model_id.clone(),
            usage,
            duration_ms,
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, AdapterError> {
        Ok(self.models.clone())
    }
}

fn map_usage(usage: &Usage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens,
        estimated_cost: None,
    }
}

fn infer_finish_reason(usage: &TokenUsage, max_tokens: Option<u64>) -> FinishReason {
    match max_tokens {
        Some(max) if max > 0 && usage.completion_tokens >= max => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

/// rig surfaces most provider failures as strings; classify them by message.
fn map_completion_error(error: CompletionError) -> AdapterError {
    let transport = matches!(error, CompletionError::HttpError(_));
    match AdapterError::from_message(error.to_string()) {
        AdapterError::Other(message) if transport => AdapterError::Network(message),
        classified => classified,
    }
}
