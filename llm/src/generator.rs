//! Retry-wrapped generation followed by continuation and code extraction.

use std::sync::Arc;

use gauge_extract::{clean_code, extract, CodeKind, ExtractionResult};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::adapter::GenerationAdapter;
use crate::classify::{DefaultClassifier, ErrorClassifier};
use crate::config::PipelineConfig;
use crate::continuation::continue_generation;
use crate::discovery::ModelInfo;
use crate::errors::ProviderError;
use crate::retry::{call_with_retry, RetryScope};
use crate::types::{ContinuationResult, GenerationContext, Request, MAX_ATTEMPTS_KEY};

/// One earlier attempt at a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt_number: usize,
    /// Code extracted from that attempt.
    pub extracted_code: String,
    /// Compile or test errors reported for it.
    pub errors: Vec<String>,
}

/// Every error of every attempt, prefixed with its attempt number.
#[must_use]
pub fn accumulated_errors(attempts: &[AttemptRecord]) -> Vec<String> {
    attempts
        .iter()
        .flat_map(|attempt| {
            attempt
                .errors
                .iter()
                .map(move |error| format!("Attempt {}: {}", attempt.attempt_number, error.trim()))
        })
        .collect()
}

/// [`accumulated_errors`], one per line.
#[must_use]
pub fn format_attempt_errors(attempts: &[AttemptRecord]) -> String {
    accumulated_errors(attempts).join("\n")
}

/// The task an attempt belongs to. Seeds the context when the caller does
/// not supply one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTask {
    /// Task identifier, carried into logs and errors.
    pub task_id: String,
    /// Artifact the task expects; drives extraction and cleaning.
    pub expected_kind: CodeKind,
}

impl GenerationTask {
    /// Creates a task descriptor.
    #[must_use]
    pub fn new(task_id: impl Into<String>, expected_kind: CodeKind) -> Self {
        Self {
            task_id: task_id.into(),
            expected_kind,
        }
    }
}

/// Outcome of [`Generator::call_and_extract_code`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeGeneration {
    /// Merged provider output with aggregated usage.
    pub raw_result: ContinuationResult,
    /// Extracted and cleaned code.
    pub extracted_code: String,
    /// Kind the extraction attributed to the code.
    pub code_language: CodeKind,
    /// Full extraction diagnostics.
    pub extraction: ExtractionResult,
}

/// Drives one task attempt against a provider: retries, continuation,
/// extraction.
#[derive(Clone)]
pub struct Generator {
    adapter: Arc<dyn GenerationAdapter>,
    classifier: Arc<dyn ErrorClassifier>,
    config: PipelineConfig,
    template: Request,
    pricing: Option<ModelInfo>,
}

impl Generator {
    /// Creates a generator with the default classifier and configuration.
    #[must_use]
    pub fn new(adapter: Arc<dyn GenerationAdapter>) -> Self {
        Self {
            adapter,
            classifier: Arc::new(DefaultClassifier::default()),
            config: PipelineConfig::default(),
            template: Request::default(),
            pricing: None,
        }
    }

    /// Sets the error classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the pipeline configuration.
    #[must_use]
    pub const fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Request fields (temperature, max tokens, stop sequences, system prompt)
    /// applied to every call; the prompt is replaced per call.
    #[must_use]
    pub fn with_request_defaults(mut self, template: Request) -> Self {
        self.template = template;
        self
    }

    /// Pricing used to fill `estimated_cost` when the provider reports none.
    #[must_use]
    pub fn with_pricing(mut self, model: ModelInfo) -> Self {
        self.pricing = Some(model);
        self
    }

    /// The wrapped adapter.
    #[must_use]
    pub const fn adapter(&self) -> &Arc<dyn GenerationAdapter> {
        &self.adapter
    }

    /// The pipeline configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generates code for one attempt of a task and extracts it.
    ///
    /// Without an explicit `context`, one is built from `task`,
    /// `attempt_number` and the last of `previous_attempts`. Attempt 1 calls `generate`; later
    /// attempts with previous code call `generate_fix` with that code and the
    /// errors of every earlier attempt. Every provider call, continuation
    /// rounds included, is retried according to the configured classifier.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidConfig`] for a rejected configuration
    /// and [`ProviderError::Terminal`] when the initial call fails for good.
    /// A failed continuation round leaves the result truncated with the
    /// failure in `raw_result.round_error`.
    pub async fn call_and_extract_code(
        &self,
        task: &GenerationTask,
        context: Option<GenerationContext>,
        attempt_number: usize,
        previous_attempts: &[AttemptRecord],
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<CodeGeneration, ProviderError> {
        self.config.validate()?;
        let context = self.prepare_context(task, context, attempt_number, previous_attempts);

        let mut request = self.template.with_prompt(prompt);
        if let Some(system_prompt) = system_prompt {
            request.system_prompt = Some(system_prompt.to_string());
        }

        let span = tracing::info_span!(
            "generation_chain",
            chain_id = %Uuid::new_v4(),
            task_id = %context.task_id,
            attempt = attempt_number,
            provider = self.adapter.name(),
        );

        self.run_chain(request, context, attempt_number)
            .instrument(span)
            .await
    }

    fn prepare_context(
        &self,
        task: &GenerationTask,
        context: Option<GenerationContext>,
        attempt_number: usize,
        previous_attempts: &[AttemptRecord],
    ) -> GenerationContext {
        let mut context = context.unwrap_or_else(|| {
            GenerationContext::new(task.task_id.clone(), attempt_number)
                .with_expected_kind(task.expected_kind)
        });

        if let Some(last) = previous_attempts.last() {
            if context.previous_code.is_none() {
                context.previous_code = Some(last.extracted_code.clone());
            }
            if context.previous_errors.is_empty() {
                context.previous_errors = accumulated_errors(previous_attempts);
            }
        }
        if !context.metadata.contains_key(MAX_ATTEMPTS_KEY) {
            context = context.with_max_attempts(self.config.max_attempts);
        }
        context
    }

    async fn run_chain(
        &self,
        request: Request,
        context: GenerationContext,
        attempt_number: usize,
    ) -> Result<CodeGeneration, ProviderError> {
        let adapter = self.adapter.as_ref();
        let classifier = self.classifier.as_ref();
        let retry = self.config.retry;
        let scope = RetryScope::new(adapter.name(), &context.task_id, attempt_number);

        let fix = (attempt_number > 1)
            .then(|| context.previous_code.clone())
            .flatten();

        let initial = match &fix {
            Some(code) => {
                call_with_retry(
                    || adapter.generate_fix(&request, code, &context.previous_errors, &context),
                    classifier,
                    &scope,
                    &retry,
                )
                .await?
            }
            None => {
                call_with_retry(
                    || adapter.generate(&request, &context),
                    classifier,
                    &scope,
                    &retry,
                )
                .await?
            }
        };

        let mut raw_result = continue_generation(
            initial,
            &request,
            &context,
            &self.config.continuation,
            |next, ctx| {
                let scope = &scope;
                async move {
                    call_with_retry(|| adapter.generate(&next, &ctx), classifier, scope, &retry)
                        .await
                }
            },
        )
        .await;

        if raw_result.response.usage.estimated_cost.is_none() {
            if let Some(pricing) = &self.pricing {
                raw_result.response.usage.estimated_cost =
                    pricing.estimate_cost(&raw_result.response.usage);
            }
        }

        let extraction = extract(raw_result.content(), context.expected_kind);
        let extracted_code = clean_code(&extraction.code, context.expected_kind);

        Ok(CodeGeneration {
            raw_result,
            extracted_code,
            code_language: extraction.language,
            extraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulated_errors_keep_attempt_numbers() {
        let attempts = vec![
            AttemptRecord {
                attempt_number: 1,
                extracted_code: "a".into(),
                errors: vec!["AL0118: unknown".into()],
            },
            AttemptRecord {
                attempt_number: 2,
                extracted_code: "b".into(),
                errors: vec![" test failed ".into(), "AL0104: syntax".into()],
            },
        ];

        assert_eq!(
            format_attempt_errors(&attempts),
            "Attempt 1: AL0118: unknown\nAttempt 2: test failed\nAttempt 2: AL0104: syntax"
        );
    }

    #[test]
    fn test_default_context_comes_from_task() {
        let generator = Generator::new(Arc::new(crate::adapters::ScriptedAdapter::from_responses([
            crate::types::Response::default(),
        ])));
        let task = GenerationTask::new("CG-AL-D007", CodeKind::Diff);
        let previous = [AttemptRecord {
            attempt_number: 1,
            extracted_code: "--- a/x.al".into(),
            errors: vec!["hunk rejected".into()],
        }];

        let context = generator.prepare_context(&task, None, 2, &previous);

        assert_eq!(context.task_id, "CG-AL-D007");
        assert_eq!(context.expected_kind, CodeKind::Diff);
        assert_eq!(context.attempt, 2);
        assert_eq!(context.previous_code.as_deref(), Some("--- a/x.al"));
        assert_eq!(context.max_attempts(), 3);

        let explicit = GenerationContext::new("CG-AL-E001", 1);
        let kept = generator.prepare_context(&task, Some(explicit), 1, &[]);
        assert_eq!(kept.task_id, "CG-AL-E001");
        assert_eq!(kept.expected_kind, CodeKind::Al);
    }

    #[test]
    fn test_no_attempts_no_errors() {
        assert!(accumulated_errors(&[]).is_empty());
        assert_eq!(format_attempt_errors(&[]), "");
    }
}
