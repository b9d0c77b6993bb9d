//! Model discovery with an instance-owned, TTL-bounded cache.
//!
//! Each [`ModelCatalog`] owns its cache, so independent catalogs (and tests)
//! never observe each other's entries.
//!
//! # Example
//!
//! ```no_run
//! # async fn example(adapter: &dyn gauge_llm::adapter::GenerationAdapter) {
//! use gauge_llm::discovery::ModelCatalog;
//! use std::time::Duration;
//!
//! let catalog = ModelCatalog::new(Duration::from_secs(300));
//! for model in catalog.models(adapter).await.unwrap_or_default() {
//!     println!("{}: {:?}", model.id, model.max_output_tokens);
//! }
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::adapter::GenerationAdapter;
use crate::errors::AdapterError;
use crate::types::TokenUsage;

/// A model offered by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier as the provider expects it.
    pub id: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window in tokens.
    pub max_context_tokens: Option<u64>,
    /// Maximum tokens the model can generate in one response.
    pub max_output_tokens: Option<u64>,
    /// Whether the model streams responses.
    pub supports_streaming: bool,
    /// Cost per 1M input tokens (in USD).
    pub cost_per_million_input_tokens: Option<f64>,
    /// Cost per 1M output tokens (in USD).
    pub cost_per_million_output_tokens: Option<f64>,
}

impl ModelInfo {
    /// Creates a model entry without limits or pricing.
    #[must_use]
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            ..Self::default()
        }
    }

    /// Sets per-million-token prices in USD.
    #[must_use]
    pub const fn with_pricing(mut self, input: f64, output: f64) -> Self {
        self.cost_per_million_input_tokens = Some(input);
        self.cost_per_million_output_tokens = Some(output);
        self
    }

    /// Sets the output-token cap.
    #[must_use]
    pub const fn with_max_output_tokens(mut self, max: u64) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    /// Cost of `usage` in USD, or `None` when the model has no pricing.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate_cost(&self, usage: &TokenUsage) -> Option<f64> {
        if self.cost_per_million_input_tokens.is_none()
            && self.cost_per_million_output_tokens.is_none()
        {
            return None;
        }
        let input = self.cost_per_million_input_tokens.unwrap_or(0.0);
        let output = self.cost_per_million_output_tokens.unwrap_or(0.0);
        Some(
            (usage.prompt_tokens as f64).mul_add(input, usage.completion_tokens as f64 * output)
                / 1_000_000.0,
        )
    }
}

struct CachedModels {
    fetched_at: Instant,
    models: Vec<ModelInfo>,
}

/// Per-provider cache of [`ModelInfo`] lists.
#[derive(Clone)]
pub struct ModelCatalog {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, CachedModels>>>,
}

impl ModelCatalog {
    /// Creates an empty catalog whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Models offered by `adapter`, refreshed through `list_models` when the
    /// cached entry is missing or older than the TTL.
    ///
    /// # Errors
    ///
    /// Returns the adapter error when a refresh fails; a stale entry is not
    /// served in that case.
    ///
    /// The cache lock is not held while `list_models` runs, so a slow
    /// provider does not hold up lookups for other providers.
    pub async fn models(&self, adapter: &dyn GenerationAdapter) -> Result<Vec<ModelInfo>, AdapterError> {
        let provider = adapter.name().to_string();

        let fresh = self
            .entries
            .lock()
            .await
            .get(&provider)
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.models.clone());
        if let Some(models) = fresh {
            return Ok(models);
        }

        let models = adapter.list_models().await?;
        tracing::info!(
            event = "model_catalog_refresh",
            provider = %provider,
            models = models.len(),
            "model_catalog_refresh"
        );
        self.entries.lock().await.insert(
            provider,
            CachedModels {
                fetched_at: Instant::now(),
                models: models.clone(),
            },
        );
        Ok(models)
    }

    /// Looks up one model by id.
    ///
    /// # Errors
    ///
    /// Returns the adapter error when a refresh fails.
    pub async fn find(
        &self,
        adapter: &dyn GenerationAdapter,
        model_id: &str,
    ) -> Result<Option<ModelInfo>, AdapterError> {
        Ok(self
            .models(adapter)
            .await?
            .into_iter()
            .find(|model| model.id == model_id))
    }

    /// Drops the cached entry of one provider.
    pub async fn invalidate(&self, provider: &str) {
        self.entries.lock().await.remove(provider);
    }

    /// Drops every cached entry.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
