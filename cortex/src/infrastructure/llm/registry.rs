// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Model Alias Resolution and Provider Management
//
// Resolves the role aliases (generator, reflector, curator) to concrete
// adapters. Each alias gets its own adapter bound to its model. Failed calls
// are retried with exponential backoff; the last attempt goes to the
// fallback provider when one is configured.

use crate::domain::config::{resolve_secret, CortexConfigManifest, LLMProviderConfig, ModelConfig};
use crate::domain::llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;

struct AliasBinding {
    provider_name: String,
    provider: Arc<dyn LLMProvider>,
}

/// Registry for managing LLM providers and resolving model aliases
pub struct ProviderRegistry {
    aliases: HashMap<String, AliasBinding>,
    fallback: Option<Arc<dyn LLMProvider>>,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl ProviderRegistry {
    /// Registry with no providers; populate it with [`ProviderRegistry::register`].
    pub fn new(max_retries: u32, retry_delay_ms: u64) -> Self {
        Self {
            aliases: HashMap::new(),
            fallback: None,
            max_retries: max_retries.max(1),
            retry_delay_ms,
        }
    }

    /// Create provider registry from the cortex manifest
    pub fn from_config(config: &CortexConfigManifest) -> anyhow::Result<Self> {
        let selection = &config.spec.llm_selection;
        let mut registry = Self::new(selection.max_retries, selection.retry_delay_ms);

        info!("Initializing LLM provider registry");

        for provider_config in &config.spec.llm_providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            let api_key = match resolve_secret(&provider_config.api_key) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", provider_config.name, e);
                    continue;
                }
            };

            for model_config in &provider_config.models {
                match Self::create_provider(provider_config, model_config, &api_key) {
                    Ok(provider) => {
                        info!(
                            "Mapping alias '{}' -> {} ({})",
                            model_config.alias, model_config.model, provider_config.name
                        );
                        registry.register(&model_config.alias, &provider_config.name, provider.clone());

                        let is_fallback =
                            selection.fallback_provider.as_deref() == Some(provider_config.name.as_str());
                        if is_fallback && registry.fallback.is_none() {
                            registry.fallback = Some(provider);
                        }
                    }
                    Err(e) => {
                        warn!("Failed to initialize provider '{}': {}", provider_config.name, e);
                    }
                }
            }
        }

        if registry.aliases.is_empty() {
            warn!("No LLM providers configured - reflection and curation will not be available");
        }

        Ok(registry)
    }

    /// Create a provider instance bound to one model
    fn create_provider(
        config: &LLMProviderConfig,
        model: &ModelConfig,
        api_key: &str,
    ) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let provider: Arc<dyn LLMProvider> = match config.provider_type.as_str() {
            // OpenAI-compatible APIs (LM Studio, vLLM, etc.) share the adapter
            "openai" | "openai-compatible" => Arc::new(OpenAIAdapter::new(
                config.endpoint.clone(),
                api_key.to_string(),
                model.model.clone(),
            )),
            "ollama" => Arc::new(OllamaAdapter::new(config.endpoint.clone(), model.model.clone())),
            _ => anyhow::bail!("Unsupported provider type: {}", config.provider_type),
        };

        Ok(provider)
    }

    /// Bind an alias to a provider, replacing any previous binding
    pub fn register(&mut self, alias: &str, provider_name: &str, provider: Arc<dyn LLMProvider>) {
        self.aliases.insert(
            alias.to_string(),
            AliasBinding {
                provider_name: provider_name.to_string(),
                provider,
            },
        );
    }

    pub fn with_fallback(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.fallback = Some(provider);
        self
    }

    /// Generate text using a model alias
    /// Transient errors are retried with backoff; the fallback provider gets the last word
    pub async fn generate(
        &self,
        alias: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let binding = self
            .aliases
            .get(alias)
            .ok_or_else(|| LLMError::ModelNotFound(format!("Model alias '{}' not found", alias)))?;

        let mut last_error = None;

        for attempt in 0..self.max_retries {
            match binding.provider.generate(prompt, options).await {
                Ok(response) => {
                    metrics::counter!("playbook_llm_requests_total", "alias" => alias.to_string(), "outcome" => "ok")
                        .increment(1);
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        alias,
                        provider = %binding.provider_name,
                        "Generation failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    let retryable = e.is_retryable();
                    last_error = Some(e);

                    if !retryable || attempt + 1 == self.max_retries {
                        if let Some(fallback) = &self.fallback {
                            info!(alias, "Trying fallback provider");
                            metrics::counter!("playbook_llm_requests_total", "alias" => alias.to_string(), "outcome" => "fallback")
                                .increment(1);
                            return fallback.generate(prompt, options).await;
                        }
                        break;
                    }

                    // Exponential backoff
                    tokio::time::sleep(tokio::time::Duration::from_millis(
                        self.retry_delay_ms.saturating_mul(2_u64.saturating_pow(attempt)),
                    ))
                    .await;
                }
            }
        }

        metrics::counter!("playbook_llm_requests_total", "alias" => alias.to_string(), "outcome" => "error")
            .increment(1);
        Err(last_error.unwrap_or_else(|| LLMError::Provider("Unknown error".into())))
    }

    /// Check health of every bound alias
    pub async fn health_check_all(&self) -> HashMap<String, Result<(), LLMError>> {
        let mut results = HashMap::new();

        for (alias, binding) in &self.aliases {
            info!("Health checking alias: {} ({})", alias, binding.provider_name);
            results.insert(alias.clone(), binding.provider.health_check().await);
        }

        results
    }

    /// Get list of available model aliases, sorted
    pub fn available_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.aliases.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    /// Check if a model alias exists
    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{LLMSelection, ModelConfig};
    use crate::domain::llm::{FinishReason, TokenUsage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures_left: AtomicU32,
        calls: AtomicU32,
        reply: &'static str,
    }

    impl Flaky {
        fn new(failures: u32, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                reply,
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Flaky {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<GenerationResponse, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(LLMError::Network("connection reset".into()));
            }
            Ok(GenerationResponse {
                text: self.reply.to_string(),
                usage: TokenUsage::default(),
                provider: "test".into(),
                model: "test".into(),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn provider(name: &str, provider_type: &str, aliases: &[(&str, &str)]) -> LLMProviderConfig {
        LLMProviderConfig {
            name: name.to_string(),
            provider_type: provider_type.to_string(),
            endpoint: "http://localhost:11434".to_string(),
            api_key: None,
            enabled: true,
            models: aliases
                .iter()
                .map(|(alias, model)| ModelConfig {
                    alias: alias.to_string(),
                    model: model.to_string(),
                    context_window: Some(8192),
                })
                .collect(),
        }
    }

    #[test]
    fn test_registry_creation() {
        let mut config = CortexConfigManifest::default();
        config.spec.llm_providers = vec![
            provider("local", "ollama", &[("default", "llama3.2"), ("fast", "qwen2.5")]),
            provider("vllm", "openai-compatible", &[("smart", "mistral")]),
            provider("mystery", "carrier-pigeon", &[("slow", "bird")]),
        ];
        config.spec.llm_selection = LLMSelection {
            fallback_provider: Some("local".into()),
            ..LLMSelection::default()
        };

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.available_aliases(), vec!["default", "fast", "smart"]);
        assert!(!registry.has_alias("slow"));
        assert!(registry.fallback.is_some());
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let flaky = Flaky::new(2, "ok");
        let mut registry = ProviderRegistry::new(3, 1);
        registry.register("default", "flaky", flaky.clone());

        let response = registry.generate("default", "p", &GenerationOptions::default()).await.unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_last_attempt_uses_fallback() {
        let broken = Flaky::new(u32::MAX, "never");
        let backup = Flaky::new(0, "from fallback");
        let mut registry = ProviderRegistry::new(2, 1).with_fallback(backup.clone());
        registry.register("default", "broken", broken.clone());

        let response = registry.generate("default", "p", &GenerationOptions::default()).await.unwrap();
        assert_eq!(response.text, "from fallback");
        assert_eq!(broken.calls.load(Ordering::SeqCst), 2);
        assert_eq!(backup.calls.load(Ordering::SeqCst), 1);
    }

    struct BadKey {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LLMProvider for BadKey {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<GenerationResponse, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LLMError::Authentication("invalid api key".into()))
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_authentication_failure_is_not_retried() {
        let rejected = Arc::new(BadKey { calls: AtomicU32::new(0) });
        let mut registry = ProviderRegistry::new(3, 1);
        registry.register("default", "openai", rejected.clone());

        let result = registry.generate("default", "p", &GenerationOptions::default()).await;
        assert!(matches!(result, Err(LLMError::Authentication(_))));
        assert_eq!(rejected.calls.load(Ordering::SeqCst), 1);

        let backup = Flaky::new(0, "from fallback");
        let registry = {
            let mut r = ProviderRegistry::new(3, 1).with_fallback(backup.clone());
            r.register("default", "openai", rejected.clone());
            r
        };
        let response = registry.generate("default", "p", &GenerationOptions::default()).await.unwrap();
        assert_eq!(response.text, "from fallback");
        assert_eq!(rejected.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_alias() {
        let registry = ProviderRegistry::new(3, 1);
        let result = registry.generate("ghost", "p", &GenerationOptions::default()).await;
        assert!(matches!(result, Err(LLMError::ModelNotFound(_))));
    }
}
