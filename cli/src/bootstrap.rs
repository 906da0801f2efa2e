// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Composition root
//!
//! Wires configuration into concrete adapters and application services.
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** The only place that picks implementations for the cortex traits
//!
//! Commands and the HTTP server receive a [`Cortex`] and never construct
//! adapters themselves. Tests build one with [`Cortex::assemble`] and fakes.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use playbook_cortex::application::{CuratorService, FeedbackLoop, GeneratorService, HybridSearch, ReflectorService};
use playbook_cortex::domain::config::{resolve_secret, CortexConfigManifest, EmbeddingProviderType};
use playbook_cortex::domain::{
    AnswerGenerator, EmbeddingProvider, JudgmentEngine, PlaybookRepository, SectionCatalog, StaticSectionCatalog,
};
use playbook_cortex::infrastructure::{
    EventBus, HashingEmbeddingClient, JsonPlaybookRepository, LlmJudgmentEngine, OpenAIEmbeddingClient,
    PromptTemplates, ProviderRegistry, YamlSectionCatalog,
};

/// Capability handles a cortex is assembled from.
pub struct Engines {
    pub repository: Arc<dyn PlaybookRepository>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub judgment: Arc<dyn JudgmentEngine>,
    pub answerer: Arc<dyn AnswerGenerator>,
    pub sections: Arc<dyn SectionCatalog>,
}

/// Fully wired services for one configuration.
pub struct Cortex {
    pub config: CortexConfigManifest,
    pub repository: Arc<dyn PlaybookRepository>,
    pub search: Arc<HybridSearch>,
    pub events: EventBus,
    pub generator: Arc<GeneratorService>,
    pub reflector: Arc<ReflectorService>,
    pub curator: Arc<CuratorService>,
    pub feedback_loop: Arc<FeedbackLoop>,
}

impl Cortex {
    /// Build the production wiring from configuration.
    pub fn from_config(config: CortexConfigManifest) -> Result<Self> {
        let spec = &config.spec;

        let repository: Arc<dyn PlaybookRepository> = Arc::new(JsonPlaybookRepository::new(&spec.playbook.data_dir));

        let embedder: Arc<dyn EmbeddingProvider> = match spec.embedding.provider_type {
            EmbeddingProviderType::Openai => {
                let api_key = resolve_secret(&spec.embedding.api_key).context("Failed to resolve embedding API key")?;
                Arc::new(OpenAIEmbeddingClient::new(
                    spec.embedding.endpoint.clone(),
                    api_key,
                    spec.embedding.model.clone(),
                ))
            }
            EmbeddingProviderType::Hashing => Arc::new(HashingEmbeddingClient::new(spec.embedding.dimensions)),
        };

        let registry = Arc::new(ProviderRegistry::from_config(&config).context("Failed to initialize LLM providers")?);
        let templates = Arc::new(PromptTemplates::new(spec.prompts.dir.clone()));
        let engine = Arc::new(LlmJudgmentEngine::new(registry, templates, spec.models.clone()));

        let sections: Arc<dyn SectionCatalog> = match &spec.curation.sections_path {
            Some(path) => Arc::new(
                YamlSectionCatalog::from_file(path)
                    .with_context(|| format!("Failed to load sections from {}", path.display()))?,
            ),
            None => Arc::new(StaticSectionCatalog::default()),
        };

        let engines = Engines {
            repository,
            embedder,
            judgment: engine.clone(),
            answerer: engine,
            sections,
        };
        Self::assemble(config, engines)
    }

    /// Wire services around the given capabilities.
    pub fn assemble(config: CortexConfigManifest, engines: Engines) -> Result<Self> {
        let spec = &config.spec;

        let search = Arc::new(
            HybridSearch::new(engines.embedder, spec.search.alpha).context("Invalid search configuration")?,
        );
        let events = EventBus::with_default_capacity();

        let generator = Arc::new(
            GeneratorService::new(engines.repository.clone(), search.clone(), engines.answerer)
                .with_retrieval(spec.search.top_k, spec.search.min_confidence),
        );
        let reflector = Arc::new(
            ReflectorService::new(engines.repository.clone(), engines.judgment.clone())
                .with_max_iterations(spec.reflection.max_iterations),
        );
        let curator = Arc::new(
            CuratorService::new(
                engines.repository.clone(),
                engines.judgment,
                engines.sections,
                Arc::new(events.clone()),
            )
            .with_section_policy(spec.curation.section_policy),
        );
        let feedback_loop = Arc::new(FeedbackLoop::new(generator.clone(), reflector.clone(), curator.clone()));

        info!(
            data_dir = %spec.playbook.data_dir.display(),
            alpha = spec.search.alpha,
            top_k = spec.search.top_k,
            "Cortex services initialized"
        );

        Ok(Self {
            repository: engines.repository,
            search,
            events,
            generator,
            reflector,
            curator,
            feedback_loop,
            config,
        })
    }
}
