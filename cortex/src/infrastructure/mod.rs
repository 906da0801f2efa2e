// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the playbook cortex

pub mod playbook_store;
pub mod event_bus;
pub mod embedding_client;
pub mod llm;
pub mod llm_judge;
pub mod prompt_templates;
pub mod section_catalog;

pub use playbook_store::{InMemoryPlaybookRepository, JsonPlaybookRepository};
pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use embedding_client::{HashingEmbeddingClient, OpenAIEmbeddingClient};
pub use llm::ProviderRegistry;
pub use llm_judge::LlmJudgmentEngine;
pub use prompt_templates::{PromptRole, PromptTemplates};
pub use section_catalog::YamlSectionCatalog;
