// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain LLMProvider interface and one
// vendor API. The registry maps model aliases to adapters.

pub mod openai;
pub mod ollama;
pub mod registry;

pub use registry::ProviderRegistry;
