// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Playbook aggregates, value objects and the capability interfaces the
//! application layer depends on.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and traits, no I/O

pub mod confidence;
pub mod playbook;
pub mod delta;
pub mod insight;
pub mod curation;
pub mod section;
pub mod events;
pub mod llm;
pub mod embedding;
pub mod judgment;
pub mod repository;
pub mod config;

pub use confidence::confidence;
pub use playbook::*;
pub use delta::*;
pub use insight::*;
pub use curation::*;
pub use section::*;
pub use events::*;
pub use embedding::{EmbeddingError, EmbeddingProvider};
pub use judgment::*;
pub use repository::{PlaybookRepository, RepositoryError};
