// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;

use super::playbook::Playbook;

/// Per-namespace playbook persistence.
#[async_trait]
pub trait PlaybookRepository: Send + Sync {
    /// Load a namespace. A namespace that was never saved is an empty
    /// playbook, not an error.
    async fn load(&self, namespace: &str) -> Result<Playbook, RepositoryError>;

    /// Persist a namespace, refreshing `metadata.updated_at` first.
    async fn save(&self, namespace: &str, playbook: &mut Playbook) -> Result<(), RepositoryError>;

    /// Namespaces that currently have persisted state.
    async fn list_namespaces(&self) -> Result<Vec<String>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Playbook for namespace '{namespace}' is corrupt: {reason}")]
    Corrupt { namespace: String, reason: String },

    #[error("Invalid namespace '{0}'")]
    InvalidNamespace(String),
}
