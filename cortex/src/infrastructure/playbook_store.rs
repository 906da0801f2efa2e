// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Playbook persistence: one JSON document per namespace on disk, plus an
//! in-memory store for tests and ephemeral runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::{Playbook, PlaybookRepository, RepositoryError};

/// Namespaces become file names, so only a conservative character set is accepted.
pub fn validate_namespace(namespace: &str) -> Result<(), RepositoryError> {
    let valid = !namespace.is_empty()
        && !namespace.starts_with('.')
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::InvalidNamespace(namespace.to_string()))
    }
}

/// File-backed repository storing `<data_dir>/<namespace>.json`.
pub struct JsonPlaybookRepository {
    data_dir: PathBuf,
}

impl JsonPlaybookRepository {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, namespace: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", namespace))
    }
}

#[async_trait]
impl PlaybookRepository for JsonPlaybookRepository {
    async fn load(&self, namespace: &str) -> Result<Playbook, RepositoryError> {
        validate_namespace(namespace)?;
        let path = self.path_for(namespace);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(namespace, path = %path.display(), "No stored playbook, starting empty");
                return Ok(Playbook::new());
            }
            Err(e) => return Err(e.into()),
        };

        let playbook: Playbook = serde_json::from_str(&content).map_err(|e| RepositoryError::Corrupt {
            namespace: namespace.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(id) = playbook.duplicate_id() {
            return Err(RepositoryError::Corrupt {
                namespace: namespace.to_string(),
                reason: format!("duplicate bullet id '{}'", id),
            });
        }
        Ok(playbook)
    }

    async fn save(&self, namespace: &str, playbook: &mut Playbook) -> Result<(), RepositoryError> {
        validate_namespace(namespace)?;
        playbook.touch();

        let json = serde_json::to_string_pretty(playbook).map_err(|e| RepositoryError::Corrupt {
            namespace: namespace.to_string(),
            reason: format!("serialization failed: {}", e),
        })?;

        tokio::fs::create_dir_all(&self.data_dir).await?;
        let path = self.path_for(namespace);
        let tmp = self.data_dir.join(format!("{}.json.tmp", namespace));
        tokio::fs::write(&tmp, json).await?;
        // Readers see either the old or the new document, never a partial one
        tokio::fs::rename(&tmp, &path).await?;

        info!(namespace, bullets = playbook.len(), path = %path.display(), "Saved playbook");
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, RepositoryError> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut namespaces = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                namespaces.push(stem.to_string());
            }
        }
        namespaces.sort();
        Ok(namespaces)
    }
}

/// In-memory implementation of PlaybookRepository for testing
pub struct InMemoryPlaybookRepository {
    playbooks: Arc<RwLock<HashMap<String, Playbook>>>,
}

impl InMemoryPlaybookRepository {
    pub fn new() -> Self {
        Self {
            playbooks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a playbook as-is, without touching its metadata.
    pub async fn seed(&self, namespace: &str, playbook: Playbook) {
        self.playbooks.write().await.insert(namespace.to_string(), playbook);
    }
}

impl Default for InMemoryPlaybookRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybookRepository for InMemoryPlaybookRepository {
    async fn load(&self, namespace: &str) -> Result<Playbook, RepositoryError> {
        let playbooks = self.playbooks.read().await;
        Ok(playbooks.get(namespace).cloned().unwrap_or_default())
    }

    async fn save(&self, namespace: &str, playbook: &mut Playbook) -> Result<(), RepositoryError> {
        playbook.touch();
        let mut playbooks = self.playbooks.write().await;
        playbooks.insert(namespace.to_string(), playbook.clone());
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, RepositoryError> {
        let playbooks = self.playbooks.read().await;
        let mut namespaces: Vec<String> = playbooks.keys().cloned().collect();
        namespaces.sort();
        Ok(namespaces)
    }
}
