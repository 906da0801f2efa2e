// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Section definitions loaded from a YAML file keyed by namespace:
//!
//! ```yaml
//! math:
//!   - name: strategies
//!     description: General problem-solving approaches
//! ```

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::domain::{SectionCatalog, SectionDefinition};

#[derive(Debug, Clone, Default)]
pub struct YamlSectionCatalog {
    sections: HashMap<String, Vec<SectionDefinition>>,
}

impl YamlSectionCatalog {
    /// Load the catalog. A missing file yields an empty catalog.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "sections file not found, every namespace is free-form");
                return Ok(Self::default());
            }
            Err(e) => return Err(anyhow::anyhow!("Failed to read {}: {}", path.display(), e)),
        };

        let catalog = Self::from_yaml_str(&content)?;
        info!(path = %path.display(), namespaces = catalog.sections.len(), "Loaded section catalog");
        Ok(catalog)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let sections: Option<HashMap<String, Vec<SectionDefinition>>> = serde_yaml::from_str(yaml)?;
        Ok(Self {
            sections: sections.unwrap_or_default(),
        })
    }
}

impl SectionCatalog for YamlSectionCatalog {
    fn sections(&self, namespace: &str) -> Vec<SectionDefinition> {
        match self.sections.get(namespace) {
            Some(sections) => sections.clone(),
            None => {
                warn!(namespace, "No sections found for namespace");
                Vec::new()
            }
        }
    }
}
