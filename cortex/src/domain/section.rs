// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Section catalog used as vocabulary for the curation judgment.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl SectionDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Namespace-scoped source of section definitions.
pub trait SectionCatalog: Send + Sync {
    /// Sections for a namespace. Unknown namespaces yield an empty list.
    fn sections(&self, namespace: &str) -> Vec<SectionDefinition>;
}

/// How ADD operations naming a section outside the catalog are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionPolicy {
    /// Any section name is accepted as a free-form label.
    #[default]
    AcceptFreeForm,
    /// ADDs to sections missing from a non-empty catalog are skipped.
    RejectUnknown,
}

impl SectionPolicy {
    /// An empty catalog constrains nothing under either policy.
    pub fn allows(&self, section: &str, catalog: &[SectionDefinition]) -> bool {
        match self {
            Self::AcceptFreeForm => true,
            Self::RejectUnknown => catalog.is_empty() || catalog.iter().any(|s| s.name == section),
        }
    }
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticSectionCatalog {
    sections: Vec<SectionDefinition>,
}

impl StaticSectionCatalog {
    pub fn new(sections: Vec<SectionDefinition>) -> Self {
        Self { sections }
    }
}

impl SectionCatalog for StaticSectionCatalog {
    fn sections(&self, _namespace: &str) -> Vec<SectionDefinition> {
        self.sections.clone()
    }
}
