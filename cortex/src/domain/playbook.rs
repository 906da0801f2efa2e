// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Playbook aggregate and its bullets.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::confidence::confidence;

/// Opaque bullet identifier, stable across updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BulletId(pub String);

impl BulletId {
    /// Fresh globally-unique identifier for a newly added bullet.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BulletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BulletId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BulletId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One discrete, retrievable piece of curated knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub id: BulletId,
    pub section: String,
    /// Text shown to the generation step.
    pub content: String,
    /// Text used for retrieval matching.
    pub searchable_text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub helpful: u64,
    #[serde(default)]
    pub harmful: u64,
    #[serde(default)]
    pub source_trajectory: String,
}

impl Bullet {
    /// New bullet with zero counters and no provenance.
    pub fn new(section: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: BulletId::generate(),
            section: section.into(),
            searchable_text: content.clone(),
            content,
            keywords: Vec::new(),
            helpful: 0,
            harmful: 0,
            source_trajectory: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<BulletId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_counters(mut self, helpful: u64, harmful: u64) -> Self {
        self.helpful = helpful;
        self.harmful = harmful;
        self
    }

    pub fn confidence_score(&self) -> f64 {
        confidence(self.helpful, self.harmful)
    }

    /// Replace both the displayed and the searchable text.
    ///
    /// Counters and id are untouched: an update does not reset trust.
    pub fn rewrite(&mut self, content: &str) {
        self.content = content.to_string();
        self.searchable_text = content.to_string();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for PlaybookMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }
}

/// Ordered collection of bullets for one namespace.
///
/// Order is insertion order. It carries no meaning for retrieval but is kept
/// for display and as the deterministic tie-break when ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    #[serde(default)]
    pub metadata: PlaybookMetadata,
    #[serde(default)]
    pub bullets: Vec<Bullet>,
}

impl Playbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bullets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bullets.is_empty()
    }

    pub fn position(&self, id: &BulletId) -> Option<usize> {
        self.bullets.iter().position(|b| &b.id == id)
    }

    pub fn get(&self, id: &BulletId) -> Option<&Bullet> {
        self.bullets.iter().find(|b| &b.id == id)
    }

    pub fn get_mut(&mut self, id: &BulletId) -> Option<&mut Bullet> {
        self.bullets.iter_mut().find(|b| &b.id == id)
    }

    pub fn contains(&self, id: &BulletId) -> bool {
        self.position(id).is_some()
    }

    pub fn push(&mut self, bullet: Bullet) {
        self.bullets.push(bullet);
    }

    /// Remove a bullet, preserving the order of the rest.
    pub fn remove(&mut self, id: &BulletId) -> Option<Bullet> {
        let index = self.position(id)?;
        Some(self.bullets.remove(index))
    }

    /// Id → position index, valid until the next insertion or removal.
    pub fn index(&self) -> HashMap<BulletId, usize> {
        self.bullets
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id.clone(), i))
            .collect()
    }

    /// First id that occurs more than once, if any.
    pub fn duplicate_id(&self) -> Option<&BulletId> {
        let mut seen = std::collections::HashSet::with_capacity(self.bullets.len());
        self.bullets.iter().map(|b| &b.id).find(|id| !seen.insert(*id))
    }

    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }

    /// Distinct section names in first-seen order.
    pub fn sections(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for bullet in &self.bullets {
            if !seen.contains(&bullet.section.as_str()) {
                seen.push(bullet.section.as_str());
            }
        }
        seen
    }
}
