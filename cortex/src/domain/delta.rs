// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Curation instructions and usage feedback.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::playbook::BulletId;

/// Typed playbook mutation proposed by the curation judgment step.
///
/// `reasoning` is audit text only and never drives control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum DeltaOperation {
    Add {
        section: String,
        content: String,
        #[serde(default)]
        reasoning: String,
    },
    Update {
        bullet_id: BulletId,
        content: String,
        #[serde(default)]
        reasoning: String,
    },
    Delete {
        bullet_id: BulletId,
        #[serde(default)]
        reasoning: String,
    },
}

impl DeltaOperation {
    pub fn add(section: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Add {
            section: section.into(),
            content: content.into(),
            reasoning: String::new(),
        }
    }

    pub fn update(bullet_id: impl Into<BulletId>, content: impl Into<String>) -> Self {
        Self::Update {
            bullet_id: bullet_id.into(),
            content: content.into(),
            reasoning: String::new(),
        }
    }

    pub fn delete(bullet_id: impl Into<BulletId>) -> Self {
        Self::Delete {
            bullet_id: bullet_id.into(),
            reasoning: String::new(),
        }
    }

    pub fn kind(&self) -> DeltaKind {
        match self {
            Self::Add { .. } => DeltaKind::Add,
            Self::Update { .. } => DeltaKind::Update,
            Self::Delete { .. } => DeltaKind::Delete,
        }
    }

    /// Target bullet, if the operation has one.
    pub fn target(&self) -> Option<&BulletId> {
        match self {
            Self::Add { .. } => None,
            Self::Update { bullet_id, .. } | Self::Delete { bullet_id, .. } => Some(bullet_id),
        }
    }

    pub fn reasoning(&self) -> &str {
        match self {
            Self::Add { reasoning, .. }
            | Self::Update { reasoning, .. }
            | Self::Delete { reasoning, .. } => reasoning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeltaKind {
    Add,
    Update,
    Delete,
}

impl DeltaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackTag {
    Helpful,
    Harmful,
    Neutral,
}

impl FeedbackTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Helpful => "helpful",
            Self::Harmful => "harmful",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for FeedbackTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Judgment of one bullet's contribution to one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageFeedback {
    pub bullet_id: BulletId,
    pub tag: FeedbackTag,
    #[serde(default)]
    pub reason: String,
}

impl UsageFeedback {
    pub fn new(bullet_id: impl Into<BulletId>, tag: FeedbackTag, reason: impl Into<String>) -> Self {
        Self {
            bullet_id: bullet_id.into(),
            tag,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_wire_format() {
        let json = r#"[
            {"type": "ADD", "section": "tips", "content": "new fact", "reasoning": "r"},
            {"type": "UPDATE", "bullet_id": "u1", "content": "better", "reasoning": "r"},
            {"type": "DELETE", "bullet_id": "u2", "reasoning": "stale"}
        ]"#;
        let deltas: Vec<DeltaOperation> = serde_json::from_str(json).unwrap();
        assert_eq!(deltas[0].kind(), DeltaKind::Add);
        assert_eq!(deltas[1].target(), Some(&BulletId::from("u1")));
        assert_eq!(deltas[2].kind(), DeltaKind::Delete);
        assert_eq!(deltas[2].reasoning(), "stale");

        let back = serde_json::to_value(&deltas[0]).unwrap();
        assert_eq!(back["type"], "ADD");
    }

    #[test]
    fn test_feedback_tag_serde() {
        let feedback: UsageFeedback =
            serde_json::from_str(r#"{"bullet_id": "u1", "tag": "harmful", "reason": "misled"}"#).unwrap();
        assert_eq!(feedback.tag, FeedbackTag::Harmful);
        assert!(serde_json::from_str::<FeedbackTag>(r#""unknown""#).is_err());
    }
}
