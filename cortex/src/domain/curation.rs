// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Outcome types for curation runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::delta::{DeltaKind, DeltaOperation};

/// Status carried by every workflow result instead of an error escaping the
/// core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Part of the run failed but what was safely produced is returned.
    Degraded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }

    /// Combine two statuses, keeping the worse one.
    pub fn worst(self, other: RunStatus) -> RunStatus {
        use RunStatus::*;
        match (self, other) {
            (Failed, _) | (_, Failed) => Failed,
            (Degraded, _) | (_, Degraded) => Degraded,
            _ => Success,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one curation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurationSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Delta operations that were not applied (unknown id, rejected section).
    pub skipped: usize,
    pub feedback_applied: usize,
    pub feedback_skipped: usize,
    pub bullets_before: usize,
    pub bullets_after: usize,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub note: String,
}

impl CurationSummary {
    /// Summary for a run that changed nothing.
    pub fn unchanged(bullets: usize, note: impl Into<String>) -> Self {
        Self {
            bullets_before: bullets,
            bullets_after: bullets,
            note: note.into(),
            ..Default::default()
        }
    }

    pub fn count(&self, kind: DeltaKind) -> usize {
        match kind {
            DeltaKind::Add => self.added,
            DeltaKind::Update => self.updated,
            DeltaKind::Delete => self.deleted,
        }
    }
}

impl fmt::Display for CurationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ADD: {}, UPDATE: {}, DELETE: {}",
            self.added, self.updated, self.deleted
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationResult {
    pub status: RunStatus,
    /// Operations actually applied, in application order.
    pub deltas: Vec<DeltaOperation>,
    pub summary: CurationSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display() {
        let summary = CurationSummary {
            added: 1,
            bullets_before: 3,
            bullets_after: 4,
            ..Default::default()
        };
        assert_eq!(summary.to_string(), "ADD: 1, UPDATE: 0, DELETE: 0");
        assert_eq!(summary.count(DeltaKind::Add), 1);
    }

    #[test]
    fn test_worst_status() {
        assert_eq!(RunStatus::Success.worst(RunStatus::Success), RunStatus::Success);
        assert_eq!(RunStatus::Success.worst(RunStatus::Degraded), RunStatus::Degraded);
        assert_eq!(RunStatus::Degraded.worst(RunStatus::Failed), RunStatus::Failed);
    }

    #[test]
    fn test_unchanged_summary() {
        let summary = CurationSummary::unchanged(7, "store unavailable");
        assert_eq!(summary.bullets_before, 7);
        assert_eq!(summary.bullets_after, 7);
        assert_eq!(summary.to_string(), "ADD: 0, UPDATE: 0, DELETE: 0");
    }
}
