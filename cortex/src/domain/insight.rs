// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Trajectories of answered queries and the insights extracted from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::curation::RunStatus;
use super::delta::UsageFeedback;
use super::playbook::BulletId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrajectoryStatus {
    Success,
    Failure,
}

/// Record of one generation: what was retrieved, what was answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub query: String,
    pub namespace: String,
    pub generated_answer: String,
    pub reasoning_steps: Vec<String>,
    pub used_bullet_ids: Vec<BulletId>,
    pub status: TrajectoryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Trajectory {
    pub fn is_success(&self) -> bool {
        self.status == TrajectoryStatus::Success
    }
}

/// Lesson extracted from a trajectory by the reflection judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub error_identification: String,
    #[serde(default)]
    pub root_cause_analysis: String,
    #[serde(default)]
    pub correct_approach: String,
    pub key_insight: String,
}

impl Insight {
    pub fn new(key_insight: impl Into<String>) -> Self {
        Self {
            reasoning: String::new(),
            error_identification: String::new(),
            root_cause_analysis: String::new(),
            correct_approach: String::new(),
            key_insight: key_insight.into(),
        }
    }
}

/// Output of the reflection step, input to curation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionResult {
    pub insights: Vec<Insight>,
    pub bullet_evaluations: Vec<UsageFeedback>,
    pub trajectory_query: String,
    pub namespace: String,
    /// Number of insight-extraction passes actually performed.
    pub iteration_count: u32,
    pub status: RunStatus,
}

impl ReflectionResult {
    pub fn empty(trajectory: &Trajectory, status: RunStatus) -> Self {
        Self {
            insights: Vec::new(),
            bullet_evaluations: Vec::new(),
            trajectory_query: trajectory.query.clone(),
            namespace: trajectory.namespace.clone(),
            iteration_count: 0,
            status,
        }
    }
}
