// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Feedback Loop
//!
//! Sequences one task through generate → judge → reflect → curate.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Closes the loop between retrieval and curation
//!
//! The stages are exposed individually ([`FeedbackLoop::infer`],
//! [`FeedbackLoop::reflect`], [`FeedbackLoop::curate`]) so batch runs can
//! checkpoint each stage, and chained by [`FeedbackLoop::run`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::curator::CuratorService;
use crate::application::generator::GeneratorService;
use crate::application::reflector::ReflectorService;
use crate::domain::{CurationResult, ReflectionResult, RunStatus, Trajectory};

/// One unit of work: a query and, optionally, the answer it should produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
}

impl TaskRecord {
    pub fn new(query: impl Into<String>, ground_truth: Option<&str>) -> Self {
        Self {
            id: None,
            query: query.into(),
            ground_truth: ground_truth.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Generate and judge only; the playbook is not modified
    Infer,
    /// Generate, judge, reflect and curate
    Full,
}

/// Output of the infer stage, checkpointed by batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
    /// `None` when the task had no ground truth to check against
    pub is_correct: Option<bool>,
    pub test_report: String,
    pub trajectory: Trajectory,
}

/// Output of the reflect stage, checkpointed by batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub reflection: ReflectionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopOutcome {
    pub infer: InferRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<ReflectionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curation: Option<CurationResult>,
    pub status: RunStatus,
}

/// Whether the generated answer contains the expected answer verbatim.
pub fn judge_answer(generated_answer: &str, ground_truth: &str) -> bool {
    generated_answer.contains(ground_truth)
}

/// Human-readable verdict handed to reflection as the test report.
pub fn build_test_report(is_correct: bool, ground_truth: &str) -> String {
    if is_correct {
        "correct".to_string()
    } else {
        format!("incorrect: expected answer is '{}'", ground_truth)
    }
}

/// Running correct/total tally for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accuracy {
    pub correct: usize,
    pub total: usize,
}

impl Accuracy {
    /// Count a judged task; unjudged tasks (no ground truth) are ignored.
    pub fn record(&mut self, is_correct: Option<bool>) {
        if let Some(correct) = is_correct {
            self.total += 1;
            if correct {
                self.correct += 1;
            }
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64 * 100.0
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} correct ({:.1}%)", self.correct, self.total, self.percent())
    }
}

pub struct FeedbackLoop {
    generator: Arc<GeneratorService>,
    reflector: Arc<ReflectorService>,
    curator: Arc<CuratorService>,
}

impl FeedbackLoop {
    pub fn new(
        generator: Arc<GeneratorService>,
        reflector: Arc<ReflectorService>,
        curator: Arc<CuratorService>,
    ) -> Self {
        Self {
            generator,
            reflector,
            curator,
        }
    }

    /// Generate an answer and check it against the ground truth.
    pub async fn infer(&self, task: &TaskRecord, namespace: &str) -> InferRecord {
        let trajectory = self.generator.generate(&task.query, namespace).await;

        let (is_correct, test_report) = match (&task.ground_truth, trajectory.is_success()) {
            (Some(truth), true) => {
                let correct = judge_answer(&trajectory.generated_answer, truth);
                (Some(correct), build_test_report(correct, truth))
            }
            (Some(_), false) => (Some(false), "incorrect: generation failed".to_string()),
            (None, true) => (None, "no ground truth available".to_string()),
            (None, false) => (None, "generation failed".to_string()),
        };

        InferRecord {
            task_id: task.id.clone(),
            ground_truth: task.ground_truth.clone(),
            is_correct,
            test_report,
            trajectory,
        }
    }

    /// Reflect on an inferred task. Failed trajectories carry nothing to learn
    /// from and yield `None`.
    pub async fn reflect(&self, record: &InferRecord) -> Option<ReflectRecord> {
        if !record.trajectory.is_success() {
            warn!(
                task_id = record.task_id.as_deref().unwrap_or("-"),
                error = record.trajectory.error_message.as_deref().unwrap_or(""),
                "Skipping reflection for failed trajectory"
            );
            return None;
        }

        let reflection = self
            .reflector
            .reflect(
                &record.trajectory,
                record.ground_truth.as_deref(),
                Some(record.test_report.as_str()),
            )
            .await;

        Some(ReflectRecord {
            task_id: record.task_id.clone(),
            reflection,
        })
    }

    pub async fn curate(&self, record: &ReflectRecord) -> CurationResult {
        self.curator
            .curate(&record.reflection, &record.reflection.namespace)
            .await
    }

    pub async fn run(&self, task: &TaskRecord, namespace: &str, mode: LoopMode) -> LoopOutcome {
        let infer = self.infer(task, namespace).await;
        info!(
            namespace,
            task_id = task.id.as_deref().unwrap_or("-"),
            report = %infer.test_report,
            "Inference complete"
        );

        if !infer.trajectory.is_success() {
            return LoopOutcome {
                infer,
                reflection: None,
                curation: None,
                status: RunStatus::Failed,
            };
        }
        if mode == LoopMode::Infer {
            return LoopOutcome {
                infer,
                reflection: None,
                curation: None,
                status: RunStatus::Success,
            };
        }

        let Some(reflected) = self.reflect(&infer).await else {
            return LoopOutcome {
                infer,
                reflection: None,
                curation: None,
                status: RunStatus::Failed,
            };
        };
        let curation = self.curate(&reflected).await;
        info!(namespace, summary = %curation.summary, status = %curation.status, "Curation complete");

        let status = reflected.reflection.status.worst(curation.status);
        LoopOutcome {
            infer,
            reflection: Some(reflected.reflection),
            curation: Some(curation),
            status,
        }
    }
}
