// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Reflection: turn one trajectory into insights and per-bullet judgments.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::domain::{
    Bullet, FeedbackTag, Insight, InsightRequest, JudgmentEngine, PlaybookRepository,
    ReflectionResult, RunStatus, Trajectory, UsageFeedback,
};

pub const DEFAULT_MAX_ITERATIONS: u32 = 1;

pub struct ReflectorService {
    repository: Arc<dyn PlaybookRepository>,
    judgment: Arc<dyn JudgmentEngine>,
    max_iterations: u32,
}

impl ReflectorService {
    pub fn new(repository: Arc<dyn PlaybookRepository>, judgment: Arc<dyn JudgmentEngine>) -> Self {
        Self {
            repository,
            judgment,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Number of insight-extraction passes; values below 1 are raised to 1.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Reflect on a trajectory. Never fails; partial failures are reported
    /// through `status`.
    pub async fn reflect(
        &self,
        trajectory: &Trajectory,
        ground_truth: Option<&str>,
        test_report: Option<&str>,
    ) -> ReflectionResult {
        let namespace = trajectory.namespace.as_str();
        let mut status = RunStatus::Success;

        let used_bullets = match self.repository.load(namespace).await {
            Ok(playbook) => trajectory
                .used_bullet_ids
                .iter()
                .filter_map(|id| {
                    let bullet = playbook.get(id).cloned();
                    if bullet.is_none() {
                        warn!(bullet_id = %id, namespace, "Trajectory references a bullet no longer in the playbook");
                    }
                    bullet
                })
                .collect::<Vec<Bullet>>(),
            Err(e) => {
                warn!(namespace, error = %e, "Could not load playbook for reflection, evaluating without bullets");
                status = RunStatus::Degraded;
                Vec::new()
            }
        };

        // Each pass sees the previous pass's insights; only the last pass counts
        let mut insights: Vec<Insight> = Vec::new();
        for iteration in 1..=self.max_iterations {
            let request = InsightRequest {
                trajectory,
                used_bullets: &used_bullets,
                ground_truth,
                test_report,
                previous_insights: &insights,
                namespace,
            };
            insights = match self.judgment.extract_insights(&request).await {
                Ok(found) => {
                    debug!(iteration, count = found.len(), "Insight extraction pass complete");
                    found
                }
                Err(e) => {
                    warn!(iteration, error = %e, "Insight extraction failed, pass yields no insights");
                    status = status.worst(RunStatus::Degraded);
                    Vec::new()
                }
            };
        }

        let evaluations = join_all(
            used_bullets
                .iter()
                .map(|bullet| self.evaluate(trajectory, ground_truth, bullet)),
        )
        .await;
        let mut bullet_evaluations = Vec::with_capacity(evaluations.len());
        for (feedback, ok) in evaluations {
            if !ok {
                status = status.worst(RunStatus::Degraded);
            }
            bullet_evaluations.push(feedback);
        }

        info!(
            namespace,
            insights = insights.len(),
            evaluations = bullet_evaluations.len(),
            iterations = self.max_iterations,
            "Reflection complete"
        );

        ReflectionResult {
            insights,
            bullet_evaluations,
            trajectory_query: trajectory.query.clone(),
            namespace: namespace.to_string(),
            iteration_count: self.max_iterations,
            status,
        }
    }

    /// A failed evaluation becomes a neutral judgment so it cannot move counters.
    async fn evaluate(
        &self,
        trajectory: &Trajectory,
        ground_truth: Option<&str>,
        bullet: &Bullet,
    ) -> (UsageFeedback, bool) {
        match self
            .judgment
            .evaluate_bullet_usage(trajectory, ground_truth, bullet)
            .await
        {
            Ok(mut feedback) => {
                // The judgment is about this bullet whatever id the engine echoed
                feedback.bullet_id = bullet.id.clone();
                (feedback, true)
            }
            Err(e) => {
                warn!(bullet_id = %bullet.id, error = %e, "Bullet usage evaluation failed, recording neutral");
                (
                    UsageFeedback::new(bullet.id.clone(), FeedbackTag::Neutral, format!("evaluation failed: {}", e)),
                    false,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BulletId, DeltaOperation, JudgmentError, Playbook, SectionDefinition, TrajectoryStatus,
    };
    use crate::infrastructure::playbook_store::InMemoryPlaybookRepository;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records how many previous insights each pass saw and fails chosen passes.
    struct CountingJudge {
        seen_previous: Mutex<Vec<usize>>,
        fail_on_pass: Option<usize>,
        fail_evaluation_for: Option<&'static str>,
    }

    impl CountingJudge {
        fn new() -> Self {
            Self {
                seen_previous: Mutex::new(Vec::new()),
                fail_on_pass: None,
                fail_evaluation_for: None,
            }
        }
    }

    #[async_trait]
    impl JudgmentEngine for CountingJudge {
        async fn extract_insights(&self, request: &InsightRequest<'_>) -> Result<Vec<Insight>, JudgmentError> {
            let pass = {
                let mut seen = self.seen_previous.lock().unwrap();
                seen.push(request.previous_insights.len());
                seen.len()
            };
            if self.fail_on_pass == Some(pass) {
                return Err(JudgmentError::Parse("garbage".into()));
            }
            Ok((0..pass).map(|i| Insight::new(format!("pass {} insight {}", pass, i))).collect())
        }

        async fn propose_deltas(
            &self,
            _insights: &[Insight],
            _bullets: &[Bullet],
            _sections: &[SectionDefinition],
            _namespace: &str,
        ) -> Result<Vec<DeltaOperation>, JudgmentError> {
            Ok(Vec::new())
        }

        async fn evaluate_bullet_usage(
            &self,
            _trajectory: &Trajectory,
            _ground_truth: Option<&str>,
            bullet: &Bullet,
        ) -> Result<UsageFeedback, JudgmentError> {
            if self.fail_evaluation_for == Some(bullet.id.as_str()) {
                return Err(JudgmentError::Parse("no verdict".into()));
            }
            Ok(UsageFeedback::new("echoed-wrong-id", FeedbackTag::Helpful, "it helped"))
        }
    }

    fn trajectory(used: &[&str]) -> Trajectory {
        Trajectory {
            query: "what is 2 + 2".into(),
            namespace: "math".into(),
            generated_answer: "4".into(),
            reasoning_steps: vec![],
            used_bullet_ids: used.iter().map(|id| BulletId::from(*id)).collect(),
            status: TrajectoryStatus::Success,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    async fn repo_with(ids: &[&str]) -> Arc<InMemoryPlaybookRepository> {
        let repo = Arc::new(InMemoryPlaybookRepository::new());
        let mut playbook = Playbook::new();
        for id in ids {
            playbook.push(Bullet::new("tips", format!("tip {}", id)).with_id(*id));
        }
        repo.seed("math", playbook).await;
        repo
    }

    #[tokio::test]
    async fn test_iterations_chain_previous_insights() {
        let judge = Arc::new(CountingJudge::new());
        let reflector = ReflectorService::new(repo_with(&[]).await, judge.clone()).with_max_iterations(3);

        let result = reflector.reflect(&trajectory(&[]), Some("4"), Some("correct")).await;

        assert_eq!(*judge.seen_previous.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(result.iteration_count, 3);
        // Only the third pass's insights survive
        assert_eq!(result.insights.len(), 3);
        assert!(result.insights[0].key_insight.starts_with("pass 3"));
        assert_eq!(result.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn test_failed_last_pass_yields_no_insights() {
        let judge = Arc::new(CountingJudge {
            fail_on_pass: Some(2),
            ..CountingJudge::new()
        });
        let reflector = ReflectorService::new(repo_with(&[]).await, judge).with_max_iterations(2);
        let result = reflector.reflect(&trajectory(&[]), None, None).await;
        assert!(result.insights.is_empty());
        assert_eq!(result.status, RunStatus::Degraded);
    }

    #[tokio::test]
    async fn test_evaluations_cover_known_bullets() {
        let judge = Arc::new(CountingJudge {
            fail_evaluation_for: Some("u2"),
            ..CountingJudge::new()
        });
        let reflector = ReflectorService::new(repo_with(&["u1", "u2"]).await, judge);

        let result = reflector.reflect(&trajectory(&["u1", "u2", "gone"]), Some("4"), None).await;

        assert_eq!(result.bullet_evaluations.len(), 2);
        assert_eq!(result.bullet_evaluations[0].bullet_id.as_str(), "u1");
        assert_eq!(result.bullet_evaluations[0].tag, FeedbackTag::Helpful);
        assert_eq!(result.bullet_evaluations[1].bullet_id.as_str(), "u2");
        assert_eq!(result.bullet_evaluations[1].tag, FeedbackTag::Neutral);
        assert!(result.bullet_evaluations[1].reason.contains("evaluation failed"));
        assert_eq!(result.status, RunStatus::Degraded);
    }
}
