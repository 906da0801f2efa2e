// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Generation: retrieve bullets for a query and answer it with them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::application::hybrid_search::{HybridSearch, SearchQuery, DEFAULT_MIN_CONFIDENCE, DEFAULT_TOP_K};
use crate::domain::{AnswerGenerator, Bullet, BulletId, PlaybookRepository, Trajectory, TrajectoryStatus};

pub struct GeneratorService {
    repository: Arc<dyn PlaybookRepository>,
    search: Arc<HybridSearch>,
    generator: Arc<dyn AnswerGenerator>,
    top_k: usize,
    min_confidence: f64,
}

impl GeneratorService {
    pub fn new(
        repository: Arc<dyn PlaybookRepository>,
        search: Arc<HybridSearch>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            repository,
            search,
            generator,
            top_k: DEFAULT_TOP_K,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_retrieval(mut self, top_k: usize, min_confidence: f64) -> Self {
        self.top_k = top_k;
        self.min_confidence = min_confidence;
        self
    }

    /// Answer a query. Any failure is captured in the returned trajectory.
    pub async fn generate(&self, query: &str, namespace: &str) -> Trajectory {
        let mut trajectory = Trajectory {
            query: query.to_string(),
            namespace: namespace.to_string(),
            generated_answer: String::new(),
            reasoning_steps: Vec::new(),
            used_bullet_ids: Vec::new(),
            status: TrajectoryStatus::Failure,
            error_message: None,
            created_at: Utc::now(),
        };

        let playbook = match self.repository.load(namespace).await {
            Ok(playbook) => playbook,
            Err(e) => return fail(trajectory, format!("playbook load failed: {}", e)),
        };

        let search_query = SearchQuery::new(query)
            .with_top_k(self.top_k)
            .with_min_confidence(self.min_confidence);
        let context: Vec<Bullet> = match self.search.search(&search_query, &playbook).await {
            Ok(results) => results.into_iter().map(|r| r.bullet).collect(),
            Err(e) => return fail(trajectory, format!("retrieval failed: {}", e)),
        };
        trajectory.used_bullet_ids = context.iter().map(|b| b.id.clone()).collect::<Vec<BulletId>>();

        match self.generator.generate(query, &context, namespace).await {
            Ok(answer) => {
                trajectory.generated_answer = answer.answer;
                trajectory.reasoning_steps = answer.reasoning_steps;
                trajectory.status = TrajectoryStatus::Success;
                info!(
                    namespace,
                    used_bullets = trajectory.used_bullet_ids.len(),
                    "Generated answer"
                );
                trajectory
            }
            Err(e) => fail(trajectory, format!("generation failed: {}", e)),
        }
    }
}

fn fail(mut trajectory: Trajectory, message: String) -> Trajectory {
    warn!(namespace = %trajectory.namespace, error = %message, "Generation failed");
    trajectory.status = TrajectoryStatus::Failure;
    trajectory.error_message = Some(message);
    trajectory
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EmbeddingError, EmbeddingProvider, GeneratedAnswer, JudgmentError, Playbook};
    use crate::infrastructure::embedding_client::HashingEmbeddingClient;
    use crate::infrastructure::playbook_store::InMemoryPlaybookRepository;
    use async_trait::async_trait;

    struct EchoGenerator;

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate(
            &self,
            query: &str,
            context: &[Bullet],
            _namespace: &str,
        ) -> Result<GeneratedAnswer, JudgmentError> {
            Ok(GeneratedAnswer {
                answer: format!("answer to {} using {} bullets", query, context.len()),
                reasoning_steps: vec!["looked at the playbook".into()],
            })
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Network("timeout".into()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Network("timeout".into()))
        }
    }

    async fn seeded_repo() -> Arc<InMemoryPlaybookRepository> {
        let repo = Arc::new(InMemoryPlaybookRepository::new());
        let mut playbook = Playbook::new();
        playbook.push(Bullet::new("tips", "carry the one when adding").with_id("u1"));
        playbook.push(Bullet::new("tips", "harmful advice").with_id("u2").with_counters(0, 4));
        repo.seed("math", playbook).await;
        repo
    }

    #[tokio::test]
    async fn test_generate_records_used_bullets() {
        let search = Arc::new(HybridSearch::new(Arc::new(HashingEmbeddingClient::new(64)), 0.5).unwrap());
        let service = GeneratorService::new(seeded_repo().await, search, Arc::new(EchoGenerator));

        let trajectory = service.generate("adding numbers", "math").await;

        assert!(trajectory.is_success());
        // u2 is below the default confidence floor
        assert_eq!(trajectory.used_bullet_ids, vec![BulletId::from("u1")]);
        assert_eq!(trajectory.reasoning_steps.len(), 1);
        assert!(trajectory.generated_answer.contains("1 bullets"));
    }

    #[tokio::test]
    async fn test_retrieval_failure_becomes_failed_trajectory() {
        let search = Arc::new(HybridSearch::new(Arc::new(DownEmbedder), 0.5).unwrap());
        let service = GeneratorService::new(seeded_repo().await, search, Arc::new(EchoGenerator));

        let trajectory = service.generate("adding numbers", "math").await;

        assert_eq!(trajectory.status, TrajectoryStatus::Failure);
        assert!(trajectory.error_message.unwrap().contains("retrieval failed"));
    }
}
