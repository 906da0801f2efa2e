// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Structured judgment capabilities the loop delegates to.
//!
//! The core only relies on the shapes declared here. How insights, deltas and
//! answers are produced is up to the implementation; callers treat any `Err`
//! as "no output" and carry on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::delta::{DeltaOperation, UsageFeedback};
use super::insight::{Insight, Trajectory};
use super::llm::LLMError;
use super::playbook::Bullet;
use super::section::SectionDefinition;

/// Everything one insight-extraction pass may look at.
#[derive(Debug, Clone)]
pub struct InsightRequest<'a> {
    pub trajectory: &'a Trajectory,
    pub used_bullets: &'a [Bullet],
    pub ground_truth: Option<&'a str>,
    pub test_report: Option<&'a str>,
    /// Insights from the previous pass; empty on the first.
    pub previous_insights: &'a [Insight],
    pub namespace: &'a str,
}

#[async_trait]
pub trait JudgmentEngine: Send + Sync {
    async fn extract_insights(&self, request: &InsightRequest<'_>) -> Result<Vec<Insight>, JudgmentError>;

    async fn propose_deltas(
        &self,
        insights: &[Insight],
        bullets: &[Bullet],
        sections: &[SectionDefinition],
        namespace: &str,
    ) -> Result<Vec<DeltaOperation>, JudgmentError>;

    /// Judge whether one retrieved bullet helped or hurt the answer.
    async fn evaluate_bullet_usage(
        &self,
        trajectory: &Trajectory,
        ground_truth: Option<&str>,
        bullet: &Bullet,
    ) -> Result<UsageFeedback, JudgmentError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub answer: String,
    #[serde(default)]
    pub reasoning_steps: Vec<String>,
}

/// Produces an answer to a query given retrieved context bullets.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        query: &str,
        context: &[Bullet],
        namespace: &str,
    ) -> Result<GeneratedAnswer, JudgmentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum JudgmentError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LLMError),

    #[error("Prompt rendering failed: {0}")]
    Template(String),

    #[error("Unparseable judgment output: {0}")]
    Parse(String),
}
