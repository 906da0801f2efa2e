// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0
//! LLM Judgment Engine
//!
//! Implements [`JudgmentEngine`] and [`AnswerGenerator`] on top of the
//! provider registry and the prompt templates.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Prompt the configured role models and parse their JSON replies
//! - **Integration:** Reflector / Curator / Generator services → this engine → `ProviderRegistry`
//!
//! Replies are expected to contain one JSON object or array, either bare,
//! inside a fenced code block, or surrounded by prose. Delta lists are parsed
//! leniently: entries missing the fields their operation needs are dropped
//! with a warning rather than failing the whole proposal.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use super::llm::ProviderRegistry;
use super::prompt_templates::{PromptRole, PromptTemplates};
use crate::domain::config::ModelRoles;
use crate::domain::llm::GenerationOptions;
use crate::domain::{
    AnswerGenerator, Bullet, DeltaOperation, FeedbackTag, GeneratedAnswer, Insight, InsightRequest, JudgmentEngine,
    JudgmentError, SectionDefinition, Trajectory, UsageFeedback,
};

pub struct LlmJudgmentEngine {
    registry: Arc<ProviderRegistry>,
    templates: Arc<PromptTemplates>,
    roles: ModelRoles,
}

impl LlmJudgmentEngine {
    pub fn new(registry: Arc<ProviderRegistry>, templates: Arc<PromptTemplates>, roles: ModelRoles) -> Self {
        Self {
            registry,
            templates,
            roles,
        }
    }

    async fn complete(
        &self,
        role: PromptRole,
        alias: &str,
        namespace: &str,
        context: &serde_json::Value,
        options: &GenerationOptions,
    ) -> Result<String, JudgmentError> {
        let prompt = self
            .templates
            .render(role, namespace, context)
            .await
            .map_err(|e| JudgmentError::Template(format!("{:#}", e)))?;

        let response = self.registry.generate(alias, &prompt, options).await?;
        if response.finish_reason.is_truncated() {
            warn!(
                role = role.as_str(),
                model = %response.model,
                max_tokens = options.max_tokens,
                "Reply hit the token limit and may be incomplete"
            );
        }
        debug!(
            role = role.as_str(),
            model = %response.model,
            tokens = response.usage.total(),
            "LLM judgment completed"
        );
        Ok(response.text)
    }
}

#[async_trait]
impl JudgmentEngine for LlmJudgmentEngine {
    async fn extract_insights(&self, request: &InsightRequest<'_>) -> Result<Vec<Insight>, JudgmentError> {
        let context = json!({
            "query": request.trajectory.query,
            "generated_answer": request.trajectory.generated_answer,
            "reasoning_steps": request.trajectory.reasoning_steps,
            "ground_truth": request.ground_truth,
            "test_report": request.test_report,
            "used_bullets": request.used_bullets,
            "previous_insights": request.previous_insights,
        });
        let text = self
            .complete(
                PromptRole::Reflector,
                &self.roles.reflector,
                request.namespace,
                &context,
                &GenerationOptions::structured(),
            )
            .await?;
        parse_insights(&text)
    }

    async fn propose_deltas(
        &self,
        insights: &[Insight],
        bullets: &[Bullet],
        sections: &[SectionDefinition],
        namespace: &str,
    ) -> Result<Vec<DeltaOperation>, JudgmentError> {
        let context = json!({
            "insights": insights,
            "bullets": bullets,
            "sections": sections,
        });
        let text = self
            .complete(
                PromptRole::Curator,
                &self.roles.curator,
                namespace,
                &context,
                &GenerationOptions::structured(),
            )
            .await?;
        parse_deltas(&text)
    }

    async fn evaluate_bullet_usage(
        &self,
        trajectory: &Trajectory,
        ground_truth: Option<&str>,
        bullet: &Bullet,
    ) -> Result<UsageFeedback, JudgmentError> {
        let context = json!({
            "query": trajectory.query,
            "generated_answer": trajectory.generated_answer,
            "ground_truth": ground_truth,
            "bullet": bullet,
        });
        // Evaluation shares the reflector model
        let text = self
            .complete(
                PromptRole::Evaluator,
                &self.roles.reflector,
                &trajectory.namespace,
                &context,
                &GenerationOptions::structured(),
            )
            .await?;
        parse_evaluation(&text, bullet)
    }
}

#[async_trait]
impl AnswerGenerator for LlmJudgmentEngine {
    async fn generate(&self, query: &str, context: &[Bullet], namespace: &str) -> Result<GeneratedAnswer, JudgmentError> {
        let prompt_context = json!({
            "query": query,
            "bullets": context,
        });
        let text = self
            .complete(
                PromptRole::Generator,
                &self.roles.generator,
                namespace,
                &prompt_context,
                &GenerationOptions::default(),
            )
            .await?;
        parse_json::<GeneratedAnswer>(&text)
    }
}

/// Locate the JSON object in a model reply.
pub fn extract_json(text: &str) -> Option<&str> {
    for fence in ["```json", "```"] {
        if let Some(start) = text.find(fence) {
            let body = &text[start + fence.len()..];
            if let Some(end) = body.find("```") {
                let candidate = body[..end].trim();
                if candidate.starts_with('{') || candidate.starts_with('[') {
                    return Some(candidate);
                }
            }
        }
    }

    // The span that opens first is preferred, unless only the other one is valid JSON
    let mut spans: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = text.find(open)?;
            let end = text.rfind(close)?;
            (end > start).then(|| (start, &text[start..=end]))
        })
        .collect();
    spans.sort_by_key(|(start, _)| *start);

    spans
        .iter()
        .map(|(_, span)| *span)
        .find(|span| serde_json::from_str::<serde::de::IgnoredAny>(span).is_ok())
        .or_else(|| spans.first().map(|(_, span)| *span))
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, JudgmentError> {
    let json = extract_json(text).ok_or_else(|| JudgmentError::Parse("no JSON object in reply".into()))?;
    serde_json::from_str(json).map_err(|e| JudgmentError::Parse(e.to_string()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InsightsReply {
    Wrapped { insights: Vec<Insight> },
    Bare(Vec<Insight>),
}

pub fn parse_insights(text: &str) -> Result<Vec<Insight>, JudgmentError> {
    Ok(match parse_json::<InsightsReply>(text)? {
        InsightsReply::Wrapped { insights } | InsightsReply::Bare(insights) => insights,
    })
}

#[derive(Deserialize)]
struct DeltasReply {
    #[serde(default)]
    deltas: Vec<RawDelta>,
}

#[derive(Deserialize)]
struct RawDelta {
    #[serde(rename = "type", alias = "op")]
    kind: String,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    bullet_id: Option<String>,
    #[serde(default)]
    reasoning: String,
}

impl RawDelta {
    fn into_operation(self) -> Option<DeltaOperation> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        match self.kind.to_ascii_uppercase().as_str() {
            "ADD" => Some(DeltaOperation::Add {
                section: non_empty(self.section)?,
                content: non_empty(self.content)?,
                reasoning: self.reasoning,
            }),
            "UPDATE" => Some(DeltaOperation::Update {
                bullet_id: non_empty(self.bullet_id)?.into(),
                content: non_empty(self.content)?,
                reasoning: self.reasoning,
            }),
            "DELETE" => Some(DeltaOperation::Delete {
                bullet_id: non_empty(self.bullet_id)?.into(),
                reasoning: self.reasoning,
            }),
            _ => None,
        }
    }
}

pub fn parse_deltas(text: &str) -> Result<Vec<DeltaOperation>, JudgmentError> {
    let reply: DeltasReply = parse_json(text)?;
    let mut operations = Vec::with_capacity(reply.deltas.len());
    for raw in reply.deltas {
        let kind = raw.kind.clone();
        match raw.into_operation() {
            Some(op) => operations.push(op),
            None => warn!(kind = %kind, "Dropping incomplete delta from curator reply"),
        }
    }
    Ok(operations)
}

#[derive(Deserialize)]
struct EvaluationReply {
    tag: String,
    #[serde(default)]
    reason: String,
}

pub fn parse_evaluation(text: &str, bullet: &Bullet) -> Result<UsageFeedback, JudgmentError> {
    let reply: EvaluationReply = parse_json(text)?;
    let tag = match reply.tag.trim().to_ascii_lowercase().as_str() {
        "helpful" => FeedbackTag::Helpful,
        "harmful" => FeedbackTag::Harmful,
        "neutral" => FeedbackTag::Neutral,
        other => return Err(JudgmentError::Parse(format!("unknown feedback tag '{}'", other))),
    };
    Ok(UsageFeedback::new(bullet.id.clone(), tag, reply.reason))
}
