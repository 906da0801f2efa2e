// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Templates
//!
//! Handlebars templates for the four LLM roles, with per-namespace overrides.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Turn judgment inputs into the final prompt text
//! - **Integration:** `LlmJudgmentEngine` → `ProviderRegistry`
//!
//! # Lookup Order
//!
//! For role `reflector` and namespace `math`:
//!
//! 1. `<dir>/reflector/math.hbs`
//! 2. `<dir>/reflector/default.hbs`
//! 3. the built-in template compiled into the binary
//!
//! Templates render with HTML escaping disabled and strict mode off, so a
//! missing variable renders as an empty string.

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::playbook_store::validate_namespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    Generator,
    Reflector,
    Curator,
    Evaluator,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::Generator => "generator",
            PromptRole::Reflector => "reflector",
            PromptRole::Curator => "curator",
            PromptRole::Evaluator => "evaluator",
        }
    }

    pub fn builtin(&self) -> &'static str {
        match self {
            PromptRole::Generator => GENERATOR_TEMPLATE,
            PromptRole::Reflector => REFLECTOR_TEMPLATE,
            PromptRole::Curator => CURATOR_TEMPLATE,
            PromptRole::Evaluator => EVALUATOR_TEMPLATE,
        }
    }

    pub fn all() -> [PromptRole; 4] {
        [
            PromptRole::Generator,
            PromptRole::Reflector,
            PromptRole::Curator,
            PromptRole::Evaluator,
        ]
    }
}

pub struct PromptTemplates {
    handlebars: Handlebars<'static>,
    dir: Option<PathBuf>,
}

impl PromptTemplates {
    pub fn new(dir: Option<PathBuf>) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars, dir }
    }

    /// Templates compiled into the binary only.
    pub fn builtin() -> Self {
        Self::new(None)
    }

    /// Resolve the template source for a role and namespace.
    pub async fn source(&self, role: PromptRole, namespace: &str) -> Result<String> {
        let Some(dir) = &self.dir else {
            return Ok(role.builtin().to_string());
        };

        let role_dir = dir.join(role.as_str());
        let mut candidates = Vec::with_capacity(2);
        if validate_namespace(namespace).is_ok() {
            candidates.push(role_dir.join(format!("{}.hbs", namespace)));
        }
        candidates.push(role_dir.join("default.hbs"));

        for path in candidates {
            match tokio::fs::read_to_string(&path).await {
                Ok(source) => {
                    debug!(role = role.as_str(), path = %path.display(), "Loaded prompt template");
                    return Ok(source);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read template {}", path.display()));
                }
            }
        }

        warn!(
            role = role.as_str(),
            namespace, "No template file found for namespace or default. Using built-in template."
        );
        Ok(role.builtin().to_string())
    }

    pub async fn render<T: Serialize>(&self, role: PromptRole, namespace: &str, context: &T) -> Result<String> {
        let source = self.source(role, namespace).await?;
        self.handlebars
            .render_template(&source, context)
            .with_context(|| format!("Failed to render {} prompt template", role.as_str()))
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::template::Template::compile(template)
            .map(|_| ())
            .context("Invalid Handlebars template syntax")
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}

const GENERATOR_TEMPLATE: &str = r#"Answer the question using the playbook entries below when they apply.

## Playbook
{{#each bullets}}
[{{id}}] ({{section}}) {{content}}
{{else}}
(no playbook entries)
{{/each}}

## Question
{{query}}

Respond with a single JSON object:
{"answer": "<final answer>", "reasoning_steps": ["<step>", "..."]}
"#;

const REFLECTOR_TEMPLATE: &str = r#"Analyze the trajectory below and identify the root cause of any error.

## Question
{{query}}

## Generated answer
{{generated_answer}}

## Ground truth
{{#if ground_truth}}{{ground_truth}}{{else}}(not available){{/if}}

## Test report
{{#if test_report}}{{test_report}}{{else}}(not available){{/if}}

## Reasoning steps
{{#each reasoning_steps}}
- {{this}}
{{else}}
(no reasoning steps recorded)
{{/each}}

## Playbook entries used
{{#each used_bullets}}
[{{id}}] ({{section}}) {{content}}
{{else}}
(no playbook entries were used)
{{/each}}
{{#if previous_insights}}

## Previous analysis
{{#each previous_insights}}
- key insight: {{key_insight}}
  error: {{error_identification}}
  root cause: {{root_cause_analysis}}
  correct approach: {{correct_approach}}
{{/each}}

Build on the previous analysis and go deeper.
{{/if}}

Respond with a single JSON object:
{"insights": [{"reasoning": "", "error_identification": "", "root_cause_analysis": "", "correct_approach": "", "key_insight": ""}]}
"#;

const EVALUATOR_TEMPLATE: &str = r#"Judge whether one playbook entry helped produce the answer.

Question: {{query}}
Generated answer: {{generated_answer}}
Ground truth: {{#if ground_truth}}{{ground_truth}}{{else}}(not available){{/if}}

Entry [{{bullet.id}}] ({{bullet.section}}):
{{bullet.content}}

Respond with a single JSON object:
{"tag": "helpful" | "harmful" | "neutral", "reason": "<one sentence>"}
"#;

const CURATOR_TEMPLATE: &str = r#"You curate a playbook of reusable strategies.
Decide which ADD, UPDATE or DELETE operations the insights below call for.

## Insights
{{#each insights}}
- key insight: {{key_insight}}
  reasoning: {{reasoning}}
  error: {{error_identification}}
  root cause: {{root_cause_analysis}}
  correct approach: {{correct_approach}}
{{else}}
(no insights)
{{/each}}

## Current playbook
{{#each bullets}}
[{{id}}] ({{section}}) {{content}}
{{else}}
(the playbook is empty)
{{/each}}

## Sections
{{#each sections}}
- {{name}}: {{description}}
{{else}}
(any section name may be used)
{{/each}}

Respond with a single JSON object:
{"deltas": [
  {"type": "ADD", "section": "<section>", "content": "<text>", "reasoning": "<why>"},
  {"type": "UPDATE", "bullet_id": "<id>", "content": "<new text>", "reasoning": "<why>"},
  {"type": "DELETE", "bullet_id": "<id>", "reasoning": "<why>"}
]}
Return {"deltas": []} when nothing should change.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_builtin_generator_renders_bullets_without_escaping() {
        let templates = PromptTemplates::builtin();
        let prompt = templates
            .render(
                PromptRole::Generator,
                "math",
                &json!({
                    "query": "Is 3 < 5?",
                    "bullets": [{"id": "b1", "section": "strategies", "content": "compare \"digits\" first"}],
                }),
            )
            .await
            .unwrap();

        assert!(prompt.contains("Is 3 < 5?"));
        assert!(prompt.contains("[b1] (strategies) compare \"digits\" first"));
        assert!(!prompt.contains("(no playbook entries)"));
    }

    #[tokio::test]
    async fn test_previous_insights_section_is_conditional() {
        let templates = PromptTemplates::builtin();
        let without = templates
            .render(PromptRole::Reflector, "math", &json!({"query": "q", "previous_insights": []}))
            .await
            .unwrap();
        assert!(!without.contains("Previous analysis"));
        assert!(without.contains("(not available)"));

        let with = templates
            .render(
                PromptRole::Reflector,
                "math",
                &json!({"query": "q", "previous_insights": [{"key_insight": "check units"}]}),
            )
            .await
            .unwrap();
        assert!(with.contains("Previous analysis"));
        assert!(with.contains("key insight: check units"));
    }

    #[tokio::test]
    async fn test_namespace_override_then_default_then_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let curator_dir = dir.path().join("curator");
        std::fs::create_dir_all(&curator_dir).unwrap();
        std::fs::write(curator_dir.join("science.hbs"), "science: {{note}}").unwrap();
        std::fs::write(curator_dir.join("default.hbs"), "default: {{note}}").unwrap();

        let templates = PromptTemplates::new(Some(dir.path().to_path_buf()));
        let context = json!({"note": "hi"});

        let science = templates.render(PromptRole::Curator, "science", &context).await.unwrap();
        assert_eq!(science, "science: hi");

        let math = templates.render(PromptRole::Curator, "math", &context).await.unwrap();
        assert_eq!(math, "default: hi");

        // Path-like namespaces never reach the file system
        let escaped = templates.render(PromptRole::Curator, "../science", &context).await.unwrap();
        assert_eq!(escaped, "default: hi");

        let evaluator = templates.source(PromptRole::Evaluator, "math").await.unwrap();
        assert_eq!(evaluator, EVALUATOR_TEMPLATE);
    }

    #[test]
    fn test_builtin_templates_compile() {
        let templates = PromptTemplates::builtin();
        for role in PromptRole::all() {
            assert!(templates.validate_template(role.builtin()).is_ok(), "{}", role.as_str());
        }
        assert!(templates.validate_template("{{query").is_err());
    }
}
