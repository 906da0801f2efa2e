// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

// Ollama chat adapter for offline runs against a local model server.
//
// Uses /api/chat so the system prompt travels as its own message, and
// Ollama's `format: "json"` mode for structured judgments.

use crate::domain::llm::{FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider, TokenUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: Sampling<'a>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct Sampling<'a> {
    temperature: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "no_stops")]
    stop: &'a [String],
}

fn no_stops(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Deserialize)]
struct ChatReply {
    message: ReplyMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaAdapter {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: endpoint.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn body<'a>(&'a self, prompt: &'a str, options: &'a GenerationOptions) -> ChatBody<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system_prompt.as_deref() {
            messages.push(Message {
                role: "system",
                content: system,
            });
        }
        messages.push(Message {
            role: "user",
            content: prompt,
        });

        ChatBody {
            model: &self.model,
            messages,
            stream: false,
            format: options.expects_json().then_some("json"),
            options: Sampling {
                temperature: options.temperature,
                num_predict: options.max_tokens,
                stop: &options.stop_sequences,
            },
        }
    }

    /// `llama3.2` is listed by Ollama as `llama3.2:latest`.
    fn lists_model(&self, tags: &TagList) -> bool {
        tags.models.iter().any(|entry| {
            entry.name == self.model
                || (!self.model.contains(':') && entry.name.strip_suffix(":latest") == Some(self.model.as_str()))
        })
    }
}

fn finish_reason(done_reason: Option<&str>) -> FinishReason {
    match done_reason {
        None | Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some(_) => FinishReason::Other,
    }
}

#[async_trait]
impl LLMProvider for OllamaAdapter {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<GenerationResponse, LLMError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&self.body(prompt, options))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LLMError::ModelNotFound(self.model.clone()));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LLMError::Provider(format!("ollama returned HTTP {}: {}", status, detail)));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("unreadable ollama reply: {}", e)))?;

        Ok(GenerationResponse {
            text: reply.message.content,
            usage: TokenUsage {
                input_tokens: reply.prompt_eval_count,
                output_tokens: reply.eval_count,
            },
            provider: "ollama".to_string(),
            model: self.model.clone(),
            finish_reason: finish_reason(reply.done_reason.as_deref()),
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LLMError::Network(format!("ollama returned HTTP {}", response.status())));
        }

        let tags: TagList = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("unreadable model list: {}", e)))?;
        if self.lists_model(&tags) {
            Ok(())
        } else {
            Err(LLMError::ModelNotFound(format!("{} is not pulled", self.model)))
        }
    }
}
