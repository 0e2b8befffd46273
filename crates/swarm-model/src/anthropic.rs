// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::ModelProvider;
use crate::types::{Block, CompletionRequest, Response};

/// Non-streaming Anthropic Messages API client. One `complete()` call maps
/// one-for-one onto `Converse(system, messages, tools, maxTokens) -> Response`.
pub struct AnthropicProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(model: String, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".into()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Response> {
        let key = self.api_key.as_deref().context("API key not set")?;

        let messages = build_wire_messages(&req.messages);
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": req.max_tokens,
            "stream": false,
        });
        if !req.system.is_empty() {
            body["system"] = json!(req.system);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        debug!(model = %self.model, n_messages = req.messages.len(), "sending anthropic request");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("Anthropic request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Anthropic error {status}: {text}");
        }

        let wire: Value = resp.json().await.context("decoding Anthropic response")?;
        parse_wire_response(&wire, &self.model)
    }
}

/// Parse a full (non-streamed) Anthropic Messages API response body.
pub(crate) fn parse_wire_response(v: &Value, fallback_model: &str) -> anyhow::Result<Response> {
    let model = v["model"].as_str().unwrap_or(fallback_model).to_string();
    let stop_reason = v["stop_reason"].as_str().unwrap_or("end_turn").to_string();
    let content = v["content"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(|block| match block["type"].as_str() {
            Some("text") => Some(Block::Text { text: block["text"].as_str().unwrap_or("").to_string() }),
            Some("tool_use") => Some(Block::ToolUse {
                id: block["id"].as_str().unwrap_or("").to_string(),
                name: block["name"].as_str().unwrap_or("").to_string(),
                input: block["input"].clone(),
            }),
            _ => None,
        })
        .collect();

    Ok(Response {
        content,
        stop_reason: if stop_reason == "tool_use" { "tool_use".into() } else { stop_reason },
        model,
    })
}

/// Convert our internal message list into the Anthropic wire format,
/// folding `tool_result` blocks into `user`-role turns as Anthropic expects.
pub(crate) fn build_wire_messages(messages: &[crate::types::Message]) -> Vec<Value> {
    use crate::types::{MessageContent, Role};

    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "user",
            };
            match &m.content {
                MessageContent::Text(t) => json!({ "role": role, "content": t }),
                MessageContent::Blocks(blocks) => {
                    let content: Vec<Value> = blocks
                        .iter()
                        .map(|b| match b {
                            Block::Text { text } => json!({ "type": "text", "text": text }),
                            Block::ToolUse { id, name, input } => json!({
                                "type": "tool_use", "id": id, "name": name, "input": input,
                            }),
                            Block::ToolResult { tool_use_id, content } => json!({
                                "type": "tool_result", "tool_use_id": tool_use_id, "content": content,
                            }),
                            Block::Other => json!({}),
                        })
                        .collect();
                    json!({ "role": role, "content": content })
                }
            }
        })
        .collect()
}
