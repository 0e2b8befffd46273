// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::provider::ModelProvider;
use crate::types::{Block, CompletionRequest, Response};

/// Deterministic mock provider for tests. Echoes the last user message back
/// as a final (non-tool-use) assistant response.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Response> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::types::Role::User))
            .and_then(|m| m.as_text())
            .unwrap_or("[no input]")
            .to_string();

        Ok(Response {
            content: vec![Block::text(format!("MOCK: {reply}"))],
            stop_reason: "end_turn".into(),
            model: "mock-model".into(),
        })
    }
}

/// A pre-scripted mock provider. Each call to `complete` pops the next
/// canned [`Response`] from the front of the queue, letting tests drive a
/// deterministic multi-round agent loop (including tool_use turns) without
/// network access.
pub struct ScriptedMockProvider {
    scripts: Arc<Mutex<Vec<Response>>>,
    /// The last `CompletionRequest` seen by this provider, so tests can
    /// inspect exactly what was sent on a given round.
    pub last_request: Arc<Mutex<Option<CompletionRequest>>>,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<Response>) -> Self {
        Self { scripts: Arc::new(Mutex::new(scripts)), last_request: Arc::new(Mutex::new(None)) }
    }

    /// Convenience: provider that always returns a single text reply and ends the turn.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![Response {
            content: vec![Block::text(reply.into())],
            stop_reason: "end_turn".into(),
            model: "scripted-mock-model".into(),
        }])
    }

    /// Convenience: a tool call on round one, a closing text reply on round two.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: serde_json::Value,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            Response {
                content: vec![Block::ToolUse { id: tool_id.into(), name: tool_name.into(), input }],
                stop_reason: "tool_use".into(),
                model: "scripted-mock-model".into(),
            },
            Response {
                content: vec![Block::text(final_text.into())],
                stop_reason: "end_turn".into(),
                model: "scripted-mock-model".into(),
            },
        ])
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Response> {
        *self.last_request.lock().unwrap() = Some(req);
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            Ok(Response {
                content: vec![Block::text("[no more scripts]")],
                stop_reason: "end_turn".into(),
                model: "scripted-mock-model".into(),
            })
        } else {
            Ok(scripts.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn req() -> CompletionRequest {
        CompletionRequest { messages: vec![Message::user("hi")], ..Default::default() }
    }

    #[tokio::test]
    async fn mock_echoes_last_user_message() {
        let p = MockProvider;
        let r = p.complete(req()).await.unwrap();
        assert!(r.text().contains("MOCK: hi"));
        assert!(!r.wants_tool_use());
    }

    #[tokio::test]
    async fn scripted_single_text_reply() {
        let p = ScriptedMockProvider::always_text("hello world");
        let r = p.complete(req()).await.unwrap();
        assert_eq!(r.text(), "hello world");
    }

    #[tokio::test]
    async fn scripted_tool_then_text_two_rounds() {
        let p = ScriptedMockProvider::tool_then_text(
            "call-1",
            "bash",
            serde_json::json!({"command": "ls"}),
            "done",
        );

        let r1 = p.complete(req()).await.unwrap();
        assert!(r1.wants_tool_use());
        assert_eq!(r1.tool_uses()[0].1, "bash");

        let r2 = p.complete(req()).await.unwrap();
        assert!(!r2.wants_tool_use());
        assert_eq!(r2.text(), "done");
    }

    #[tokio::test]
    async fn scripted_fallback_when_scripts_exhausted() {
        let p = ScriptedMockProvider::new(vec![]);
        let r = p.complete(req()).await.unwrap();
        assert!(r.text().contains("no more scripts"));
    }

    #[tokio::test]
    async fn scripted_records_last_request() {
        let p = ScriptedMockProvider::always_text("ok");
        let _ = p.complete(req()).await.unwrap();
        assert!(p.last_request.lock().unwrap().is_some());
    }
}
