// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Subagent Runner: the `task` tool the lead (and teammates) use to
//! delegate a bounded, isolated piece of work and get back a text summary.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use swarm_config::{AgentConfig, Config};
use swarm_model::ModelProvider;
use swarm_tools::{Tool, ToolCall, ToolOutput, ToolRegistry};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::agent::Agent;
use crate::events::AgentEvent;
use crate::runtime_context::AgentRuntimeContext;

/// Maximum nesting depth: a subagent's own `task` tool calls are rejected
/// once this many levels of delegation are already in flight.
const MAX_DEPTH: usize = 3;

/// Context window budget assumed for a subagent's own conversation.
const SUBAGENT_CONTEXT_TOKENS: usize = 128_000;

pub struct TaskTool {
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    config: Arc<Config>,
    agent_config: Arc<AgentConfig>,
    runtime: AgentRuntimeContext,
    transcripts_dir: std::path::PathBuf,
    depth: Arc<AtomicUsize>,
}

impl TaskTool {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        config: Arc<Config>,
        agent_config: Arc<AgentConfig>,
        runtime: AgentRuntimeContext,
        transcripts_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            model,
            tools,
            config,
            agent_config,
            runtime,
            transcripts_dir: transcripts_dir.into(),
            depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The tool set a subagent is allowed to use. `explore` subagents cannot
    /// write or edit files; every other `agent_type` can.
    fn allowed_tools(agent_type: &str) -> Vec<String> {
        let mut names = vec!["bash".to_string(), "read_file".to_string()];
        if agent_type != "Explore" {
            names.push("write_file".to_string());
            names.push("edit_file".to_string());
        }
        names
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        "Spawn a subagent to complete a focused, bounded task and return its final text \
         summary. Use for isolated exploration or mechanical edits you don't want to do \
         inline. The subagent's tools are read_file and bash always, plus write_file and \
         edit_file unless agent_type is 'Explore'. Maximum nesting depth is 3."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The task description for the subagent"
                },
                "agent_type": {
                    "type": "string",
                    "description": "Subagent role; 'Explore' restricts to read-only tools",
                    "default": "general"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let prompt = match call.args.get("prompt").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'prompt'"),
        };
        let agent_type = call
            .args
            .get("agent_type")
            .and_then(|v| v.as_str())
            .unwrap_or("general")
            .to_string();

        let current_depth = self.depth.load(Ordering::Relaxed);
        if current_depth >= MAX_DEPTH {
            return ToolOutput::err(&call.id, format!("maximum subagent depth ({MAX_DEPTH}) reached"));
        }
        self.depth.fetch_add(1, Ordering::Relaxed);
        debug!(prompt = %prompt, agent_type = %agent_type, depth = current_depth + 1, "task: spawning subagent");

        let todos = Arc::new(Mutex::new(Vec::new()));
        let (_todo_tx, todo_rx) = mpsc::channel(1);
        let mut agent = Agent::new(
            self.model.clone(),
            self.tools.clone(),
            self.agent_config.clone(),
            format!("subagent:{agent_type}"),
            SUBAGENT_CONTEXT_TOKENS,
            self.runtime.clone(),
            self.transcripts_dir.clone(),
            self.agent_config.subagent_max_rounds,
            todos,
            todo_rx,
        )
        .with_allowed_tools(Self::allowed_tools(&agent_type));

        let (event_tx, mut event_rx) = mpsc::channel::<AgentEvent>(256);
        let run_result = agent.submit(&prompt, event_tx).await;

        let mut summary = String::new();
        while let Ok(event) = event_rx.try_recv() {
            if let AgentEvent::TextComplete(text) = event {
                summary.push_str(&text);
            }
        }

        self.depth.fetch_sub(1, Ordering::Relaxed);

        match run_result {
            Ok(_) => {
                if summary.is_empty() {
                    ToolOutput::ok(&call.id, "(no summary)")
                } else {
                    ToolOutput::ok(&call.id, summary)
                }
            }
            // Subagent failures are swallowed into the returned summary so the
            // lead can decide how to react rather than propagating an error.
            Err(e) => ToolOutput::ok(&call.id, format!("(no summary: {e})")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_model::ScriptedMockProvider;

    fn tool(model: Arc<dyn ModelProvider>) -> TaskTool {
        TaskTool::new(
            model,
            Arc::new(ToolRegistry::new()),
            Arc::new(Config::default()),
            Arc::new(AgentConfig::default()),
            AgentRuntimeContext::default(),
            std::env::temp_dir().join("swarmctl-test-task-tool"),
        )
    }

    #[tokio::test]
    async fn missing_prompt_is_an_error() {
        let t = tool(Arc::new(ScriptedMockProvider::always_text("x")));
        let out = t.execute(&ToolCall { id: "1".into(), name: "task".into(), args: json!({}) }).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn returns_final_text_from_subagent() {
        let t = tool(Arc::new(ScriptedMockProvider::always_text("subagent result")));
        let out = t
            .execute(&ToolCall {
                id: "1".into(),
                name: "task".into(),
                args: json!({"prompt": "investigate the bug"}),
            })
            .await;
        assert!(!out.is_error);
        assert!(out.content.contains("subagent result"));
    }

    #[tokio::test]
    async fn empty_summary_becomes_placeholder() {
        // ScriptedMockProvider with no scripts falls back to "[no more scripts]"
        // text, which is non-empty, so force an empty-text response instead.
        let model = ScriptedMockProvider::new(vec![swarm_model::Response {
            content: vec![],
            stop_reason: "end_turn".into(),
            model: "mock".into(),
        }]);
        let t = tool(Arc::new(model));
        let out = t
            .execute(&ToolCall { id: "1".into(), name: "task".into(), args: json!({"prompt": "noop"}) })
            .await;
        assert_eq!(out.content, "(no summary)");
    }

    #[test]
    fn explore_agent_type_excludes_write_tools() {
        let names = TaskTool::allowed_tools("Explore");
        assert!(!names.contains(&"write_file".to_string()));
        assert!(!names.contains(&"edit_file".to_string()));
        assert!(names.contains(&"bash".to_string()));
        assert!(names.contains(&"read_file".to_string()));
    }

    #[test]
    fn non_explore_agent_type_includes_write_tools() {
        let names = TaskTool::allowed_tools("general");
        assert!(names.contains(&"write_file".to_string()));
        assert!(names.contains(&"edit_file".to_string()));
    }
}
