// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The agent loop: drives one conversation through the model, dispatches
//! tool calls, and keeps context bounded via the compression pipeline.
//!
//! The same loop drives the lead REPL agent, a teammate's work phase, and a
//! subagent's bounded run — only the role label, tool set, round cap, and
//! background/inbox wiring differ between them.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use swarm_config::AgentConfig;
use swarm_model::{Block, CompletionRequest, Message, ModelProvider, Response};
use swarm_tools::{OutputCategory, TodoItem, ToolCall, ToolEvent, ToolRegistry};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::compact::{auto_compact, estimate_tokens, micro_compact, smart_truncate};
use crate::events::AgentEvent;
use crate::prompts::{system_prompt, PromptContext};
use crate::runtime_context::AgentRuntimeContext;
use crate::session::Session;

/// Cap applied to every tool result before it is spliced back into the
/// conversation, regardless of output category.
const TOOL_OUTPUT_CAP_TOKENS: usize = 4_000;

/// Default `max_tokens` requested per `Converse` call.
const RESPONSE_MAX_TOKENS: u32 = 4096;

/// Source of background-job completion notifications (`swarm-scheduler`).
#[async_trait]
pub trait BackgroundSource: Send + Sync {
    /// Non-blocking drain of notifications that completed since the last call.
    async fn drain(&self) -> Vec<String>;
}

/// Source of this agent's inbox messages (`swarm-team`'s message bus).
#[async_trait]
pub trait InboxSource: Send + Sync {
    /// Atomically read and clear this agent's inbox.
    async fn drain(&self) -> Vec<String>;
}

/// Outcome of a single call to [`Agent::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model produced a final turn with no further tool calls.
    EndOfTurn,
    /// The round cap was hit while the model still wanted to use tools.
    RoundCapReached,
}

/// The core agent. Owns a session and drives the model <-> tool loop.
pub struct Agent {
    pub session: Session,
    tools: Arc<ToolRegistry>,
    model: Arc<dyn ModelProvider>,
    config: Arc<AgentConfig>,
    runtime: AgentRuntimeContext,
    role: String,
    transcripts_dir: PathBuf,
    max_rounds: u32,
    /// When set, only these tools are advertised to the model. `None` means
    /// every tool in `tools` is offered (the lead agent's default).
    allowed_tools: Option<Vec<String>>,
    todos: Arc<Mutex<Vec<TodoItem>>>,
    tool_events: mpsc::Receiver<ToolEvent>,
    background: Option<Arc<dyn BackgroundSource>>,
    inbox: Option<Arc<dyn InboxSource>>,
    rounds_since_todo_write: u32,
}

impl Agent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        config: Arc<AgentConfig>,
        role: impl Into<String>,
        max_context_tokens: usize,
        runtime: AgentRuntimeContext,
        transcripts_dir: impl Into<PathBuf>,
        max_rounds: u32,
        todos: Arc<Mutex<Vec<TodoItem>>>,
        tool_events: mpsc::Receiver<ToolEvent>,
    ) -> Self {
        Self {
            session: Session::new(max_context_tokens),
            tools,
            model,
            config,
            runtime,
            role: role.into(),
            transcripts_dir: transcripts_dir.into(),
            max_rounds,
            allowed_tools: None,
            todos,
            tool_events,
            background: None,
            inbox: None,
            rounds_since_todo_write: 0,
        }
    }

    /// Restrict the tool set advertised to the model to exactly `names`.
    /// Used by the subagent runner and the teammate scheduler.
    pub fn with_allowed_tools(mut self, names: Vec<String>) -> Self {
        self.allowed_tools = Some(names);
        self
    }

    pub fn with_background(mut self, source: Arc<dyn BackgroundSource>) -> Self {
        self.background = Some(source);
        self
    }

    pub fn with_inbox(mut self, source: Arc<dyn InboxSource>) -> Self {
        self.inbox = Some(source);
        self
    }

    /// Seed the conversation without driving a model turn. Used by the
    /// teammate scheduler to re-inject identity after a deep compaction.
    pub fn seed(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.session.push_many(messages);
    }

    fn build_system_prompt(&self) -> String {
        let ctx = PromptContext {
            project_root: self.runtime.project_root.as_deref(),
            git_context: self.runtime.git_context_note.as_deref(),
            project_context_file: self.runtime.project_context_file.as_deref(),
            ci_context: self.runtime.ci_context_note.as_deref(),
            append: self.runtime.append_system_prompt.as_deref(),
            skills: self.runtime.skills.get(),
        };
        let custom = self
            .runtime
            .system_prompt_override
            .as_deref()
            .or(self.config.system_prompt.as_deref());
        system_prompt(&self.role, custom, ctx)
    }

    fn tool_schemas(&self) -> Vec<swarm_model::ToolSchema> {
        let schemas = match &self.allowed_tools {
            Some(names) => {
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                self.tools.schemas_for(&refs)
            }
            None => self.tools.schemas(),
        };
        schemas
            .into_iter()
            .map(|s| swarm_model::ToolSchema {
                name: s.name,
                description: s.description,
                parameters: s.parameters,
            })
            .collect()
    }

    /// Drain pending `ToolEvent`s (emitted by `todo_write`) without blocking.
    fn drain_tool_events(&mut self) -> bool {
        let mut saw_todo_write = false;
        while let Ok(event) = self.tool_events.try_recv() {
            match event {
                ToolEvent::TodoUpdate(items) => {
                    saw_todo_write = true;
                    // The tool already owns `self.todos`; this just confirms
                    // a write happened this round for the nag-policy counter.
                    debug!(count = items.len(), "todo list updated");
                }
            }
        }
        saw_todo_write
    }

    async fn has_open_todos(&self) -> bool {
        self.todos
            .lock()
            .await
            .iter()
            .any(|t| t.status != "completed")
    }

    async fn drain_background(&mut self) {
        let Some(bg) = self.background.clone() else { return };
        let notes = bg.drain().await;
        if notes.is_empty() {
            return;
        }
        let body = notes.join("\n");
        self.session
            .push(Message::user(format!("<background-results>\n{body}\n</background-results>")));
        self.session.push(Message::assistant("Acknowledged."));
    }

    async fn drain_inbox(&mut self) {
        let Some(inbox) = self.inbox.clone() else { return };
        let notes = inbox.drain().await;
        if notes.is_empty() {
            return;
        }
        let body = notes.join("\n");
        self.session
            .push(Message::user(format!("<inbox>\n{body}\n</inbox>")));
        self.session.push(Message::assistant("Acknowledged."));
    }

    /// Run the compression pipeline's two stages for the current session.
    async fn compress_if_needed(&mut self, events: &mpsc::Sender<AgentEvent>) -> anyhow::Result<()> {
        micro_compact(
            &mut self.session.messages,
            self.config.micro_compaction_keep,
            self.config.micro_compaction_min_len,
        );
        self.session.recalculate_tokens();

        let estimated = estimate_tokens(&self.session.messages);
        if estimated > self.config.compaction_token_threshold {
            self.force_compact(events).await?;
        }
        Ok(())
    }

    async fn force_compact(&mut self, events: &mpsc::Sender<AgentEvent>) -> anyhow::Result<()> {
        let before = self.session.token_count;
        let system = self.build_system_prompt();
        auto_compact(
            &mut self.session.messages,
            self.model.as_ref(),
            &system,
            &self.transcripts_dir,
        )
        .await?;
        self.session.recalculate_tokens();
        let after = self.session.token_count;
        info!(before, after, "auto-compaction fired");
        events
            .send(AgentEvent::ContextCompacted { tokens_before: before, tokens_after: after })
            .await
            .ok();
        Ok(())
    }

    /// Push `input` as a user turn and drive the loop until the model stops
    /// requesting tools or the round cap is reached.
    pub async fn submit(
        &mut self,
        input: &str,
        events: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<StopReason> {
        self.session.push(Message::user(input));
        self.run_loop(events).await
    }

    async fn run_loop(&mut self, events: mpsc::Sender<AgentEvent>) -> anyhow::Result<StopReason> {
        for round in 0..self.max_rounds {
            // Step 1-2: compression pipeline.
            self.compress_if_needed(&events).await?;

            // Step 3-4: splice in cross-agent notifications.
            self.drain_background().await;
            self.drain_inbox().await;

            // Step 5: Converse.
            let system = self.build_system_prompt();
            let request = CompletionRequest {
                system,
                messages: self.session.messages.clone(),
                tools: self.tool_schemas(),
                max_tokens: RESPONSE_MAX_TOKENS,
            };
            let response: Response = self.model.complete(request).await?;

            // Step 6: append the assistant turn.
            self.session.push(Message::assistant_blocks(response.content.clone()));
            if let Some(text) = response.content.iter().find_map(Block::as_text) {
                events.send(AgentEvent::TextComplete(text.to_string())).await.ok();
            }

            // Step 7: stop when the model is done requesting tools.
            if !response.wants_tool_use() {
                events.send(AgentEvent::TurnComplete).await.ok();
                return Ok(StopReason::EndOfTurn);
            }

            // Step 8: execute every tool_use block.
            let mut result_blocks = Vec::new();
            let mut compress_called = false;
            for (id, name, input) in response.tool_uses() {
                let call = ToolCall { id: id.to_string(), name: name.to_string(), args: input.clone() };
                events.send(AgentEvent::ToolCallStarted(call.clone())).await.ok();
                debug!(tool = name, args = %truncate_for_log(&call.args.to_string()), "dispatching tool call");

                if name == "compress" {
                    compress_called = true;
                }

                let output = self.tools.execute(&call).await;
                let category = self
                    .tools
                    .get(name)
                    .map(|t| t.output_category())
                    .unwrap_or(OutputCategory::Generic);
                let truncated = smart_truncate(&output.content, category, TOOL_OUTPUT_CAP_TOKENS);

                if output.is_error {
                    warn!(tool = name, error = %truncated, "tool execution failed");
                }
                events
                    .send(AgentEvent::ToolCallFinished {
                        call_id: id.to_string(),
                        tool_name: name.to_string(),
                        output: truncated.clone(),
                        is_error: output.is_error,
                    })
                    .await
                    .ok();
                result_blocks.push(Block::tool_result(id, truncated));
            }

            let todo_write_called = self.drain_tool_events();
            if todo_write_called {
                if let Ok(todos) = self.todos.try_lock() {
                    events.send(AgentEvent::TodoUpdate(todos.clone())).await.ok();
                }
            }

            // Step 9: nag policy.
            if todo_write_called {
                self.rounds_since_todo_write = 0;
            } else {
                self.rounds_since_todo_write += 1;
            }
            if self.rounds_since_todo_write >= self.config.nag_after_rounds && self.has_open_todos().await {
                result_blocks.insert(0, Block::text("<reminder>Update your todos.</reminder>"));
            }

            // Step 10: splice tool results back in as the next user turn.
            self.session.push(Message::user_blocks(result_blocks));

            // Step 11: an explicit `compress` call forces compaction now,
            // before the next round's threshold check would otherwise fire.
            if compress_called {
                self.force_compact(&events).await?;
            }

            debug!(round, "agent loop round complete");
        }

        warn!(max_rounds = self.max_rounds, "round cap reached while model still requested tools");
        Ok(StopReason::RoundCapReached)
    }
}

fn truncate_for_log(s: &str) -> String {
    const CAP: usize = 200;
    if s.len() <= CAP {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(CAP).collect::<String>())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
