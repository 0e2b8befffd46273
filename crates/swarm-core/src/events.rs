// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use swarm_tools::{TodoItem, ToolCall};

/// Events emitted by the agent during a single turn.
/// Consumers (CI runner, TUI) subscribe to these to drive their output.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A complete text response from the model for this turn.
    TextComplete(String),
    /// The model has requested a tool call.
    ToolCallStarted(ToolCall),
    /// A tool call finished.
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    /// Context was compacted; statistics for the UI.
    ContextCompacted {
        tokens_before: usize,
        tokens_after: usize,
    },
    /// Current token usage update.
    TokenUsage {
        input: u32,
        output: u32,
        context_total: usize,
    },
    /// The agent has finished processing the current user turn.
    TurnComplete,
    /// A recoverable error occurred.
    Error(String),
    /// The todo list was updated.
    TodoUpdate(Vec<TodoItem>),
}
