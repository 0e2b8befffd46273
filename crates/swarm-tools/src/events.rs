// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// A single todo item managed by the `TodoWrite` tool.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TodoItem {
    pub content: String,
    /// One of: "pending", "in_progress", "completed".
    pub status: String,
    #[serde(rename = "activeForm")]
    pub active_form: String,
}

/// Events emitted by tools to communicate state changes back to the agent loop.
#[derive(Debug)]
pub enum ToolEvent {
    TodoUpdate(Vec<TodoItem>),
}
