// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool-dispatch surface for the task board, message bus, teammate
//! lifecycle, and shutdown/plan-approval handshake.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use swarm_tools::{Tool, ToolCall, ToolOutput};

use crate::bus::{InboxMessage, MessageBus, MessageType};
use crate::shutdown::PendingRequests;
use crate::task_board::{TaskBoard, TaskStatus};
use crate::teammate::TeamRegistry;

/// Builds and runs a teammate's scheduler loop to completion. Supplied by the
/// binary, which alone knows how to wire a fresh `Agent` (model, tool
/// registry, transcripts dir) for a newly spawned teammate.
pub type TeammateFactory =
    Arc<dyn Fn(String, String, String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

fn status_from_str(s: &str) -> Option<TaskStatus> {
    match s {
        "pending" => Some(TaskStatus::Pending),
        "in_progress" => Some(TaskStatus::InProgress),
        "completed" => Some(TaskStatus::Completed),
        "deleted" => Some(TaskStatus::Deleted),
        _ => None,
    }
}

fn ids_from_value(v: Option<&Value>) -> Vec<u64> {
    v.and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|x| x.as_u64()).collect())
        .unwrap_or_default()
}

// ── Task Board tools ────────────────────────────────────────────────────────

pub struct TaskCreateTool(pub Arc<TaskBoard>);

#[async_trait]
impl Tool for TaskCreateTool {
    fn name(&self) -> &str {
        "task_create"
    }
    fn description(&self) -> &str {
        "Create a new task on the shared task board."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "subject": {"type": "string"},
                "description": {"type": "string"}
            },
            "required": ["subject", "description"]
        })
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(subject) = call.args.get("subject").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'subject'");
        };
        let description = call.args.get("description").and_then(|v| v.as_str()).unwrap_or("").to_string();
        match self.0.create(subject.to_string(), description).await {
            Ok(task) => ToolOutput::ok(&call.id, format!("created task #{}", task.id)),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

pub struct TaskGetTool(pub Arc<TaskBoard>);

#[async_trait]
impl Tool for TaskGetTool {
    fn name(&self) -> &str {
        "task_get"
    }
    fn description(&self) -> &str {
        "Read a single task by id."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"id": {"type": "integer"}}, "required": ["id"]})
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(id) = call.args.get("id").and_then(|v| v.as_u64()) else {
            return ToolOutput::err(&call.id, "missing 'id'");
        };
        match self.0.get(id).await {
            Ok(task) => ToolOutput::ok(&call.id, serde_json::to_string_pretty(&task).unwrap_or_default()),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

pub struct TaskUpdateTool(pub Arc<TaskBoard>);

#[async_trait]
impl Tool for TaskUpdateTool {
    fn name(&self) -> &str {
        "task_update"
    }
    fn description(&self) -> &str {
        "Update a task's status or dependency edges."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "status": {"type": "string", "enum": ["pending", "in_progress", "completed", "deleted"]},
                "add_blocked_by": {"type": "array", "items": {"type": "integer"}},
                "add_blocks": {"type": "array", "items": {"type": "integer"}}
            },
            "required": ["id"]
        })
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(id) = call.args.get("id").and_then(|v| v.as_u64()) else {
            return ToolOutput::err(&call.id, "missing 'id'");
        };
        let status = match call.args.get("status").and_then(|v| v.as_str()) {
            Some(s) => match status_from_str(s) {
                Some(st) => Some(st),
                None => return ToolOutput::err(&call.id, format!("Error: unknown status '{s}'")),
            },
            None => None,
        };
        let add_blocked_by = ids_from_value(call.args.get("add_blocked_by"));
        let add_blocks = ids_from_value(call.args.get("add_blocks"));
        match self.0.update(id, status, &add_blocked_by, &add_blocks).await {
            Ok(task) => ToolOutput::ok(&call.id, serde_json::to_string_pretty(&task).unwrap_or_default()),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

pub struct TaskListTool(pub Arc<TaskBoard>);

#[async_trait]
impl Tool for TaskListTool {
    fn name(&self) -> &str {
        "task_list"
    }
    fn description(&self) -> &str {
        "List every task with its status glyph, owner, and blockers."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        ToolOutput::ok(&call.id, self.0.list().await)
    }
}

pub struct ClaimTaskTool {
    pub board: Arc<TaskBoard>,
    pub owner: String,
}

#[async_trait]
impl Tool for ClaimTaskTool {
    fn name(&self) -> &str {
        "claim_task"
    }
    fn description(&self) -> &str {
        "Claim a pending, unblocked task as this agent, setting it in_progress."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"id": {"type": "integer"}}, "required": ["id"]})
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(id) = call.args.get("id").and_then(|v| v.as_u64()) else {
            return ToolOutput::err(&call.id, "missing 'id'");
        };
        match self.board.claim(id, &self.owner).await {
            Ok(task) => ToolOutput::ok(&call.id, format!("claimed task #{}", task.id)),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

// ── Message Bus tools ───────────────────────────────────────────────────────

pub struct SendMessageTool {
    pub bus: Arc<MessageBus>,
    pub from: String,
}

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }
    fn description(&self) -> &str {
        "Send a message to another named agent's inbox."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"to": {"type": "string"}, "content": {"type": "string"}},
            "required": ["to", "content"]
        })
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let (Some(to), Some(content)) = (
            call.args.get("to").and_then(|v| v.as_str()),
            call.args.get("content").and_then(|v| v.as_str()),
        ) else {
            return ToolOutput::err(&call.id, "missing 'to' or 'content'");
        };
        match self.bus.send(to, InboxMessage::new(MessageType::Message, &self.from, content)).await {
            Ok(()) => ToolOutput::ok(&call.id, format!("sent to {to}")),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

pub struct ReadInboxTool {
    pub bus: Arc<MessageBus>,
    pub name: String,
}

#[async_trait]
impl Tool for ReadInboxTool {
    fn name(&self) -> &str {
        "read_inbox"
    }
    fn description(&self) -> &str {
        "Atomically read and clear this agent's own inbox."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.bus.read_inbox(&self.name).await {
            Ok(messages) if messages.is_empty() => ToolOutput::ok(&call.id, "(no new messages)"),
            Ok(messages) => ToolOutput::ok(
                &call.id,
                messages.iter().map(|m| serde_json::to_string(m).unwrap_or_default()).collect::<Vec<_>>().join("\n"),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

pub struct BroadcastTool {
    pub bus: Arc<MessageBus>,
    pub registry: Arc<TeamRegistry>,
    pub from: String,
}

#[async_trait]
impl Tool for BroadcastTool {
    fn name(&self) -> &str {
        "broadcast"
    }
    fn description(&self) -> &str {
        "Send a message to every other teammate."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"content": {"type": "string"}}, "required": ["content"]})
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(content) = call.args.get("content").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'content'");
        };
        let names: Vec<String> = self.registry.list().await.into_iter().map(|m| m.name).collect();
        match self.bus.broadcast(&self.from, content, &names).await {
            Ok(()) => ToolOutput::ok(&call.id, format!("broadcast to {} teammates", names.len().saturating_sub(1))),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

// ── Teammate lifecycle tools (lead-only) ────────────────────────────────────

pub struct SpawnTeammateTool {
    pub registry: Arc<TeamRegistry>,
    pub factory: TeammateFactory,
}

#[async_trait]
impl Tool for SpawnTeammateTool {
    fn name(&self) -> &str {
        "spawn_teammate"
    }
    fn description(&self) -> &str {
        "Spawn a new teammate (or reactivate an idle one) with a name, role, and an \
         initial task prompt. Rejected if the named teammate is currently working."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "role": {"type": "string"},
                "prompt": {"type": "string"}
            },
            "required": ["name", "role", "prompt"]
        })
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let (Some(name), Some(role), Some(prompt)) = (
            call.args.get("name").and_then(|v| v.as_str()),
            call.args.get("role").and_then(|v| v.as_str()),
            call.args.get("prompt").and_then(|v| v.as_str()),
        ) else {
            return ToolOutput::err(&call.id, "missing 'name', 'role', or 'prompt'");
        };

        match self.registry.spawn(name, role).await {
            Ok(_) => {
                tokio::spawn((self.factory)(name.to_string(), role.to_string(), prompt.to_string()));
                ToolOutput::ok(&call.id, format!("spawned teammate '{name}'"))
            }
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

pub struct ListTeammatesTool(pub Arc<TeamRegistry>);

#[async_trait]
impl Tool for ListTeammatesTool {
    fn name(&self) -> &str {
        "list_teammates"
    }
    fn description(&self) -> &str {
        "List every known teammate and their current status."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let members = self.0.list().await;
        if members.is_empty() {
            return ToolOutput::ok(&call.id, "(no teammates)");
        }
        let text = members
            .iter()
            .map(|m| format!("{} ({}) — {:?}", m.name, m.role, m.status))
            .collect::<Vec<_>>()
            .join("\n");
        ToolOutput::ok(&call.id, text)
    }
}

/// A teammate's signal that its current work phase is over. Any text result
/// ends the round; the loop transitions to the idle phase once the model
/// stops requesting tools afterward.
pub struct IdleTool;

#[async_trait]
impl Tool for IdleTool {
    fn name(&self) -> &str {
        "idle"
    }
    fn description(&self) -> &str {
        "Signal that there is no more work right now; go idle until new work arrives."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        ToolOutput::ok(&call.id, "going idle")
    }
}

// ── Shutdown & plan-approval tools ──────────────────────────────────────────

pub struct ShutdownRequestTool {
    pub bus: Arc<MessageBus>,
    pub pending: Arc<PendingRequests>,
    pub from: String,
}

#[async_trait]
impl Tool for ShutdownRequestTool {
    fn name(&self) -> &str {
        "shutdown_request"
    }
    fn description(&self) -> &str {
        "Ask a named teammate to shut down."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]})
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(name) = call.args.get("name").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'name'");
        };
        let request_id = self.pending.request_shutdown().await;
        let msg = InboxMessage::new(MessageType::ShutdownRequest, &self.from, "please shut down")
            .with_request_id(request_id.clone());
        match self.bus.send(name, msg).await {
            Ok(()) => ToolOutput::ok(&call.id, format!("request_id={request_id}")),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

/// Teammate-side counterpart to `PlanApprovalTool`: files a pending plan and
/// tells `to` (normally the lead) its request id via the inbox.
pub struct FilePlanTool {
    pub bus: Arc<MessageBus>,
    pub pending: Arc<PendingRequests>,
    pub from: String,
}

#[async_trait]
impl Tool for FilePlanTool {
    fn name(&self) -> &str {
        "file_plan"
    }
    fn description(&self) -> &str {
        "File a plan summary for the lead to approve or reject with plan_approval."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {"type": "string", "description": "Who should review the plan, usually the lead"},
                "summary": {"type": "string"}
            },
            "required": ["to", "summary"]
        })
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let (Some(to), Some(summary)) = (
            call.args.get("to").and_then(|v| v.as_str()),
            call.args.get("summary").and_then(|v| v.as_str()),
        ) else {
            return ToolOutput::err(&call.id, "missing 'to' or 'summary'");
        };

        let request_id = self.pending.file_plan(summary).await;
        let msg = InboxMessage::new(MessageType::PlanApprovalRequest, &self.from, summary).with_request_id(request_id.clone());
        match self.bus.send(to, msg).await {
            Ok(()) => ToolOutput::ok(&call.id, format!("request_id={request_id}")),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

pub struct PlanApprovalTool {
    pub bus: Arc<MessageBus>,
    pub pending: Arc<PendingRequests>,
    pub from: String,
}

#[async_trait]
impl Tool for PlanApprovalTool {
    fn name(&self) -> &str {
        "plan_approval"
    }
    fn description(&self) -> &str {
        "Approve or reject a teammate's filed plan by request id."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "request_id": {"type": "string"},
                "to": {"type": "string", "description": "The teammate who filed the plan"},
                "approve": {"type": "boolean"},
                "feedback": {"type": "string"}
            },
            "required": ["request_id", "to", "approve"]
        })
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let (Some(request_id), Some(to), Some(approve)) = (
            call.args.get("request_id").and_then(|v| v.as_str()),
            call.args.get("to").and_then(|v| v.as_str()),
            call.args.get("approve").and_then(|v| v.as_bool()),
        ) else {
            return ToolOutput::err(&call.id, "missing 'request_id', 'to', or 'approve'");
        };
        let feedback = call.args.get("feedback").and_then(|v| v.as_str()).map(str::to_string);

        if !self.pending.resolve_plan(request_id, approve, feedback.clone()).await {
            return ToolOutput::err(&call.id, format!("Error: no pending plan with request_id {request_id}"));
        }

        let mut response = InboxMessage::new(MessageType::PlanApprovalResponse, &self.from, "")
            .with_request_id(request_id)
            .with_approve(approve);
        if let Some(fb) = feedback {
            response = response.with_feedback(fb);
        }
        match self.bus.send(to, response).await {
            Ok(()) => ToolOutput::ok(&call.id, format!("resolved {request_id}: approve={approve}")),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
