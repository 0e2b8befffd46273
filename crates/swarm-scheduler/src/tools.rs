// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use swarm_tools::{Tool, ToolCall, ToolOutput};

use crate::jobs::BackgroundRunner;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct BackgroundRunTool {
    runner: BackgroundRunner,
}

impl BackgroundRunTool {
    pub fn new(runner: BackgroundRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for BackgroundRunTool {
    fn name(&self) -> &str {
        "background_run"
    }

    fn description(&self) -> &str {
        "Launch a shell command in the background and return a job id immediately. \
         Poll its status with check_background."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to run"},
                "timeout": {"type": "integer", "description": "Timeout in seconds", "default": DEFAULT_TIMEOUT_SECS}
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(command) = call.args.get("command").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'command' argument");
        };
        let timeout_secs = call
            .args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let id = self
            .runner
            .run(command.to_string(), Duration::from_secs(timeout_secs))
            .await;
        ToolOutput::ok(&call.id, id)
    }
}

pub struct CheckBackgroundTool {
    runner: BackgroundRunner,
}

impl CheckBackgroundTool {
    pub fn new(runner: BackgroundRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for CheckBackgroundTool {
    fn name(&self) -> &str {
        "check_background"
    }

    fn description(&self) -> &str {
        "Check a background job's status and result by id, or list all jobs when no id is given."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "Job id; omit to list every job"}
            }
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let id = call.args.get("id").and_then(|v| v.as_str());
        match self.runner.check(id).await {
            Ok(text) => ToolOutput::ok(&call.id, text),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_run_returns_a_job_id() {
        let runner = BackgroundRunner::new();
        let tool = BackgroundRunTool::new(runner);
        let out = tool
            .execute(&ToolCall { id: "1".into(), name: "background_run".into(), args: json!({"command": "echo hi"}) })
            .await;
        assert!(!out.is_error);
        assert_eq!(out.content.len(), 8);
    }

    #[tokio::test]
    async fn background_run_missing_command_is_error() {
        let runner = BackgroundRunner::new();
        let tool = BackgroundRunTool::new(runner);
        let out = tool.execute(&ToolCall { id: "1".into(), name: "background_run".into(), args: json!({}) }).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn check_background_unknown_id_is_error() {
        let runner = BackgroundRunner::new();
        let tool = CheckBackgroundTool::new(runner);
        let out = tool
            .execute(&ToolCall { id: "1".into(), name: "check_background".into(), args: json!({"id": "deadbeef"}) })
            .await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn check_background_no_id_lists_jobs() {
        let runner = BackgroundRunner::new();
        let check = CheckBackgroundTool::new(runner.clone());
        let run = BackgroundRunTool::new(runner);
        run.execute(&ToolCall { id: "1".into(), name: "background_run".into(), args: json!({"command": "echo hi"}) })
            .await;
        let out = check.execute(&ToolCall { id: "2".into(), name: "check_background".into(), args: json!({}) }).await;
        assert!(!out.is_error);
        assert_eq!(out.content.lines().count(), 1);
    }
}
