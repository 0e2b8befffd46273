// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use super::workspace::WorkdirHandle;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

const OUTPUT_LIMIT: usize = 50_000;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

const DENYLIST: &[&str] = &["rm -rf /", "sudo", "shutdown", "reboot", "> /dev/"];

/// Runs a shell command in the workspace, subject to a literal denylist and a
/// fixed timeout. Grounded in the Python original's `run_bash`.
pub struct BashTool {
    pub workdir: Option<WorkdirHandle>,
    pub timeout_secs: u64,
}

impl Default for BashTool {
    fn default() -> Self {
        Self { workdir: None, timeout_secs: DEFAULT_TIMEOUT_SECS }
    }
}

impl BashTool {
    pub fn with_handle(workdir: WorkdirHandle) -> Self {
        Self { workdir: Some(workdir), timeout_secs: DEFAULT_TIMEOUT_SECS }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace. Commands matching a fixed denylist \
         (rm -rf /, sudo, shutdown, reboot, > /dev/) are rejected. Output is capped \
         at 50,000 characters and commands time out after 120 seconds."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let command = match call.args.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'command' argument"),
        };

        if DENYLIST.iter().any(|d| command.contains(d)) {
            return ToolOutput::err(&call.id, "Error: Dangerous command blocked");
        }

        debug!(cmd = %command, "bash tool");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&command);
        if let Some(wd) = &self.workdir {
            cmd.current_dir(wd.get());
        }

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                let mut out = String::from_utf8_lossy(&output.stdout).into_owned();
                out.push_str(&String::from_utf8_lossy(&output.stderr));
                let out = out.trim().to_string();
                let content = if out.is_empty() {
                    "(no output)".to_string()
                } else if out.len() > OUTPUT_LIMIT {
                    out.chars().take(OUTPUT_LIMIT).collect()
                } else {
                    out
                };
                ToolOutput::ok(&call.id, content)
            }
            Ok(Err(e)) => ToolOutput::err(&call.id, format!("Error: {e}")),
            Err(_) => ToolOutput::err(&call.id, "Error: Timeout (120s)"),
        }
    }
}
