// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::workspace::{safe_path, WorkdirHandle};
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

const OUTPUT_LIMIT: usize = 50_000;

/// Reads a file, optionally limited to the first `limit` lines.
/// Grounded in the Python original's `run_read`.
pub struct ReadFileTool {
    pub workdir: WorkdirHandle,
}

impl ReadFileTool {
    pub fn new(workdir: impl Into<std::path::PathBuf>) -> Self {
        Self { workdir: WorkdirHandle::new(workdir) }
    }

    pub fn with_handle(workdir: WorkdirHandle) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read file contents, optionally limited to a number of lines. Output is capped \
         at 50,000 characters."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the workspace root"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (optional)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::FileContent
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'path' argument"),
        };
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        debug!(path = %path, ?limit, "read_file tool");

        let resolved = match safe_path(&self.workdir.get(), &path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e),
        };

        let text = match tokio::fs::read_to_string(&resolved).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(&call.id, format!("Error: {e}")),
        };

        let mut lines: Vec<&str> = text.lines().collect();
        let mut suffix = String::new();
        if let Some(limit) = limit {
            if limit < lines.len() {
                let remaining = lines.len() - limit;
                lines.truncate(limit);
                suffix = format!("\n... ({remaining} more)");
            }
        }

        let mut content = lines.join("\n");
        content.push_str(&suffix);
        if content.len() > OUTPUT_LIMIT {
            content.truncate(OUTPUT_LIMIT);
        }

        ToolOutput::ok(&call.id, content)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tool::{Tool, ToolCall};

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "r1".into(), name: "read_file".into(), args }
    }

    #[tokio::test]
    async fn reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha\nbeta\ngamma").unwrap();
        let t = ReadFileTool::new(dir.path());
        let out = t.execute(&call(json!({"path": "a.txt"}))).await;
        assert!(!out.is_error);
        assert_eq!(out.content, "alpha\nbeta\ngamma");
    }

    #[tokio::test]
    async fn limit_truncates_and_reports_remaining() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "1\n2\n3\n4\n5").unwrap();
        let t = ReadFileTool::new(dir.path());
        let out = t.execute(&call(json!({"path": "a.txt", "limit": 2}))).await;
        assert!(!out.is_error);
        assert!(out.content.contains("1\n2"));
        assert!(out.content.contains("(3 more)"));
    }

    #[tokio::test]
    async fn missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = ReadFileTool::new(dir.path());
        let out = t.execute(&call(json!({}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = ReadFileTool::new(dir.path());
        let out = t.execute(&call(json!({"path": "nope.txt"}))).await;
        assert!(out.is_error);
        assert!(out.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn path_escaping_workspace_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let t = ReadFileTool::new(dir.path());
        let out = t.execute(&call(json!({"path": "../../etc/passwd"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("escapes workspace"));
    }

    #[test]
    fn output_category_is_filecontent() {
        let t = ReadFileTool::new(".");
        assert_eq!(t.output_category(), OutputCategory::FileContent);
    }
}
