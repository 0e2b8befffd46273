// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::workspace::{safe_path, WorkdirHandle};
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Writes content to a file, creating parent directories as needed.
/// Grounded in the Python original's `run_write`.
pub struct WriteFileTool {
    pub workdir: WorkdirHandle,
}

impl WriteFileTool {
    pub fn new(workdir: impl Into<std::path::PathBuf>) -> Self {
        Self { workdir: WorkdirHandle::new(workdir) }
    }

    pub fn with_handle(workdir: WorkdirHandle) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, overwriting it if it already exists. Parent directories \
         are created automatically."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'path' argument"),
        };
        let content = match call.args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'content' argument"),
        };

        debug!(path = %path, "write_file tool");

        let resolved = match safe_path(&self.workdir.get(), &path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e),
        };

        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolOutput::err(&call.id, format!("Error: {e}"));
            }
        }

        match tokio::fs::write(&resolved, &content).await {
            Ok(_) => ToolOutput::ok(&call.id, format!("Wrote {} bytes", content.len())),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tool::{Tool, ToolCall};

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "w1".into(), name: "write_file".into(), args }
    }

    #[tokio::test]
    async fn writes_file_and_reports_byte_count() {
        let dir = tempfile::tempdir().unwrap();
        let t = WriteFileTool::new(dir.path());
        let out = t.execute(&call(json!({"path": "a.txt", "content": "hello"}))).await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(out.content, "Wrote 5 bytes");
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let t = WriteFileTool::new(dir.path());
        let out = t.execute(&call(json!({"path": "sub/dir/file.txt", "content": "x"}))).await;
        assert!(!out.is_error, "{}", out.content);
        assert!(dir.path().join("sub/dir/file.txt").exists());
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let t = WriteFileTool::new(dir.path());
        t.execute(&call(json!({"path": "a.txt", "content": "new"}))).await;
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = WriteFileTool::new(dir.path());
        let out = t.execute(&call(json!({"content": "x"}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn path_escaping_workspace_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let t = WriteFileTool::new(dir.path());
        let out = t.execute(&call(json!({"path": "../outside.txt", "content": "x"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("escapes workspace"));
    }
}
