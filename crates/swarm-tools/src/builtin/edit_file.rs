// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::workspace::{safe_path, WorkdirHandle};
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Replaces the first occurrence of `old_text` with `new_text` in a file.
/// Grounded in the Python original's `run_edit`.
pub struct EditFileTool {
    pub workdir: WorkdirHandle,
}

impl EditFileTool {
    pub fn new(workdir: impl Into<std::path::PathBuf>) -> Self {
        Self { workdir: WorkdirHandle::new(workdir) }
    }

    pub fn with_handle(workdir: WorkdirHandle) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace the first exact occurrence of old_text with new_text in a file. \
         old_text must match byte-for-byte including whitespace."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the workspace root"
                },
                "old_text": {
                    "type": "string",
                    "description": "Exact text to replace (first occurrence only)"
                },
                "new_text": {
                    "type": "string",
                    "description": "Replacement text"
                }
            },
            "required": ["path", "old_text", "new_text"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'path' argument"),
        };
        let old_text = match call.args.get("old_text").and_then(|v| v.as_str()) {
            Some(t) => t.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'old_text' argument"),
        };
        let new_text = match call.args.get("new_text").and_then(|v| v.as_str()) {
            Some(t) => t.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'new_text' argument"),
        };

        debug!(path = %path, "edit_file tool");

        let resolved = match safe_path(&self.workdir.get(), &path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e),
        };

        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(&call.id, format!("Error: {e}")),
        };

        if !content.contains(&old_text) {
            return ToolOutput::err(&call.id, format!("Error: Text not found in {path}"));
        }

        let updated = content.replacen(&old_text, &new_text, 1);
        match tokio::fs::write(&resolved, &updated).await {
            Ok(_) => ToolOutput::ok(&call.id, format!("Edited {path}")),
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
        ToolCall { id: "e1".into(), name: "edit_file".into(), args }
    }

    #[tokio::test]
    async fn replaces_first_occurrence_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "foo foo foo").unwrap();
        let t = EditFileTool::new(dir.path());
        let out = t
            .execute(&call(json!({"path": "a.txt", "old_text": "foo", "new_text": "bar"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "bar foo foo");
    }

    #[tokio::test]
    async fn unmatched_text_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let t = EditFileTool::new(dir.path());
        let out = t
            .execute(&call(json!({"path": "a.txt", "old_text": "nope", "new_text": "x"})))
            .await;
        assert!(out.is_error);
        assert_eq!(out.content, "Error: Text not found in a.txt");
    }

    #[tokio::test]
    async fn missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = EditFileTool::new(dir.path());
        let out = t
            .execute(&call(json!({"path": "nope.txt", "old_text": "a", "new_text": "b"})))
            .await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn path_escaping_workspace_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let t = EditFileTool::new(dir.path());
        let out = t
            .execute(&call(json!({"path": "../outside.txt", "old_text": "a", "new_text": "b"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("escapes workspace"));
    }
}
