// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::workspace::WorkdirHandle;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Repoints every file/shell tool sharing this handle at a new workspace
/// root. The directory must already exist.
pub struct SetWorkdirTool {
    pub workdir: WorkdirHandle,
}

impl SetWorkdirTool {
    pub fn new(workdir: WorkdirHandle) -> Self {
        Self { workdir }
    }
}

#[async_trait]
impl Tool for SetWorkdirTool {
    fn name(&self) -> &str {
        "set_workdir"
    }

    fn description(&self) -> &str {
        "Change the workspace root that bash, read_file, write_file, and edit_file \
         resolve paths against. The directory must already exist."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "New workspace root, absolute or relative to the current one"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'path' argument"),
        };

        let current = self.workdir.get();
        let resolved = {
            let candidate = std::path::Path::new(&path);
            if candidate.is_absolute() {
                candidate.to_path_buf()
            } else {
                current.join(candidate)
            }
        };

        debug!(path = %resolved.display(), "set_workdir tool");

        match resolved.canonicalize() {
            Ok(canonical) if canonical.is_dir() => {
                self.workdir.set(canonical.clone());
                ToolOutput::ok(&call.id, format!("workdir set to {}", canonical.display()))
            }
            Ok(_) => ToolOutput::err(&call.id, format!("Error: Not a directory: {path}")),
            Err(e) => ToolOutput::err(&call.id, format!("Error: {e}")),
        }
    }
}
