// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolOutput};

/// A request to compress the conversation now rather than waiting for the
/// automatic token threshold. The agent loop recognizes this tool by name
/// and runs the compaction pipeline immediately after this round's results
/// are appended; this tool's own execution is just the acknowledgment the
/// model sees in its tool_result.
pub struct CompressTool;

#[async_trait]
impl Tool for CompressTool {
    fn name(&self) -> &str {
        "compress"
    }

    fn description(&self) -> &str {
        "Summarize and compress the conversation so far, freeing up context. \
         Use this when the transcript has grown long with work that is now settled."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        ToolOutput::ok(&call.id, "Compressing conversation context.")
    }
}
