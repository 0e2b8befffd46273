// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool that loads a named skill's full body into the conversation context —
//! the second layer of the two-layer skill injection model. The first layer
//! (descriptions) is injected into the system prompt separately.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use swarm_runtime::{load_skill, SkillInfo};

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct LoadSkillTool {
    skills: Arc<[SkillInfo]>,
}

impl LoadSkillTool {
    pub fn new(skills: Arc<[SkillInfo]>) -> Self {
        Self { skills }
    }
}

#[async_trait]
impl Tool for LoadSkillTool {
    fn name(&self) -> &str {
        "load_skill"
    }

    fn description(&self) -> &str {
        "Load specialized knowledge by name. Use this to access a skill's full \
         instructions before tackling unfamiliar topics listed in Skills available."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Skill name to load"
                }
            },
            "required": ["name"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let name = match call.args.get("name").and_then(|v| v.as_str()) {
            Some(n) => n.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'name' argument"),
        };

        debug!(skill = %name, "load_skill tool");

        let content = load_skill(&self.skills, &name);
        if content.starts_with("Error:") {
            ToolOutput::err(&call.id, content)
        } else {
            ToolOutput::ok(&call.id, content)
        }
    }
}
