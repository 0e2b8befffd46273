// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod events;
pub mod registry;
pub mod tool;

pub use events::{TodoItem, ToolEvent};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{OutputCategory, Tool, ToolCall, ToolOutput};

pub use builtin::bash::BashTool;
pub use builtin::compress::CompressTool;
pub use builtin::edit_file::EditFileTool;
pub use builtin::load_skill::LoadSkillTool;
pub use builtin::read_file::ReadFileTool;
pub use builtin::set_workdir::SetWorkdirTool;
pub use builtin::todo_write::TodoWriteTool;
pub use builtin::web_search::WebSearchTool;
pub use builtin::workspace::WorkdirHandle;
pub use builtin::write_file::WriteFileTool;
