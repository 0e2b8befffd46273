// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use swarm_runtime::SkillInfo;

/// All optional contextual blocks that can be injected into the system prompt.
#[derive(Debug)]
pub struct PromptContext<'a> {
    /// Absolute path to the project root (from `.git` detection).
    pub project_root: Option<&'a Path>,
    /// Pre-formatted git context (branch, commit, dirty status).
    pub git_context: Option<&'a str>,
    /// Contents of the project context file (AGENTS.md / .swarmctl/context.md).
    pub project_context_file: Option<&'a str>,
    /// Pre-formatted CI environment block.
    pub ci_context: Option<&'a str>,
    /// Text appended verbatim after the default Guidelines section.
    pub append: Option<&'a str>,
    /// Discovered skills. Metadata (name + description) is injected into the
    /// system prompt so the model always knows what skills are available.
    pub skills: Arc<[SkillInfo]>,
}

impl<'a> Default for PromptContext<'a> {
    fn default() -> Self {
        Self {
            project_root: None,
            git_context: None,
            project_context_file: None,
            ci_context: None,
            append: None,
            skills: Arc::from(Vec::<SkillInfo>::new()),
        }
    }
}

// ─── Guidelines ──────────────────────────────────────────────────────────────

mod guidelines {
    pub fn general() -> &'static str {
        "- Be concise and precise. Use tools instead of guessing.\n\
         - Keep your own todo list current with `todo_write` for any multi-step task."
    }

    pub fn tool_usage() -> &'static str {
        "- Prefer `edit_file` over `write` for modifying existing files.\n\
         - Discovery workflow: `glob` to find files → `grep` to narrow → `read_file` for context.\n\
         - Batch independent tool calls in parallel — read all potentially relevant files in one turn."
    }

    pub fn code_quality() -> &'static str {
        "- Do not add features or abstractions beyond what was asked.\n\
         - NEVER create new files proactively unless explicitly requested.\n\
         - Write tests for new functionality in the style already used in the repo.\n\
         - Preserve existing code structure and coding style."
    }

    pub fn workflow_efficiency() -> &'static str {
        "- Use `todo_write` for multi-step tasks (3+ steps); update it as each step completes.\n\
         - Use `background_run` for long shell commands you don't need to block on.\n\
         - When delegating bounded, read-mostly work, use the `task` tool rather than doing it inline.\n\
         - Always complete every open todo before ending your turn."
    }

    pub fn error_handling() -> &'static str {
        "- When a tool fails, try a different approach before giving up.\n\
         - NEVER skip git hooks or force-push without explicit user permission.\n\
         - Report tool errors to the user rather than silently retrying forever."
    }
}

// ─── Skills section ────────────────────────────────────────────────────────

/// Maximum total characters for the `<available_skills>` block in the system
/// prompt. A linear fit pass is used to stay within this budget.
pub const MAX_SKILLS_PROMPT_CHARS: usize = 30_000;

/// Format the available-skills block for injection into the system prompt.
///
/// Returns an empty string when `skills` is empty.
pub fn build_skills_section(skills: &[SkillInfo]) -> String {
    if skills.is_empty() {
        return String::new();
    }

    let entries: Vec<String> = skills
        .iter()
        .map(|s| {
            format!(
                "  <skill>\n    <name>{}</name>\n    <description>{}</description>\n  </skill>",
                s.name,
                s.description.trim()
            )
        })
        .collect();

    let mut used = 0usize;
    let fitted_count = entries
        .iter()
        .take_while(|e| {
            let next = used + e.len();
            if next <= MAX_SKILLS_PROMPT_CHARS {
                used = next;
                true
            } else {
                false
            }
        })
        .count();

    if fitted_count == 0 {
        return String::new();
    }

    let fitted = &entries[..fitted_count];
    let truncation_note = if fitted_count < entries.len() {
        format!(
            "\n⚠ Skills truncated: showing {} of {}.",
            fitted_count,
            skills.len()
        )
    } else {
        String::new()
    };

    format!(
        "## Skills\n\n\
         When the current task matches one of the available skills below, call the \
         `load_skill` tool to load its full instructions before proceeding. Use the \
         `<description>` to decide which skill, if any, applies — load at most one \
         skill per task.{truncation_note}\n\n\
         <available_skills>\n{}\n</available_skills>",
        fitted.join("\n"),
    )
}

fn build_guidelines_section() -> String {
    format!(
        "## Guidelines\n\n\
         ### General Principles\n\
         {}\n\n\
         ### Tool Usage Patterns\n\
         {}\n\n\
         ### Code Quality\n\
         {}\n\n\
         ### Workflow Efficiency\n\
         {}\n\n\
         ### Error Handling\n\
         {}",
        guidelines::general(),
        guidelines::tool_usage(),
        guidelines::code_quality(),
        guidelines::workflow_efficiency(),
        guidelines::error_handling(),
    )
}

/// Build the system prompt for the lead agent loop.
///
/// `role` names the agent's position in the swarm ("lead", a teammate name,
/// or a subagent's `agent_type`) so the model knows which capabilities and
/// coordination primitives apply to it. `ctx` carries optional project / CI /
/// git context injected when running headless.
pub fn system_prompt(role: &str, custom: Option<&str>, ctx: PromptContext<'_>) -> String {
    if let Some(custom) = custom {
        if let Some(extra) = ctx.append {
            return format!("{}\n\n{}", custom.trim_end(), extra);
        }
        return custom.to_string();
    }

    let identity = format!(
        "You are swarmctl, a specialized AI coding agent operating as `{role}`.\n\n\
         Current date and time: `{now}`\n\
         Current working directory: `{cwd}`\n\n\
         Core capabilities:\n\
         - Read, write, and edit files; run shell commands; search the codebase.\n\
         - Track multi-step work with a todo list.\n\
         - Delegate bounded subtasks to subagents via the `task` tool.\n\
         - Launch long-running shell work in the background and poll for results.\n\
         - Coordinate with teammates over a shared message bus and task board.",
        now = Local::now().format("%Y-%m-%d %H:%M:%S"),
        cwd = std::env::current_dir().unwrap_or_default().display(),
    );

    let project_section = if let Some(root) = ctx.project_root {
        format!(
            "\n\n## Project Context\n\
             Project root directory: `{}`\n\
             - Use this absolute path for all file read/write operations.\n\
             - Prefer absolute paths over relative paths in every tool call.",
            root.display()
        )
    } else {
        String::new()
    };

    let git_section = ctx
        .git_context
        .map(|g| format!("\n\n{g}"))
        .unwrap_or_default();

    let context_file_section = ctx
        .project_context_file
        .map(|content| format!("\n\n## Project Instructions\n\n{content}"))
        .unwrap_or_default();

    let ci_section = ctx
        .ci_context
        .map(|ci| format!("\n\n{ci}"))
        .unwrap_or_default();

    let skills_section = {
        let s = build_skills_section(&ctx.skills);
        if s.is_empty() { String::new() } else { format!("\n\n{s}") }
    };

    let guidelines_section = build_guidelines_section();

    let append_section = ctx
        .append
        .map(|extra| format!("\n\n{extra}"))
        .unwrap_or_default();

    format!(
        "{identity}{project_section}{git_section}{context_file_section}{skills_section}\
         {ci_section}\n\n{guidelines_section}{append_section}",
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }
    fn empty() -> PromptContext<'static> {
        PromptContext::default()
    }

    fn make_test_skill(name: &str, description: &str) -> SkillInfo {
        SkillInfo {
            name: name.to_string(),
            description: description.to_string(),
            tags: None,
            body: format!("## {name} content"),
            path: PathBuf::from(format!("/tmp/{name}/SKILL.md")),
        }
    }

    #[test]
    fn custom_prompt_is_returned_verbatim() {
        let prompt = system_prompt("lead", Some("Custom instructions here."), empty());
        assert_eq!(prompt, "Custom instructions here.");
    }

    #[test]
    fn custom_prompt_with_append() {
        let ctx = PromptContext { append: Some("Extra rule."), ..Default::default() };
        let prompt = system_prompt("lead", Some("Base."), ctx);
        assert!(prompt.contains("Base."));
        assert!(prompt.contains("Extra rule."));
    }

    #[test]
    fn role_name_appears_in_prompt() {
        let pr = system_prompt("teammate:reviewer", None, empty());
        assert!(pr.contains("teammate:reviewer"));
    }

    #[test]
    fn identifies_as_swarmctl() {
        let pr = system_prompt("lead", None, empty());
        assert!(pr.contains("swarmctl"));
    }

    #[test]
    fn mentions_core_capabilities() {
        let pr = system_prompt("lead", None, empty());
        assert!(pr.contains("Core capabilities"));
        assert!(pr.contains("message bus"));
    }

    #[test]
    fn project_root_appears_in_prompt() {
        let root = p("/home/user/my-project");
        let ctx = PromptContext { project_root: Some(&root), ..Default::default() };
        let pr = system_prompt("lead", None, ctx);
        assert!(pr.contains("/home/user/my-project"));
        assert!(pr.contains("Project Context"));
    }

    #[test]
    fn no_project_root_no_section() {
        let pr = system_prompt("lead", None, empty());
        assert!(!pr.contains("Project Context"));
    }

    #[test]
    fn ci_context_is_appended() {
        let ci = "## CI Environment\nRunning in: GitHub Actions\nBranch: main";
        let ctx = PromptContext { ci_context: Some(ci), ..Default::default() };
        let pr = system_prompt("lead", None, ctx);
        assert!(pr.contains("GitHub Actions"));
        assert!(pr.contains("Branch: main"));
    }

    #[test]
    fn git_context_appears_in_prompt() {
        let git = "## Git Context\nBranch: main\nCommit: abc1234";
        let ctx = PromptContext { git_context: Some(git), ..Default::default() };
        let pr = system_prompt("lead", None, ctx);
        assert!(pr.contains("Git Context"));
        assert!(pr.contains("abc1234"));
    }

    #[test]
    fn project_context_file_appears_in_prompt() {
        let file_content = "Always write tests for every function.";
        let ctx = PromptContext { project_context_file: Some(file_content), ..Default::default() };
        let pr = system_prompt("lead", None, ctx);
        assert!(pr.contains("Project Instructions"));
        assert!(pr.contains("Always write tests"));
    }

    #[test]
    fn append_section_is_added_after_guidelines() {
        let ctx = PromptContext { append: Some("Custom rule: never delete files."), ..Default::default() };
        let pr = system_prompt("lead", None, ctx);
        let guidelines_pos = pr.find("Guidelines").unwrap();
        let append_pos = pr.find("Custom rule").unwrap();
        assert!(append_pos > guidelines_pos);
    }

    #[test]
    fn guidelines_section_has_multiple_categories() {
        let pr = system_prompt("lead", None, empty());
        assert!(pr.contains("### General Principles"));
        assert!(pr.contains("### Tool Usage Patterns"));
        assert!(pr.contains("### Code Quality"));
        assert!(pr.contains("### Workflow Efficiency"));
        assert!(pr.contains("### Error Handling"));
    }

    #[test]
    fn guidelines_mention_todo_write() {
        let pr = system_prompt("lead", None, empty());
        assert!(pr.contains("todo_write"));
    }

    // ── Skills section tests ─────────────────────────────────────────────────

    #[test]
    fn system_prompt_includes_skills_section_when_skills_provided() {
        let skills = vec![make_test_skill("git-workflow", "Use when the user asks about git.")];
        let ctx = PromptContext { skills: Arc::from(skills.into_boxed_slice()), ..Default::default() };
        let pr = system_prompt("lead", None, ctx);
        assert!(pr.contains("## Skills"));
        assert!(pr.contains("git-workflow"));
        assert!(pr.contains("available_skills"));
        assert!(pr.contains("load_skill"));
    }

    #[test]
    fn system_prompt_no_skills_no_section() {
        let pr = system_prompt("lead", None, empty());
        assert!(!pr.contains("## Skills"));
        assert!(!pr.contains("<available_skills>"));
    }

    #[test]
    fn skills_section_char_budget_truncates_large_sets() {
        let skills: Vec<_> = (0..400)
            .map(|i| make_test_skill(&format!("skill-{i:03}"), &"This skill does task number. ".repeat(20)))
            .collect();
        let section = build_skills_section(&skills);
        assert!(section.len() <= MAX_SKILLS_PROMPT_CHARS + 500);
        assert!(section.contains("⚠ Skills truncated"));
    }

    #[test]
    fn build_skills_section_empty_returns_empty_string() {
        let section = build_skills_section(&[]);
        assert!(section.is_empty());
    }

    #[test]
    fn build_skills_section_single_skill_includes_xml_tags() {
        let skills = vec![make_test_skill("my-skill", "Does something.")];
        let section = build_skills_section(&skills);
        assert!(section.contains("<available_skills>"));
        assert!(section.contains("</available_skills>"));
        assert!(section.contains("<name>my-skill</name>"));
        assert!(section.contains("<description>Does something.</description>"));
    }
}
