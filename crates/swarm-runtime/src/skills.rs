// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Skill catalog: discovery and two-layer loading of on-disk skill files.
//!
//! A skill is one `*.md` file living directly under `<skills_dir>/<name>/`.
//! The directory name is the skill's name; the catalog is scanned once at
//! startup. Each file may carry a simple `key: value` front-matter block
//! delimited by `---` lines ahead of its body.
//!
//! ```text
//! skills/
//! ├── git-workflow/
//! │   └── SKILL.md
//! └── testing/
//!     └── SKILL.md
//! ```
//!
//! Two layers keep the system prompt cheap: [`Descriptions`] formats a short
//! `name: description [tags]` line per skill for the prompt; [`Load`] returns
//! a skill's full body on demand, wrapped in a `<skill name="…">…</skill>`
//! envelope, as a tool_result.

use std::path::{Path, PathBuf};

use crate::shared::Shared;

/// A single parsed skill: its front-matter metadata and body.
#[derive(Debug, Clone)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
    pub tags: Option<String>,
    pub body: String,
    pub path: PathBuf,
}

pub type SharedSkills = Shared<SkillInfo>;

impl Shared<SkillInfo> {
    /// Re-run skill discovery and atomically replace the skill list.
    pub fn refresh(&self, skills_dir: &Path) {
        self.set(discover_skills(skills_dir));
    }
}

/// Split `text` into its front-matter key/value pairs and body.
///
/// Front matter is a `---`-delimited block of `key: value` lines; there is
/// no nested YAML. Text with no leading `---` fence is treated as having no
/// front matter and returned whole as the body.
fn parse_frontmatter(text: &str) -> (Vec<(String, String)>, String) {
    let Some(after_open) = text.strip_prefix("---\n") else {
        return (Vec::new(), text.to_string());
    };
    let Some(close) = after_open.find("\n---\n") else {
        return (Vec::new(), text.to_string());
    };

    let meta_block = &after_open[..close];
    let body = after_open[close + 5..].trim().to_string();

    let meta = meta_block
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    (meta, body)
}

fn meta_get<'a>(meta: &'a [(String, String)], key: &str) -> Option<&'a str> {
    meta.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Scan `skills_dir` for skills. Every immediate subdirectory that contains
/// at least one `*.md` file becomes one skill named after that directory;
/// when a skill directory holds several markdown files, the first in sorted
/// order is used.
#[must_use]
pub fn discover_skills(skills_dir: &Path) -> Vec<SkillInfo> {
    let Ok(entries) = std::fs::read_dir(skills_dir) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries.flatten().map(|e| e.path()).filter(|p| p.is_dir()).collect();
    dirs.sort();

    let mut skills = Vec::new();
    for dir in dirs {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else { continue };

        let mut md_files: Vec<PathBuf> = std::fs::read_dir(&dir)
            .into_iter()
            .flatten()
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("md")).unwrap_or(false))
            .collect();
        md_files.sort();

        let Some(md_path) = md_files.into_iter().next() else { continue };
        let Ok(raw) = std::fs::read_to_string(&md_path) else { continue };

        let (meta, body) = parse_frontmatter(&raw);
        let description = meta_get(&meta, "description").unwrap_or("No description").to_string();
        let tags = meta_get(&meta, "tags").map(|s| s.to_string());

        skills.push(SkillInfo { name: name.to_string(), description, tags, body, path: md_path });
    }

    skills
}

/// Format the system-prompt layer: one `name: description [tags]` line per
/// skill, or a placeholder when the catalog is empty.
#[must_use]
pub fn format_descriptions(skills: &[SkillInfo]) -> String {
    if skills.is_empty() {
        return "(no skills available)".to_string();
    }
    skills
        .iter()
        .map(|s| match &s.tags {
            Some(tags) if !tags.is_empty() => format!("  - {}: {} [{}]", s.name, s.description, tags),
            _ => format!("  - {}: {}", s.name, s.description),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Load one skill's full body wrapped in a `<skill>` envelope for use as a
/// tool_result. Returns an error string enumerating available skills when
/// `name` is not in the catalog.
#[must_use]
pub fn load_skill(skills: &[SkillInfo], name: &str) -> String {
    match skills.iter().find(|s| s.name == name) {
        Some(skill) => format!("<skill name=\"{}\">\n{}\n</skill>", skill.name, skill.body),
        None => {
            let available = skills.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ");
            format!("Error: Unknown skill '{name}'. Available: {available}")
        }
    }
}
