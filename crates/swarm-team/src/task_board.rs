// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Task Board: file-backed durable tasks with a dependency graph.
//!
//! All state lives on disk under `.tasks/task_<id>.json`; the in-memory
//! cache exists purely for convenience. Every mutation serializes through a
//! single `tokio::sync::Mutex` and is written whole-file (temp + rename) so
//! concurrent readers never observe a torn file.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::TaskBoardError;
use crate::fsutil::write_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Deleted,
}

impl TaskStatus {
    fn glyph(self) -> &'static str {
        match self {
            TaskStatus::Pending => "\u{25cb}",    // ○
            TaskStatus::InProgress => "\u{25d0}", // ◐
            TaskStatus::Completed => "\u{25cf}",  // ●
            TaskStatus::Deleted => "\u{2715}",    // ✕
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub subject: String,
    pub description: String,
    pub status: TaskStatus,
    pub owner: Option<String>,
    #[serde(default)]
    pub blocked_by: BTreeSet<u64>,
    #[serde(default)]
    pub blocks: BTreeSet<u64>,
}

impl Task {
    /// A task is claimable iff pending, unowned, and nothing blocks it.
    pub fn is_claimable(&self) -> bool {
        self.status == TaskStatus::Pending && self.owner.is_none() && self.blocked_by.is_empty()
    }
}

pub struct TaskBoard {
    dir: PathBuf,
    cache: Mutex<HashMap<u64, Task>>,
}

impl TaskBoard {
    /// Load every `task_*.json` file under `dir` into the in-memory cache.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, TaskBoardError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let mut cache = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let body = std::fs::read_to_string(&path)?;
            let task: Task = serde_json::from_str(&body)
                .map_err(|e| TaskBoardError::Corrupt(format!("{}: {e}", path.display())))?;
            cache.insert(task.id, task);
        }
        Ok(Self { dir, cache: Mutex::new(cache) })
    }

    fn path_for(&self, id: u64) -> PathBuf {
        self.dir.join(format!("task_{id}.json"))
    }

    fn persist(&self, task: &Task) -> Result<(), TaskBoardError> {
        let body = serde_json::to_string_pretty(task)
            .map_err(|e| TaskBoardError::Corrupt(e.to_string()))?;
        write_atomic(&self.path_for(task.id), &body)?;
        Ok(())
    }

    pub async fn create(&self, subject: String, description: String) -> Result<Task, TaskBoardError> {
        let mut cache = self.cache.lock().await;
        let next_id = cache.keys().copied().max().map(|m| m + 1).unwrap_or(1);
        let task = Task {
            id: next_id,
            subject,
            description,
            status: TaskStatus::Pending,
            owner: None,
            blocked_by: BTreeSet::new(),
            blocks: BTreeSet::new(),
        };
        self.persist(&task)?;
        cache.insert(task.id, task.clone());
        Ok(task)
    }

    pub async fn get(&self, id: u64) -> Result<Task, TaskBoardError> {
        let cache = self.cache.lock().await;
        cache.get(&id).cloned().ok_or(TaskBoardError::NotFound(id))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        id: u64,
        status: Option<TaskStatus>,
        add_blocked_by: &[u64],
        add_blocks: &[u64],
    ) -> Result<Task, TaskBoardError> {
        let mut cache = self.cache.lock().await;
        let mut task = cache.get(&id).cloned().ok_or(TaskBoardError::NotFound(id))?;

        if let Some(status) = status {
            task.status = status;
        }
        task.blocked_by.extend(add_blocked_by.iter().copied());
        task.blocks.extend(add_blocks.iter().copied());

        if task.status == TaskStatus::Deleted {
            std::fs::remove_file(self.path_for(id)).ok();
            cache.remove(&id);
            return Ok(task);
        }

        self.persist(&task)?;
        cache.insert(id, task.clone());

        if task.status == TaskStatus::Completed {
            let others: Vec<u64> = cache.keys().copied().filter(|&other| other != id).collect();
            for other_id in others {
                if let Some(other) = cache.get_mut(&other_id) {
                    if other.blocked_by.remove(&id) {
                        let snapshot = other.clone();
                        self.persist(&snapshot)?;
                    }
                }
            }
        }

        Ok(task)
    }

    pub async fn claim(&self, id: u64, owner: &str) -> Result<Task, TaskBoardError> {
        let mut cache = self.cache.lock().await;
        let mut task = cache.get(&id).cloned().ok_or(TaskBoardError::NotFound(id))?;
        task.owner = Some(owner.to_string());
        task.status = TaskStatus::InProgress;
        self.persist(&task)?;
        cache.insert(id, task.clone());
        Ok(task)
    }

    /// The first claimable task, if any, without claiming it.
    pub async fn find_claimable(&self) -> Option<Task> {
        let cache = self.cache.lock().await;
        let mut candidates: Vec<&Task> = cache.values().filter(|t| t.is_claimable()).collect();
        candidates.sort_by_key(|t| t.id);
        candidates.first().map(|t| (*t).clone())
    }

    pub async fn list(&self) -> String {
        let cache = self.cache.lock().await;
        if cache.is_empty() {
            return "(no tasks)".to_string();
        }
        let mut tasks: Vec<&Task> = cache.values().collect();
        tasks.sort_by_key(|t| t.id);
        tasks
            .iter()
            .map(|t| {
                let owner = t.owner.as_deref().unwrap_or("none");
                let blockers = if t.blocked_by.is_empty() {
                    String::new()
                } else {
                    format!(
                        " blockedBy=[{}]",
                        t.blocked_by.iter().map(u64::to_string).collect::<Vec<_>>().join(",")
                    )
                };
                format!("#{} {} {} (owner: {}){}", t.id, t.status.glyph(), t.subject, owner, blockers)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
