// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared path-containment check used by the file tools so a model-supplied
//! path can never escape the workspace root.

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Lexically normalizes `path`, resolving `.` and `..` components without
/// touching the filesystem (the target may not exist yet).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolves `path` relative to `workdir` and rejects it if the result does
/// not stay inside `workdir`. Grounded in the Python original's `safe_path`.
pub fn safe_path(workdir: &Path, path: &str) -> Result<PathBuf, String> {
    let workdir = normalize(workdir);
    let resolved = normalize(&workdir.join(path));
    if !resolved.starts_with(&workdir) {
        return Err(format!("Error: Path escapes workspace: {path}"));
    }
    Ok(resolved)
}

/// Shared, mutable workspace root. File and shell tools hold a clone of this
/// handle so that `set_workdir` changes where they all operate without
/// needing to re-register the tool set.
#[derive(Clone)]
pub struct WorkdirHandle(Arc<RwLock<PathBuf>>);

impl WorkdirHandle {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self(Arc::new(RwLock::new(dir.into())))
    }

    pub fn get(&self) -> PathBuf {
        self.0.read().expect("workdir lock poisoned").clone()
    }

    pub fn set(&self, dir: PathBuf) {
        *self.0.write().expect("workdir lock poisoned") = dir;
    }
}
