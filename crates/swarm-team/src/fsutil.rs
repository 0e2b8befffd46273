// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Whole-file atomic replace: write to a sibling temp file, then rename over
//! the destination. Tolerates readers that open the file mid-write, since a
//! rename is atomic on the same filesystem.

use std::path::Path;

pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}
