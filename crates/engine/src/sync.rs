// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Copy a finished job's workspace outputs back into the repository root.
//!
//! Single-host compromise: a distributed setup would push changes through
//! the VCS rather than copy.

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Entries never copied out of a workspace.
const SKIPPED: [&str; 2] = [".jj", ".git"];

/// Internal meta-file prefix.
const META_PREFIX: &str = ".incrementum";

fn skipped(name: &str) -> bool {
    name.starts_with('.') || SKIPPED.contains(&name) || name.starts_with(META_PREFIX)
}

/// Copy all regular (non-dotfile) files from `ws_path` into `repo_root`,
/// skipping version-control internals and `.incrementum*` meta files.
/// Returns the number of files copied.
pub fn sync_outputs(ws_path: &Path, repo_root: &Path) -> io::Result<usize> {
    let mut copied = 0;
    copy_dir(ws_path, repo_root, &mut copied)?;
    debug!(
        from = %ws_path.display(),
        to = %repo_root.display(),
        copied,
        "workspace outputs synced"
    );
    Ok(copied)
}

fn copy_dir(from: &Path, to: &Path, copied: &mut usize) -> io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if skipped(&name) {
            continue;
        }
        let source = entry.path();
        let target = to.join(&name);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            copy_dir(&source, &target, copied)?;
        } else if file_type.is_file() {
            fs::copy(&source, &target)?;
            *copied += 1;
        }
        // Symlinks and other special files are left behind.
    }
    Ok(())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
