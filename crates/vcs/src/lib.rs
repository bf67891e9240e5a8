// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! incr-vcs: adapter over the external version-control CLI.
//!
//! This crate is the only place that names the underlying tool (`jj`).
//! Everything else goes through the [`Vcs`] trait.

mod jj;

pub use jj::JjClient;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeVcs, VcsCall};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from VCS operations.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The requested file does not exist at the given revision.
    ///
    /// Read-only consumers treat this as "empty" rather than a failure.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("{command} failed: {output}")]
    Command { command: String, output: String },

    #[error("{command}: {message}")]
    Spawn { command: String, message: String },
}

impl VcsError {
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, VcsError::FileNotFound { .. })
    }
}

/// Substrings in the tool's error output that mean "the path does not exist
/// at that revision" rather than a real failure.
const FILE_NOT_FOUND_MARKERS: [&str; 4] = [
    "no such file",
    "no such path",
    "path does not exist",
    "doesn't exist",
];

/// Classify tool error output as the file-not-found sentinel.
pub(crate) fn is_file_not_found_output(output: &str) -> bool {
    let lower = output.to_lowercase();
    FILE_NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m))
}

/// Client for the external version-control tool.
#[async_trait]
pub trait Vcs: Clone + Send + Sync + 'static {
    /// Initialize a new repository at `path`.
    async fn init(&self, path: &Path) -> Result<(), VcsError>;

    /// List bookmark names in the repo at `path`.
    async fn bookmark_list(&self, path: &Path) -> Result<Vec<String>, VcsError>;

    /// Create a bookmark pointing at `rev`.
    async fn bookmark_create(&self, path: &Path, name: &str, rev: &str) -> Result<(), VcsError>;

    /// Create a new empty change on top of `parent_rev`; returns its change ID.
    async fn new_change(&self, path: &Path, parent_rev: &str) -> Result<String, VcsError>;

    /// Check out `rev` as the working revision of the checkout at `path`.
    async fn edit(&self, path: &Path, rev: &str) -> Result<(), VcsError>;

    /// Change ID of the working revision of the checkout at `path`.
    async fn current_change_id(&self, path: &Path) -> Result<String, VcsError>;

    /// Root directory of the workspace containing `path`.
    async fn workspace_root(&self, path: &Path) -> Result<PathBuf, VcsError>;

    /// Add a named workspace checkout of `repo` at `ws_path`.
    async fn workspace_add(&self, repo: &Path, name: &str, ws_path: &Path)
        -> Result<(), VcsError>;

    /// List workspace names of `repo`.
    async fn workspace_list(&self, repo: &Path) -> Result<Vec<String>, VcsError>;

    /// Forget a named workspace of `repo`.
    async fn workspace_forget(&self, repo: &Path, name: &str) -> Result<(), VcsError>;

    /// Repair a stale working copy. Advisory — callers may ignore errors.
    async fn workspace_update_stale(&self, ws_path: &Path) -> Result<(), VcsError>;

    /// Read a file's contents at `rev`. Missing files yield
    /// [`VcsError::FileNotFound`].
    async fn file_show(
        &self,
        repo: &Path,
        rev: &str,
        relative_path: &str,
    ) -> Result<Vec<u8>, VcsError>;

    /// Snapshot the working copy at `ws_path` into the repository.
    async fn snapshot(&self, ws_path: &Path) -> Result<(), VcsError>;

    /// Set the working revision's description.
    async fn describe(&self, ws_path: &Path, message: &str) -> Result<(), VcsError>;

    /// Commit the working copy with the given message.
    async fn commit(&self, ws_path: &Path, message: &str) -> Result<(), VcsError>;
}
