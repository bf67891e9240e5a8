// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace records: isolated repository checkouts managed by the pool.
//!
//! A workspace name (`ws-001`) is distinct from its path; names are allocated
//! sequentially per repo and never reused within a repo's lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Format the Nth workspace name for a repo.
pub fn workspace_name(n: usize) -> String {
    format!("ws-{n:03}")
}

/// A pooled repository checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRecord {
    pub name: String,
    pub repo_alias: String,
    pub path: PathBuf,
    /// Human-readable reason this workspace was last acquired.
    #[serde(default)]
    pub purpose: String,
    pub acquired: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl WorkspaceRecord {
    /// Key under which this record lives in the state file.
    pub fn key(&self) -> String {
        state_key(&self.repo_alias, &self.name)
    }
}

/// Compose the state-file key for a workspace: `alias/name`.
pub fn state_key(repo_alias: &str, name: &str) -> String {
    format!("{repo_alias}/{name}")
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
