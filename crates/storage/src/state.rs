// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The state document: repo aliases, workspace, job, and session records.

use incr_core::{workspace, JobRecord, SessionRecord, WorkspaceRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The single JSON document under the state directory.
///
/// Repo aliases keep workspace/job records portable across absolute-path
/// changes (e.g. symlink resolution). Workspace keys are `alias/name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDoc {
    #[serde(default)]
    pub repos: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub workspaces: BTreeMap<String, WorkspaceRecord>,
    #[serde(default)]
    pub jobs: BTreeMap<String, JobRecord>,
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionRecord>,
    /// Records owned by the external opencode integration; carried opaquely
    /// so updates from this process never drop them.
    #[serde(
        default,
        rename = "opencodeSessions",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub opencode_sessions: BTreeMap<String, Value>,
}

impl StateDoc {
    /// Look up the alias for a canonicalized repo path, assigning a stable
    /// `repo-NNN` alias on first use.
    pub fn get_or_create_repo_alias(&mut self, abs_path: &Path) -> String {
        if let Some(alias) = self
            .repos
            .iter()
            .find(|(_, path)| path.as_path() == abs_path)
            .map(|(alias, _)| alias.clone())
        {
            return alias;
        }
        let mut n = self.repos.len() + 1;
        let alias = loop {
            let candidate = format!("repo-{n:03}");
            if !self.repos.contains_key(&candidate) {
                break candidate;
            }
            n += 1;
        };
        self.repos.insert(alias.clone(), abs_path.to_path_buf());
        alias
    }

    /// Alias for a repo path, if one has been assigned.
    pub fn repo_alias(&self, abs_path: &Path) -> Option<String> {
        self.repos
            .iter()
            .find(|(_, path)| path.as_path() == abs_path)
            .map(|(alias, _)| alias.clone())
    }

    /// All workspace records belonging to a repo alias, name order.
    pub fn workspaces_for(&self, alias: &str) -> Vec<&WorkspaceRecord> {
        self.workspaces
            .values()
            .filter(|ws| ws.repo_alias == alias)
            .collect()
    }

    /// Next sequential workspace name for a repo alias.
    ///
    /// Counts existing records rather than tracking a counter, so names are
    /// never reused while any record for them remains.
    pub fn next_workspace_name(&self, alias: &str) -> String {
        let count = self
            .workspaces
            .values()
            .filter(|ws| ws.repo_alias == alias)
            .count();
        workspace::workspace_name(count + 1)
    }

    pub fn workspace(&self, alias: &str, name: &str) -> Option<&WorkspaceRecord> {
        self.workspaces.get(&workspace::state_key(alias, name))
    }

    pub fn workspace_mut(&mut self, alias: &str, name: &str) -> Option<&mut WorkspaceRecord> {
        self.workspaces.get_mut(&workspace::state_key(alias, name))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
