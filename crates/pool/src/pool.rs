// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace acquire/release over the state file and VCS client.

use crate::canonicalize_repo;
use incr_core::{Clock, SystemClock, TodoId, WorkspaceRecord};
use incr_storage::{StateError, StateFile};
use incr_vcs::{Vcs, VcsError};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("repo path not found: {0}")]
    RepoPathNotFound(PathBuf),
    #[error("no workspace root contains {0}")]
    WorkspaceRootNotFound(PathBuf),
    #[error("unknown workspace: {0}")]
    UnknownWorkspace(PathBuf),
    #[error("a session for todo {0} is already active")]
    SessionAlreadyActive(TodoId),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session not active: {0}")]
    SessionNotActive(String),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Options for acquiring a workspace.
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    /// Human-readable reason recorded on the workspace.
    pub purpose: String,
    /// Working revision to check out, if any.
    pub rev: Option<String>,
    /// When set, a fresh empty child revision is created and described
    /// before the workspace is returned.
    pub new_change_message: Option<String>,
}

impl AcquireOptions {
    pub fn purpose(purpose: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            ..Self::default()
        }
    }
}

/// Stateful allocator of repository checkouts, keyed by repo alias.
#[derive(Clone)]
pub struct WorkspacePool<V: Vcs, C: Clock = SystemClock> {
    pub(crate) state: StateFile,
    pub(crate) vcs: V,
    workspaces_dir: PathBuf,
    pub(crate) clock: C,
}

/// Outcome of the locked reservation step in acquire.
enum Reservation {
    Reused(WorkspaceRecord),
    Created(WorkspaceRecord),
}

impl<V: Vcs> WorkspacePool<V> {
    pub fn new(state: StateFile, vcs: V, workspaces_dir: PathBuf) -> Self {
        Self::with_clock(state, vcs, workspaces_dir, SystemClock)
    }
}

impl<V: Vcs, C: Clock> WorkspacePool<V, C> {
    pub fn with_clock(state: StateFile, vcs: V, workspaces_dir: PathBuf, clock: C) -> Self {
        Self {
            state,
            vcs,
            workspaces_dir,
            clock,
        }
    }

    pub fn state(&self) -> &StateFile {
        &self.state
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Acquire a workspace for `repo_path`.
    ///
    /// Reuses a released workspace when one exists, otherwise creates the
    /// next `ws-NNN` checkout. On return the directory is a working checkout
    /// with no other live acquirer.
    pub async fn acquire(
        &self,
        repo_path: &Path,
        opts: AcquireOptions,
    ) -> Result<PathBuf, PoolError> {
        let repo = canonicalize_repo(repo_path)?;
        let now = self.clock.now();

        // Reservation happens entirely under the state lock; VCS work stays
        // outside it.
        let purpose = opts.purpose.clone();
        let workspaces_dir = self.workspaces_dir.clone();
        let repo_key = repo.clone();
        let reservation = self.state.update(move |doc| {
            let alias = doc.get_or_create_repo_alias(&repo_key);
            let free = doc
                .workspaces_for(&alias)
                .iter()
                .find(|ws| !ws.acquired)
                .map(|ws| ws.name.clone());

            if let Some(name) = free {
                if let Some(record) = doc.workspace_mut(&alias, &name) {
                    record.acquired = true;
                    record.purpose = purpose.clone();
                    record.last_used_at = now;
                    return Reservation::Reused(record.clone());
                }
            }

            let name = doc.next_workspace_name(&alias);
            let record = WorkspaceRecord {
                name: name.clone(),
                repo_alias: alias.clone(),
                path: workspaces_dir.join(&alias).join(&name),
                purpose: purpose.clone(),
                acquired: true,
                created_at: now,
                last_used_at: now,
            };
            doc.workspaces.insert(record.key(), record.clone());
            Reservation::Created(record)
        })?;

        let (record, created) = match reservation {
            Reservation::Reused(record) => (record, false),
            Reservation::Created(record) => (record, true),
        };

        if created {
            if let Err(e) = self.create_checkout(&repo, &record).await {
                self.rollback_created(&record);
                return Err(e);
            }
        }

        if let Err(e) = self.prepare_checkout(&record.path, &opts).await {
            self.release_record(&record);
            return Err(e);
        }

        debug!(
            workspace = %record.name,
            path = %record.path.display(),
            purpose = %opts.purpose,
            reused = !created,
            "workspace acquired"
        );
        Ok(record.path)
    }

    async fn create_checkout(
        &self,
        repo: &Path,
        record: &WorkspaceRecord,
    ) -> Result<(), PoolError> {
        if let Some(parent) = record.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.vcs
            .workspace_add(repo, &record.name, &record.path)
            .await?;
        Ok(())
    }

    async fn prepare_checkout(
        &self,
        ws_path: &Path,
        opts: &AcquireOptions,
    ) -> Result<(), PoolError> {
        // Staleness detection in the tool is advisory; subsequent commands
        // retry naturally.
        if let Err(e) = self.vcs.workspace_update_stale(ws_path).await {
            warn!(path = %ws_path.display(), error = %e, "stale working copy repair failed");
        }

        if let Some(rev) = &opts.rev {
            self.vcs.edit(ws_path, rev).await?;
        }
        if let Some(message) = &opts.new_change_message {
            let parent = opts.rev.as_deref().unwrap_or("@");
            self.vcs.new_change(ws_path, parent).await?;
            self.vcs.describe(ws_path, message).await?;
        }
        Ok(())
    }

    fn rollback_created(&self, record: &WorkspaceRecord) {
        let key = record.key();
        if let Err(e) = self.state.update(|doc| {
            doc.workspaces.remove(&key);
        }) {
            warn!(workspace = %record.name, error = %e, "workspace rollback failed");
        }
    }

    fn release_record(&self, record: &WorkspaceRecord) {
        let key = record.key();
        if let Err(e) = self.state.update(|doc| {
            if let Some(ws) = doc.workspaces.get_mut(&key) {
                ws.acquired = false;
            }
        }) {
            warn!(workspace = %record.name, error = %e, "workspace release failed");
        }
    }

    /// Release the workspace at `ws_path`.
    ///
    /// Releasing an already-released workspace succeeds (documented no-op);
    /// releasing a path the pool has never seen is an error.
    pub fn release(&self, ws_path: &Path) -> Result<(), PoolError> {
        let ws_path = ws_path.to_path_buf();
        let released = self.state.update(|doc| {
            for record in doc.workspaces.values_mut() {
                if record.path == ws_path {
                    record.acquired = false;
                    return true;
                }
            }
            false
        })?;
        if released {
            Ok(())
        } else {
            Err(PoolError::UnknownWorkspace(ws_path))
        }
    }

    /// Release a workspace by repo path and name.
    pub fn release_by_name(&self, repo_path: &Path, name: &str) -> Result<(), PoolError> {
        let repo = canonicalize_repo(repo_path)?;
        let ws_name = name.to_string();
        let released = self.state.update(move |doc| {
            let Some(alias) = doc.repo_alias(&repo) else {
                return false;
            };
            if let Some(record) = doc.workspace_mut(&alias, &ws_name) {
                record.acquired = false;
                true
            } else {
                false
            }
        })?;
        if released {
            Ok(())
        } else {
            Err(PoolError::UnknownWorkspace(repo_path.join(name)))
        }
    }

    /// List workspace records for a repo.
    pub fn list(&self, repo_path: &Path) -> Result<Vec<WorkspaceRecord>, PoolError> {
        let repo = canonicalize_repo(repo_path)?;
        let doc = self.state.load()?;
        let Some(alias) = doc.repo_alias(&repo) else {
            return Ok(Vec::new());
        };
        Ok(doc
            .workspaces_for(&alias)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Resolve the workspace name owning `path` by walking up to the nearest
    /// workspace root known to the pool.
    pub fn workspace_name_for_path(&self, path: &Path) -> Result<String, PoolError> {
        let doc = self.state.load()?;
        let mut current = Some(path);
        while let Some(candidate) = current {
            for record in doc.workspaces.values() {
                if record.path == candidate {
                    return Ok(record.name.clone());
                }
            }
            current = candidate.parent();
        }
        Err(PoolError::WorkspaceRootNotFound(path.to_path_buf()))
    }

    /// Mark every acquired workspace of a repo as released.
    ///
    /// Operator-facing sweep for acquisitions stranded by a crashed process.
    /// Nothing calls this automatically; a stuck `acquired` flag only costs
    /// an extra `ws-NNN+1` on the next acquire.
    pub fn release_all(&self, repo_path: &Path) -> Result<usize, PoolError> {
        let repo = canonicalize_repo(repo_path)?;
        let count = self.state.update(move |doc| {
            let Some(alias) = doc.repo_alias(&repo) else {
                return 0;
            };
            let mut count = 0;
            for record in doc.workspaces.values_mut() {
                if record.repo_alias == alias && record.acquired {
                    record.acquired = false;
                    count += 1;
                }
            }
            count
        })?;
        Ok(count)
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
