// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake VCS for testing
//!
//! Keeps repos, changes, bookmarks, and workspaces in memory, but
//! materializes checkouts to real directories so callers that do direct
//! file I/O inside a checkout (the todo store, the job runner) behave the
//! same as against the real tool.
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::{Vcs, VcsError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Change ID of the repository root revision.
pub const ROOT_CHANGE: &str = "zzzzzzzz";

/// Recorded VCS call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Init { path: PathBuf },
    BookmarkCreate { name: String, rev: String },
    NewChange { parent: String },
    Edit { path: PathBuf, rev: String },
    WorkspaceAdd { name: String, ws_path: PathBuf },
    WorkspaceForget { name: String },
    UpdateStale { ws_path: PathBuf },
    FileShow { rev: String, path: String },
    Snapshot { ws_path: PathBuf },
    Describe { message: String },
    Commit { message: String },
}

#[derive(Debug, Clone, Default)]
struct ChangeData {
    parent: String,
    files: HashMap<String, Vec<u8>>,
    description: String,
}

#[derive(Debug, Default)]
struct FakeRepo {
    bookmarks: HashMap<String, String>,
    changes: HashMap<String, ChangeData>,
    /// workspace name → checkout path ("default" is the repo root)
    workspaces: HashMap<String, PathBuf>,
    /// checkout path → current change id
    checkouts: HashMap<PathBuf, String>,
    next_change: u64,
}

#[derive(Default)]
struct FakeState {
    repos: HashMap<PathBuf, FakeRepo>,
    calls: Vec<VcsCall>,
    /// When set, the next matching operation fails with this message.
    fail_next: Option<(&'static str, String)>,
}

/// In-memory VCS fake for tests.
#[derive(Clone, Default)]
pub struct FakeVcs {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<VcsCall> {
        self.inner.lock().calls.clone()
    }

    /// Make the next call of the named operation fail.
    ///
    /// Operation names match the trait methods (`"workspace_add"` etc).
    pub fn fail_next(&self, op: &'static str, message: impl Into<String>) {
        self.inner.lock().fail_next = Some((op, message.into()));
    }

    /// Change ID a bookmark points at, if it exists.
    pub fn bookmark_rev(&self, repo: &Path, name: &str) -> Option<String> {
        let state = self.inner.lock();
        let repo_key = Self::repo_root_key(&state, repo)?;
        state.repos[&repo_key].bookmarks.get(name).cloned()
    }

    fn take_failure(state: &mut FakeState, op: &'static str, command: &str) -> Result<(), VcsError> {
        if let Some((fail_op, message)) = &state.fail_next {
            if *fail_op == op {
                let output = message.clone();
                state.fail_next = None;
                return Err(VcsError::Command {
                    command: command.to_string(),
                    output,
                });
            }
        }
        Ok(())
    }

    fn alloc_change(repo: &mut FakeRepo, parent: &str) -> String {
        repo.next_change += 1;
        let id = format!("c{:07}", repo.next_change);
        let files = repo
            .changes
            .get(parent)
            .map(|c| c.files.clone())
            .unwrap_or_default();
        repo.changes.insert(
            id.clone(),
            ChangeData {
                parent: parent.to_string(),
                files,
                description: String::new(),
            },
        );
        id
    }

    /// Find the repo owning the checkout at `path`, by exact checkout match
    /// first, then by path prefix. Tries the path as given, then its
    /// canonical form.
    fn repo_key_for(state: &FakeState, path: &Path) -> Option<PathBuf> {
        let candidates = [path.to_path_buf(), canon(path)];
        for path in &candidates {
            for (key, repo) in &state.repos {
                if repo.checkouts.contains_key(path) {
                    return Some(key.clone());
                }
            }
        }
        for path in &candidates {
            for (key, repo) in &state.repos {
                if repo.checkouts.keys().any(|c| path.starts_with(c)) {
                    return Some(key.clone());
                }
            }
        }
        None
    }

    /// Resolve a repo root key, accepting non-canonical paths.
    fn repo_root_key(state: &FakeState, repo: &Path) -> Option<PathBuf> {
        if state.repos.contains_key(repo) {
            return Some(repo.to_path_buf());
        }
        let canonical = canon(repo);
        state.repos.contains_key(&canonical).then_some(canonical)
    }

    fn resolve_rev(repo: &FakeRepo, checkout: &Path, rev: &str) -> Result<String, VcsError> {
        if rev == "@" {
            return repo
                .checkouts
                .get(checkout)
                .cloned()
                .ok_or_else(|| command_err("resolve @", "unknown checkout"));
        }
        if rev == "root()" {
            return Ok(ROOT_CHANGE.to_string());
        }
        if let Some(id) = repo.bookmarks.get(rev) {
            return Ok(id.clone());
        }
        if repo.changes.contains_key(rev) {
            return Ok(rev.to_string());
        }
        Err(command_err(
            "resolve revision",
            &format!("revision {rev:?} not found"),
        ))
    }

    /// Write a change's files into the checkout directory, clearing regular
    /// non-hidden files first so stale content from a previous revision is
    /// not left behind.
    fn materialize(change: &ChangeData, dir: &Path) -> Result<(), VcsError> {
        std::fs::create_dir_all(dir).map_err(|e| command_err("materialize", &e.to_string()))?;
        let entries =
            std::fs::read_dir(dir).map_err(|e| command_err("materialize", &e.to_string()))?;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if entry.path().is_file() {
                let _ = std::fs::remove_file(entry.path());
            }
        }
        for (rel, bytes) in &change.files {
            let target = dir.join(rel);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| command_err("materialize", &e.to_string()))?;
            }
            std::fs::write(&target, bytes)
                .map_err(|e| command_err("materialize", &e.to_string()))?;
        }
        Ok(())
    }

    /// Read regular non-hidden files from a checkout directory.
    fn read_checkout_files(dir: &Path) -> HashMap<String, Vec<u8>> {
        let mut files = HashMap::new();
        let Ok(entries) = std::fs::read_dir(dir) else {
            return files;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_file() {
                continue;
            }
            if let Ok(bytes) = std::fs::read(entry.path()) {
                files.insert(name, bytes);
            }
        }
        files
    }
}

fn command_err(command: &str, output: &str) -> VcsError {
    VcsError::Command {
        command: command.to_string(),
        output: output.to_string(),
    }
}

fn canon(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn init(&self, path: &Path) -> Result<(), VcsError> {
        // Register under the canonical path so lookups through symlinked
        // parents (the pool canonicalizes repo paths) still resolve.
        std::fs::create_dir_all(path).map_err(|e| command_err("init", &e.to_string()))?;
        let path = std::fs::canonicalize(path)
            .map_err(|e| command_err("init", &e.to_string()))?;

        let mut state = self.inner.lock();
        state.calls.push(VcsCall::Init { path: path.clone() });
        if state.repos.contains_key(&path) {
            return Ok(());
        }
        let mut repo = FakeRepo::default();
        repo.changes.insert(
            ROOT_CHANGE.to_string(),
            ChangeData {
                parent: String::new(),
                files: HashMap::new(),
                description: String::new(),
            },
        );
        let first = Self::alloc_change(&mut repo, ROOT_CHANGE);
        repo.workspaces.insert("default".to_string(), path.clone());
        repo.checkouts.insert(path.clone(), first);
        state.repos.insert(path, repo);
        Ok(())
    }

    async fn bookmark_list(&self, path: &Path) -> Result<Vec<String>, VcsError> {
        let state = self.inner.lock();
        let repo_key = Self::repo_key_for(&state, path)
            .ok_or_else(|| command_err("bookmark list", "no repo at path"))?;
        let repo = &state.repos[&repo_key];
        let mut names: Vec<String> = repo.bookmarks.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn bookmark_create(&self, path: &Path, name: &str, rev: &str) -> Result<(), VcsError> {
        let mut state = self.inner.lock();
        Self::take_failure(&mut state, "bookmark_create", "bookmark create")?;
        state.calls.push(VcsCall::BookmarkCreate {
            name: name.to_string(),
            rev: rev.to_string(),
        });
        let repo_key = Self::repo_key_for(&state, path)
            .ok_or_else(|| command_err("bookmark create", "no repo at path"))?;
        let repo = state
            .repos
            .get_mut(&repo_key)
            .ok_or_else(|| command_err("bookmark create", "no repo at path"))?;
        let id = Self::resolve_rev(repo, path, rev)?;
        repo.bookmarks.insert(name.to_string(), id);
        Ok(())
    }

    async fn new_change(&self, path: &Path, parent_rev: &str) -> Result<String, VcsError> {
        let (id, change, dir) = {
            let mut state = self.inner.lock();
            Self::take_failure(&mut state, "new_change", "new")?;
            state.calls.push(VcsCall::NewChange {
                parent: parent_rev.to_string(),
            });
            let repo_key = Self::repo_key_for(&state, path)
                .ok_or_else(|| command_err("new", "no repo at path"))?;
            let repo = state
                .repos
                .get_mut(&repo_key)
                .ok_or_else(|| command_err("new", "no repo at path"))?;
            let parent = Self::resolve_rev(repo, path, parent_rev)?;
            let id = Self::alloc_change(repo, &parent);
            repo.checkouts.insert(path.to_path_buf(), id.clone());
            let change = repo.changes[&id].clone();
            (id, change, path.to_path_buf())
        };
        Self::materialize(&change, &dir)?;
        Ok(id)
    }

    async fn edit(&self, path: &Path, rev: &str) -> Result<(), VcsError> {
        let (change, dir) = {
            let mut state = self.inner.lock();
            Self::take_failure(&mut state, "edit", "edit")?;
            state.calls.push(VcsCall::Edit {
                path: path.to_path_buf(),
                rev: rev.to_string(),
            });
            let repo_key = Self::repo_key_for(&state, path)
                .ok_or_else(|| command_err("edit", "no repo at path"))?;
            let repo = state
                .repos
                .get_mut(&repo_key)
                .ok_or_else(|| command_err("edit", "no repo at path"))?;
            let id = Self::resolve_rev(repo, path, rev)?;
            repo.checkouts.insert(path.to_path_buf(), id.clone());
            (repo.changes[&id].clone(), path.to_path_buf())
        };
        Self::materialize(&change, &dir)
    }

    async fn current_change_id(&self, path: &Path) -> Result<String, VcsError> {
        let state = self.inner.lock();
        let repo_key = Self::repo_key_for(&state, path)
            .ok_or_else(|| command_err("log", "no repo at path"))?;
        state.repos[&repo_key]
            .checkouts
            .get(path)
            .cloned()
            .ok_or_else(|| command_err("log", "unknown checkout"))
    }

    async fn workspace_root(&self, path: &Path) -> Result<PathBuf, VcsError> {
        let state = self.inner.lock();
        for repo in state.repos.values() {
            for checkout in repo.checkouts.keys() {
                if path.starts_with(checkout) {
                    return Ok(checkout.clone());
                }
            }
        }
        Err(command_err("workspace root", "no workspace contains path"))
    }

    async fn workspace_add(
        &self,
        repo: &Path,
        name: &str,
        ws_path: &Path,
    ) -> Result<(), VcsError> {
        let (change, dir) = {
            let mut state = self.inner.lock();
            Self::take_failure(&mut state, "workspace_add", "workspace add")?;
            state.calls.push(VcsCall::WorkspaceAdd {
                name: name.to_string(),
                ws_path: ws_path.to_path_buf(),
            });
            let repo_key = Self::repo_root_key(&state, repo)
                .ok_or_else(|| command_err("workspace add", "no repo at path"))?;
            let fake = state
                .repos
                .get_mut(&repo_key)
                .ok_or_else(|| command_err("workspace add", "no repo at path"))?;
            let base = fake
                .checkouts
                .get(&repo_key)
                .cloned()
                .unwrap_or_else(|| ROOT_CHANGE.to_string());
            let id = Self::alloc_change(fake, &base);
            fake.workspaces
                .insert(name.to_string(), ws_path.to_path_buf());
            fake.checkouts.insert(ws_path.to_path_buf(), id.clone());
            (fake.changes[&id].clone(), ws_path.to_path_buf())
        };
        Self::materialize(&change, &dir)
    }

    async fn workspace_list(&self, repo: &Path) -> Result<Vec<String>, VcsError> {
        let state = self.inner.lock();
        let repo_key = Self::repo_root_key(&state, repo)
            .ok_or_else(|| command_err("workspace list", "no repo at path"))?;
        let fake = &state.repos[&repo_key];
        let mut names: Vec<String> = fake.workspaces.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn workspace_forget(&self, repo: &Path, name: &str) -> Result<(), VcsError> {
        let mut state = self.inner.lock();
        state.calls.push(VcsCall::WorkspaceForget {
            name: name.to_string(),
        });
        let repo_key = Self::repo_root_key(&state, repo)
            .ok_or_else(|| command_err("workspace forget", "no repo at path"))?;
        let fake = state
            .repos
            .get_mut(&repo_key)
            .ok_or_else(|| command_err("workspace forget", "no repo at path"))?;
        if let Some(path) = fake.workspaces.remove(name) {
            fake.checkouts.remove(&path);
        }
        Ok(())
    }

    async fn workspace_update_stale(&self, ws_path: &Path) -> Result<(), VcsError> {
        let mut state = self.inner.lock();
        Self::take_failure(&mut state, "workspace_update_stale", "workspace update-stale")?;
        state.calls.push(VcsCall::UpdateStale {
            ws_path: ws_path.to_path_buf(),
        });
        Ok(())
    }

    async fn file_show(
        &self,
        repo: &Path,
        rev: &str,
        relative_path: &str,
    ) -> Result<Vec<u8>, VcsError> {
        let mut state = self.inner.lock();
        state.calls.push(VcsCall::FileShow {
            rev: rev.to_string(),
            path: relative_path.to_string(),
        });
        let repo_key = Self::repo_root_key(&state, repo)
            .ok_or_else(|| command_err("file show", "no repo at path"))?;
        let fake = &state.repos[&repo_key];
        let id = Self::resolve_rev(fake, &repo_key, rev)?;
        fake.changes[&id]
            .files
            .get(relative_path)
            .cloned()
            .ok_or_else(|| VcsError::FileNotFound {
                path: relative_path.to_string(),
            })
    }

    async fn snapshot(&self, ws_path: &Path) -> Result<(), VcsError> {
        let files = Self::read_checkout_files(ws_path);
        let mut state = self.inner.lock();
        Self::take_failure(&mut state, "snapshot", "debug snapshot")?;
        state.calls.push(VcsCall::Snapshot {
            ws_path: ws_path.to_path_buf(),
        });
        let repo_key = Self::repo_key_for(&state, ws_path)
            .ok_or_else(|| command_err("debug snapshot", "no repo at path"))?;
        let repo = state
            .repos
            .get_mut(&repo_key)
            .ok_or_else(|| command_err("debug snapshot", "no repo at path"))?;
        let id = repo
            .checkouts
            .get(ws_path)
            .cloned()
            .ok_or_else(|| command_err("debug snapshot", "unknown checkout"))?;
        if let Some(change) = repo.changes.get_mut(&id) {
            change.files = files;
        }
        Ok(())
    }

    async fn describe(&self, ws_path: &Path, message: &str) -> Result<(), VcsError> {
        let mut state = self.inner.lock();
        state.calls.push(VcsCall::Describe {
            message: message.to_string(),
        });
        let repo_key = Self::repo_key_for(&state, ws_path)
            .ok_or_else(|| command_err("describe", "no repo at path"))?;
        let repo = state
            .repos
            .get_mut(&repo_key)
            .ok_or_else(|| command_err("describe", "no repo at path"))?;
        let id = repo
            .checkouts
            .get(ws_path)
            .cloned()
            .ok_or_else(|| command_err("describe", "unknown checkout"))?;
        if let Some(change) = repo.changes.get_mut(&id) {
            change.description = message.to_string();
        }
        Ok(())
    }

    async fn commit(&self, ws_path: &Path, message: &str) -> Result<(), VcsError> {
        // Describe the working revision, then start a fresh child change,
        // keeping working-copy files (as the real tool does).
        self.describe(ws_path, message).await?;
        let mut state = self.inner.lock();
        state.calls.push(VcsCall::Commit {
            message: message.to_string(),
        });
        let repo_key = Self::repo_key_for(&state, ws_path)
            .ok_or_else(|| command_err("commit", "no repo at path"))?;
        let repo = state
            .repos
            .get_mut(&repo_key)
            .ok_or_else(|| command_err("commit", "no repo at path"))?;
        let current = repo
            .checkouts
            .get(ws_path)
            .cloned()
            .ok_or_else(|| command_err("commit", "unknown checkout"))?;
        let id = Self::alloc_change(repo, &current);
        repo.checkouts.insert(ws_path.to_path_buf(), id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
