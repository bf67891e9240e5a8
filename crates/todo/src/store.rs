// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The todo store: CRUD and dependency operations over two JSONL files
//! pinned inside the repository's todo-store revision.
//!
//! Read-write opens hold a pool workspace checked out at the store bookmark;
//! every write goes through a per-file advisory lock and is snapshotted into
//! the repository so other checkouts see it. Read-only opens skip workspace
//! acquisition and read through the VCS at the bookmark.

use crate::graph::{self, DepTreeNode};
use crate::index::IdIndex;
use crate::{DEPS_FILE, STORE_DESCRIPTION, TASKS_BOOKMARK, TODOS_FILE};
use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use incr_core::{
    Clock, Dependency, Priority, SystemClock, Todo, TodoError, TodoId, TodoStatus, TodoType,
};
use incr_pool::{AcquireOptions, PoolError, WorkspacePool};
use incr_storage::{decode_jsonl, read_jsonl, write_jsonl, JsonlError};
use incr_vcs::{Vcs, VcsError};
use std::fs::{File, OpenOptions as FsOpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from todo-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no todo store in this repository")]
    NoTodoStore,
    #[error("todo store is read-only")]
    ReadOnlyStore,
    #[error("todo not found: {}", ids.join(", "))]
    TodoNotFound { ids: Vec<String> },
    #[error("ambiguous todo id prefix {prefix:?} ({} matches)", matches.len())]
    AmbiguousTodoIdPrefix {
        prefix: String,
        matches: Vec<TodoId>,
    },
    #[error(transparent)]
    Todo(#[from] TodoError),
    #[error(transparent)]
    Jsonl(#[from] JsonlError),
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// How to open the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Create the store revision and bookmark when absent.
    pub create_if_missing: bool,
}

/// Options for creating a todo.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub status: Option<String>,
    pub todo_type: Option<String>,
    pub priority: Option<i64>,
    pub description: String,
    /// IDs (or unique prefixes) this todo depends on.
    pub dependencies: Vec<String>,
}

/// Per-field optional updates applied to each resolved todo.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub todo_type: Option<String>,
    pub priority: Option<i64>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub delete_reason: Option<String>,
}

/// Filter for listing todos.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<String>,
    pub todo_type: Option<String>,
    pub priority: Option<i64>,
    /// ID prefixes; empty means all.
    pub ids: Vec<String>,
    pub title_substring: String,
    pub description_substring: String,
    pub include_tombstones: bool,
}

enum Mode<V: Vcs, C: Clock> {
    ReadOnly,
    ReadWrite {
        pool: WorkspacePool<V, C>,
        ws_path: PathBuf,
        released: bool,
    },
}

/// A handle on a repository's todo store.
pub struct TodoStore<V: Vcs, C: Clock = SystemClock> {
    repo: PathBuf,
    vcs: V,
    clock: C,
    mode: Mode<V, C>,
}

impl<V: Vcs> TodoStore<V> {
    /// Open read-only: no workspace, reads go through the VCS at the
    /// bookmark. Errors with [`StoreError::NoTodoStore`] when the bookmark
    /// is absent.
    pub async fn open_read_only(repo: &Path, vcs: V) -> Result<Self, StoreError> {
        Self::open_read_only_with_clock(repo, vcs, SystemClock).await
    }

    /// Open read-write: acquires a pool workspace checked out at the store
    /// bookmark and holds it until [`TodoStore::release`].
    pub async fn open_read_write(
        repo: &Path,
        pool: WorkspacePool<V>,
        opts: OpenOptions,
    ) -> Result<Self, StoreError> {
        Self::open_read_write_with_clock(repo, pool, opts, SystemClock).await
    }
}

impl<V: Vcs, C: Clock> TodoStore<V, C> {
    pub async fn open_read_only_with_clock(
        repo: &Path,
        vcs: V,
        clock: C,
    ) -> Result<Self, StoreError> {
        let repo = canonicalize(repo)?;
        let bookmarks = vcs.bookmark_list(&repo).await?;
        if !bookmarks.iter().any(|b| b == TASKS_BOOKMARK) {
            return Err(StoreError::NoTodoStore);
        }
        Ok(Self {
            repo,
            vcs,
            clock,
            mode: Mode::ReadOnly,
        })
    }

    pub async fn open_read_write_with_clock(
        repo: &Path,
        pool: WorkspacePool<V, C>,
        opts: OpenOptions,
        clock: C,
    ) -> Result<Self, StoreError> {
        let repo = canonicalize(repo)?;
        let vcs = pool.vcs().clone();

        let bookmarks = vcs.bookmark_list(&repo).await?;
        let exists = bookmarks.iter().any(|b| b == TASKS_BOOKMARK);
        if !exists && !opts.create_if_missing {
            return Err(StoreError::NoTodoStore);
        }

        let repo_name = repo
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| repo.display().to_string());
        let acquire = AcquireOptions {
            purpose: format!("todo store {repo_name}"),
            rev: exists.then(|| TASKS_BOOKMARK.to_string()),
            new_change_message: None,
        };
        let ws_path = pool.acquire(&repo, acquire).await?;

        if !exists {
            // Fresh orphan revision at the root, pinned by the bookmark.
            if let Err(e) = Self::create_store_revision(&vcs, &ws_path).await {
                if let Err(release_err) = pool.release(&ws_path) {
                    warn!(error = %release_err, "workspace release after failed store creation");
                }
                return Err(e);
            }
            debug!(repo = %repo.display(), "created todo store");
        }

        Ok(Self {
            repo,
            vcs,
            clock,
            mode: Mode::ReadWrite {
                pool,
                ws_path,
                released: false,
            },
        })
    }

    async fn create_store_revision(vcs: &V, ws_path: &Path) -> Result<(), StoreError> {
        vcs.new_change(ws_path, "root()").await?;
        vcs.describe(ws_path, STORE_DESCRIPTION).await?;
        vcs.bookmark_create(ws_path, TASKS_BOOKMARK, "@").await?;
        Ok(())
    }

    /// Release the held workspace (read-write mode). Read-only release is a
    /// no-op.
    pub fn release(mut self) -> Result<(), StoreError> {
        if let Mode::ReadWrite {
            pool,
            ws_path,
            released,
        } = &mut self.mode
        {
            if !*released {
                *released = true;
                pool.release(ws_path)?;
            }
        }
        Ok(())
    }

    /// Path of the held workspace, if open read-write.
    pub fn workspace_path(&self) -> Option<&Path> {
        match &self.mode {
            Mode::ReadWrite { ws_path, .. } => Some(ws_path),
            Mode::ReadOnly => None,
        }
    }

    // ---- reads ----

    async fn read_file<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Vec<T>, StoreError> {
        match &self.mode {
            Mode::ReadWrite { ws_path, .. } => {
                let _guard = lock_store_file(ws_path, name)?;
                Ok(read_jsonl(&ws_path.join(name))?)
            }
            Mode::ReadOnly => {
                match self.vcs.file_show(&self.repo, TASKS_BOOKMARK, name).await {
                    Ok(bytes) => Ok(decode_jsonl(&bytes)?),
                    Err(e) if e.is_file_not_found() => Ok(Vec::new()),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    pub async fn todos(&self) -> Result<Vec<Todo>, StoreError> {
        self.read_file(TODOS_FILE).await
    }

    pub async fn dependencies(&self) -> Result<Vec<Dependency>, StoreError> {
        self.read_file(DEPS_FILE).await
    }

    /// Prefix index over all todo IDs.
    pub async fn id_index(&self) -> Result<IdIndex, StoreError> {
        let todos = self.todos().await?;
        Ok(IdIndex::new(todos.into_iter().map(|t| t.id)))
    }

    // ---- writes ----

    fn write_ctx(&self) -> Result<&Path, StoreError> {
        match &self.mode {
            Mode::ReadWrite { ws_path, .. } => Ok(ws_path),
            Mode::ReadOnly => Err(StoreError::ReadOnlyStore),
        }
    }

    async fn write_file<T: serde::Serialize>(
        &self,
        name: &str,
        records: &[T],
    ) -> Result<(), StoreError> {
        let ws_path = self.write_ctx()?;
        {
            let _guard = lock_store_file(ws_path, name)?;
            write_jsonl(&ws_path.join(name), records)?;
        }
        self.vcs.snapshot(ws_path).await?;
        Ok(())
    }

    /// Create a todo.
    pub async fn create(&self, title: &str, opts: CreateOptions) -> Result<Todo, StoreError> {
        self.write_ctx()?;
        let now = self.clock.now();

        let status = opts
            .status
            .as_deref()
            .map(str::parse::<TodoStatus>)
            .transpose()
            .map_err(StoreError::Todo)?;
        let todo_type = opts
            .todo_type
            .as_deref()
            .map(str::parse::<TodoType>)
            .transpose()
            .map_err(StoreError::Todo)?;
        let priority = opts
            .priority
            .map(Priority::new)
            .transpose()
            .map_err(StoreError::Todo)?;

        let mut todos = self.todos().await?;

        let mut todo = Todo::new(title, now)?;
        // Hash collisions are vanishingly rare but cheap to sidestep.
        let mut bump = 1;
        while todos.iter().any(|t| t.id == todo.id) {
            todo = Todo::new(title, now + Duration::milliseconds(bump))?;
            todo.created_at = now;
            todo.updated_at = now;
            bump += 1;
        }

        todo.description = opts.description;
        if let Some(todo_type) = todo_type {
            todo.todo_type = todo_type;
        }
        if let Some(priority) = priority {
            todo.priority = priority;
        }
        if let Some(status) = status {
            todo.transition(status, now);
        }
        todo.validate()?;

        let new_deps = if opts.dependencies.is_empty() {
            Vec::new()
        } else {
            let index = IdIndex::new(todos.iter().map(|t| t.id.clone()));
            let mut resolved: Vec<TodoId> = Vec::new();
            for dep in &opts.dependencies {
                let target = index.resolve(dep)?;
                if target == todo.id {
                    return Err(StoreError::Todo(TodoError::SelfDependency));
                }
                if resolved.contains(&target) {
                    return Err(StoreError::Todo(TodoError::DuplicateDependency));
                }
                resolved.push(target);
            }
            resolved
                .into_iter()
                .map(|target| Dependency {
                    todo_id: todo.id.clone(),
                    depends_on_id: target,
                    created_at: now,
                })
                .collect()
        };

        todos.push(todo.clone());
        self.write_file(TODOS_FILE, &todos).await?;

        if !new_deps.is_empty() {
            let mut deps = self.dependencies().await?;
            deps.extend(new_deps);
            self.write_file(DEPS_FILE, &deps).await?;
        }

        debug!(id = %todo.id, title = %todo.title, "todo created");
        Ok(todo)
    }

    /// Update fields on each resolved todo; one atomic write for all.
    pub async fn update(
        &self,
        ids: &[String],
        opts: UpdateOptions,
    ) -> Result<Vec<Todo>, StoreError> {
        self.write_ctx()?;
        let now = self.clock.now();

        if let Some(title) = &opts.title {
            // Fail before resolving so a bad title never half-applies.
            Todo::new(title.as_str(), now)?;
        }
        let status = opts
            .status
            .as_deref()
            .map(str::parse::<TodoStatus>)
            .transpose()
            .map_err(StoreError::Todo)?;
        let todo_type = opts
            .todo_type
            .as_deref()
            .map(str::parse::<TodoType>)
            .transpose()
            .map_err(StoreError::Todo)?;
        let priority = opts
            .priority
            .map(Priority::new)
            .transpose()
            .map_err(StoreError::Todo)?;

        let mut todos = self.todos().await?;
        let resolved = resolve_all(&todos, ids)?;

        let mut updated = Vec::with_capacity(resolved.len());
        for id in &resolved {
            let todo = todos
                .iter_mut()
                .find(|t| t.id == *id)
                .ok_or_else(|| StoreError::TodoNotFound {
                    ids: vec![id.to_string()],
                })?;

            if let Some(title) = &opts.title {
                todo.title = title.clone();
            }
            if let Some(description) = &opts.description {
                todo.description = description.clone();
            }
            if let Some(todo_type) = todo_type {
                todo.todo_type = todo_type;
            }
            if let Some(priority) = priority {
                todo.priority = priority;
            }
            if let Some(status) = status {
                todo.transition(status, now);
            } else {
                todo.updated_at = now;
            }
            if let Some(deleted_at) = opts.deleted_at {
                if todo.status != TodoStatus::Tombstone {
                    return Err(StoreError::Todo(
                        TodoError::DeletedAtRequiresTombstoneStatus,
                    ));
                }
                todo.deleted_at = Some(deleted_at);
            }
            if let Some(delete_reason) = &opts.delete_reason {
                todo.delete_reason = delete_reason.clone();
            }

            todo.validate()?;
            updated.push(todo.clone());
        }

        self.write_file(TODOS_FILE, &todos).await?;
        Ok(updated)
    }

    pub async fn close(&self, ids: &[String]) -> Result<Vec<Todo>, StoreError> {
        self.set_status(ids, TodoStatus::Closed).await
    }

    pub async fn finish(&self, ids: &[String]) -> Result<Vec<Todo>, StoreError> {
        self.set_status(ids, TodoStatus::Done).await
    }

    pub async fn reopen(&self, ids: &[String]) -> Result<Vec<Todo>, StoreError> {
        self.set_status(ids, TodoStatus::Open).await
    }

    pub async fn start(&self, ids: &[String]) -> Result<Vec<Todo>, StoreError> {
        self.set_status(ids, TodoStatus::InProgress).await
    }

    async fn set_status(&self, ids: &[String], status: TodoStatus) -> Result<Vec<Todo>, StoreError> {
        self.update(
            ids,
            UpdateOptions {
                status: Some(status.to_string()),
                ..UpdateOptions::default()
            },
        )
        .await
    }

    /// Tombstone todos, recording the reason.
    pub async fn delete(&self, ids: &[String], reason: Option<&str>) -> Result<Vec<Todo>, StoreError> {
        self.update(
            ids,
            UpdateOptions {
                status: Some(TodoStatus::Tombstone.to_string()),
                delete_reason: reason.map(String::from),
                ..UpdateOptions::default()
            },
        )
        .await
    }

    /// Fetch todos in the requested order. Lists every missing ID.
    pub async fn show(&self, ids: &[String]) -> Result<Vec<Todo>, StoreError> {
        let todos = self.todos().await?;
        let resolved = resolve_all(&todos, ids)?;
        Ok(resolved
            .iter()
            .filter_map(|id| todos.iter().find(|t| t.id == *id).cloned())
            .collect())
    }

    /// List todos matching a filter. Tombstones are excluded unless asked
    /// for (explicitly or via a tombstone status filter).
    pub async fn list(&self, filter: ListFilter) -> Result<Vec<Todo>, StoreError> {
        let status = filter
            .status
            .as_deref()
            .map(str::parse::<TodoStatus>)
            .transpose()
            .map_err(StoreError::Todo)?;
        let todo_type = filter
            .todo_type
            .as_deref()
            .map(str::parse::<TodoType>)
            .transpose()
            .map_err(StoreError::Todo)?;
        let priority = filter
            .priority
            .map(Priority::new)
            .transpose()
            .map_err(StoreError::Todo)?;

        let include_tombstones =
            filter.include_tombstones || status == Some(TodoStatus::Tombstone);
        let id_prefixes: Vec<String> = filter.ids.iter().map(|id| id.to_lowercase()).collect();

        let todos = self.todos().await?;
        Ok(todos
            .into_iter()
            .filter(|t| {
                if !include_tombstones && t.status == TodoStatus::Tombstone {
                    return false;
                }
                if let Some(status) = status {
                    if t.status != status {
                        return false;
                    }
                }
                if let Some(todo_type) = todo_type {
                    if t.todo_type != todo_type {
                        return false;
                    }
                }
                if let Some(priority) = priority {
                    if t.priority != priority {
                        return false;
                    }
                }
                if !id_prefixes.is_empty()
                    && !id_prefixes.iter().any(|p| t.id.as_str().starts_with(p))
                {
                    return false;
                }
                if !filter.title_substring.is_empty()
                    && !t.title.contains(&filter.title_substring)
                {
                    return false;
                }
                if !filter.description_substring.is_empty()
                    && !t.description.contains(&filter.description_substring)
                {
                    return false;
                }
                true
            })
            .collect())
    }

    /// Open, unblocked todos in working order. `limit` of 0 is unbounded.
    pub async fn ready(&self, limit: usize) -> Result<Vec<Todo>, StoreError> {
        let todos = self.todos().await?;
        let deps = self.dependencies().await?;
        Ok(graph::ready(&todos, &deps, limit))
    }

    /// Add a dependency edge: `from` depends on `to`.
    pub async fn dep_add(&self, from: &str, to: &str) -> Result<Dependency, StoreError> {
        self.write_ctx()?;
        let now = self.clock.now();

        let todos = self.todos().await?;
        let index = IdIndex::new(todos.iter().map(|t| t.id.clone()));
        let from = index.resolve(from)?;
        let to = index.resolve(to)?;
        let dep = Dependency::new(from, to, now)?;

        let mut deps = self.dependencies().await?;
        let duplicate = deps
            .iter()
            .any(|d| d.todo_id == dep.todo_id && d.depends_on_id == dep.depends_on_id);
        if duplicate {
            return Err(StoreError::Todo(TodoError::DuplicateDependency));
        }
        deps.push(dep.clone());
        self.write_file(DEPS_FILE, &deps).await?;
        Ok(dep)
    }

    /// Dependency tree rooted at the resolved todo.
    pub async fn dep_tree(&self, id: &str) -> Result<DepTreeNode, StoreError> {
        let todos = self.todos().await?;
        let deps = self.dependencies().await?;
        let index = IdIndex::new(todos.iter().map(|t| t.id.clone()));
        let root_id = index.resolve(id)?;
        let root = todos
            .iter()
            .find(|t| t.id == root_id)
            .ok_or_else(|| StoreError::TodoNotFound {
                ids: vec![id.to_string()],
            })?;
        Ok(graph::dep_tree(root, &todos, &deps))
    }
}

impl<V: Vcs, C: Clock> Drop for TodoStore<V, C> {
    fn drop(&mut self) {
        if let Mode::ReadWrite {
            pool,
            ws_path,
            released: false,
        } = &self.mode
        {
            if let Err(e) = pool.release(ws_path) {
                warn!(path = %ws_path.display(), error = %e, "todo store workspace release on drop failed");
            }
        }
    }
}

/// Resolve every input against the ID index, reporting all misses at once.
fn resolve_all(todos: &[Todo], ids: &[String]) -> Result<Vec<TodoId>, StoreError> {
    let index = IdIndex::new(todos.iter().map(|t| t.id.clone()));
    let mut resolved = Vec::with_capacity(ids.len());
    let mut missing = Vec::new();
    for id in ids {
        match index.resolve(id) {
            Ok(full) => resolved.push(full),
            Err(StoreError::TodoNotFound { .. }) => missing.push(id.clone()),
            Err(e) => return Err(e),
        }
    }
    if !missing.is_empty() {
        return Err(StoreError::TodoNotFound { ids: missing });
    }
    Ok(resolved)
}

/// Take the advisory lock for a store file. The lock is released when the
/// returned guard (the lock file handle) is dropped.
fn lock_store_file(ws_path: &Path, name: &str) -> Result<File, StoreError> {
    let lock_path = ws_path.join(format!("{name}.lock"));
    let file = FsOpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)?;
    file.lock_exclusive()?;
    Ok(file)
}

fn canonicalize(path: &Path) -> Result<PathBuf, StoreError> {
    std::fs::canonicalize(path).map_err(|_| StoreError::Pool(PoolError::RepoPathNotFound(path.to_path_buf())))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
