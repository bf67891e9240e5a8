// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session bookkeeping on the same state file as workspaces.

use crate::canonicalize_repo;
use crate::pool::{PoolError, WorkspacePool};
use incr_core::{Clock, SessionId, SessionKind, SessionRecord, SessionStatus, TodoId};
use incr_vcs::Vcs;
use std::path::Path;

impl<V: Vcs, C: Clock> WorkspacePool<V, C> {
    /// Create a session record.
    ///
    /// At most one active session per todo: a second create for the same
    /// todo fails with [`PoolError::SessionAlreadyActive`].
    pub fn create_session(
        &self,
        repo_path: &Path,
        kind: SessionKind,
        todo_id: Option<TodoId>,
        workspace_name: &str,
    ) -> Result<SessionRecord, PoolError> {
        let repo = canonicalize_repo(repo_path)?;
        let now = self.clock.now();
        let id = SessionId::generate();
        let workspace_name = workspace_name.to_string();

        self.state.update(move |doc| {
            let alias = doc.get_or_create_repo_alias(&repo);

            if let Some(todo_id) = &todo_id {
                let conflict = doc.sessions.values().any(|s| {
                    s.is_active() && s.repo_alias == alias && s.todo_id.as_ref() == Some(todo_id)
                });
                if conflict {
                    return Err(PoolError::SessionAlreadyActive(todo_id.clone()));
                }
            }

            let record = SessionRecord {
                id: id.clone(),
                repo_alias: alias,
                todo_id,
                kind,
                status: SessionStatus::Active,
                created_at: now,
                completed_at: None,
                workspace_name,
            };
            doc.sessions.insert(id.to_string(), record.clone());
            Ok(record)
        })?
    }

    /// Mark a session completed.
    pub fn complete_session(&self, id: &str) -> Result<SessionRecord, PoolError> {
        let now = self.clock.now();
        let id = id.to_string();
        self.state.update(move |doc| {
            let Some(record) = doc.sessions.get_mut(&id) else {
                return Err(PoolError::SessionNotFound(id));
            };
            if !record.is_active() {
                return Err(PoolError::SessionNotActive(id));
            }
            record.status = SessionStatus::Completed;
            record.completed_at = Some(now);
            Ok(record.clone())
        })?
    }

    /// All sessions recorded for a repo.
    pub fn list_sessions(&self, repo_path: &Path) -> Result<Vec<SessionRecord>, PoolError> {
        let repo = canonicalize_repo(repo_path)?;
        let doc = self.state.load()?;
        let Some(alias) = doc.repo_alias(&repo) else {
            return Ok(Vec::new());
        };
        Ok(doc
            .sessions
            .values()
            .filter(|s| s.repo_alias == alias)
            .cloned()
            .collect())
    }

    /// Find the active session working a todo, if any.
    pub fn find_active_session_by_todo_id(
        &self,
        repo_path: &Path,
        todo_id: &TodoId,
    ) -> Result<Option<SessionRecord>, PoolError> {
        let repo = canonicalize_repo(repo_path)?;
        let doc = self.state.load()?;
        let Some(alias) = doc.repo_alias(&repo) else {
            return Ok(None);
        };
        Ok(doc
            .sessions
            .values()
            .find(|s| {
                s.is_active() && s.repo_alias == alias && s.todo_id.as_ref() == Some(todo_id)
            })
            .cloned())
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
