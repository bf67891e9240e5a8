// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::pool::{PoolError, WorkspacePool};
use incr_core::{SessionKind, SessionStatus, TodoId};
use incr_storage::StateFile;
use incr_vcs::{FakeVcs, Vcs};
use std::path::PathBuf;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    repo: PathBuf,
    pool: WorkspacePool<FakeVcs>,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("repo");
    let vcs = FakeVcs::new();
    vcs.init(&repo).await.unwrap();
    let pool = WorkspacePool::new(
        StateFile::new(&dir.path().join("state")),
        vcs,
        dir.path().join("workspaces"),
    );
    Fixture {
        _dir: dir,
        repo,
        pool,
    }
}

#[tokio::test]
async fn create_and_complete_session() {
    let fx = fixture().await;
    let session = fx
        .pool
        .create_session(
            &fx.repo,
            SessionKind::Todo,
            Some(TodoId::new("abcd2345")),
            "ws-001",
        )
        .unwrap();
    assert!(session.is_active());

    let done = fx.pool.complete_session(session.id.as_str()).unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn second_active_session_for_same_todo_rejected() {
    let fx = fixture().await;
    let todo = TodoId::new("abcd2345");
    fx.pool
        .create_session(&fx.repo, SessionKind::Todo, Some(todo.clone()), "ws-001")
        .unwrap();

    let err = fx
        .pool
        .create_session(&fx.repo, SessionKind::Todo, Some(todo), "ws-002")
        .unwrap_err();
    assert!(matches!(err, PoolError::SessionAlreadyActive(_)));
}

#[tokio::test]
async fn completed_session_frees_the_todo() {
    let fx = fixture().await;
    let todo = TodoId::new("abcd2345");
    let first = fx
        .pool
        .create_session(&fx.repo, SessionKind::Todo, Some(todo.clone()), "ws-001")
        .unwrap();
    fx.pool.complete_session(first.id.as_str()).unwrap();

    fx.pool
        .create_session(&fx.repo, SessionKind::Todo, Some(todo), "ws-001")
        .unwrap();
}

#[tokio::test]
async fn interactive_sessions_do_not_conflict() {
    let fx = fixture().await;
    fx.pool
        .create_session(&fx.repo, SessionKind::Interactive, None, "ws-001")
        .unwrap();
    fx.pool
        .create_session(&fx.repo, SessionKind::Interactive, None, "ws-002")
        .unwrap();
    assert_eq!(fx.pool.list_sessions(&fx.repo).unwrap().len(), 2);
}

#[tokio::test]
async fn complete_unknown_session_errors() {
    let fx = fixture().await;
    assert!(matches!(
        fx.pool.complete_session("nope").unwrap_err(),
        PoolError::SessionNotFound(_)
    ));
}

#[tokio::test]
async fn complete_twice_errors_not_active() {
    let fx = fixture().await;
    let session = fx
        .pool
        .create_session(&fx.repo, SessionKind::Interactive, None, "ws-001")
        .unwrap();
    fx.pool.complete_session(session.id.as_str()).unwrap();
    assert!(matches!(
        fx.pool.complete_session(session.id.as_str()).unwrap_err(),
        PoolError::SessionNotActive(_)
    ));
}

#[tokio::test]
async fn find_active_session_by_todo_id() {
    let fx = fixture().await;
    let todo = TodoId::new("abcd2345");
    assert!(fx
        .pool
        .find_active_session_by_todo_id(&fx.repo, &todo)
        .unwrap()
        .is_none());

    let session = fx
        .pool
        .create_session(&fx.repo, SessionKind::Todo, Some(todo.clone()), "ws-001")
        .unwrap();
    let found = fx
        .pool
        .find_active_session_by_todo_id(&fx.repo, &todo)
        .unwrap()
        .unwrap();
    assert_eq!(found.id, session.id);
}
