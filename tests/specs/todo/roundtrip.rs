//! Store round-trip laws: delete, close/reopen, duplicate deps, double
//! release.

use incr_pool::WorkspacePool;
use incr_storage::StateFile;
use incr_todo::{CreateOptions, OpenOptions, StoreError, TodoStore};
use incr_vcs::{FakeVcs, Vcs};
use std::path::PathBuf;
use tempfile::TempDir;

struct Repo {
    _dir: TempDir,
    path: PathBuf,
    pool: WorkspacePool<FakeVcs>,
}

async fn repo() -> Repo {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repo");
    let vcs = FakeVcs::new();
    vcs.init(&path).await.unwrap();
    let pool = WorkspacePool::new(
        StateFile::new(&dir.path().join("state")),
        vcs,
        dir.path().join("workspaces"),
    );
    Repo {
        _dir: dir,
        path,
        pool,
    }
}

async fn open(repo: &Repo) -> TodoStore<FakeVcs> {
    TodoStore::open_read_write(
        &repo.path,
        repo.pool.clone(),
        OpenOptions {
            create_if_missing: true,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn delete_then_show_returns_tombstone_with_reason() {
    let repo = repo().await;
    let store = open(&repo).await;
    let todo = store.create("junk", CreateOptions::default()).await.unwrap();

    store
        .delete(&[todo.id.to_string()], Some("duplicate"))
        .await
        .unwrap();

    let shown = store.show(&[todo.id.to_string()]).await.unwrap();
    assert_eq!(shown[0].status, incr_core::TodoStatus::Tombstone);
    assert_eq!(shown[0].delete_reason, "duplicate");
    assert!(shown[0].deleted_at.is_some());
    store.release().unwrap();
}

#[tokio::test]
async fn close_then_reopen_restores_open_without_closed_at() {
    let repo = repo().await;
    let store = open(&repo).await;
    let todo = store.create("work", CreateOptions::default()).await.unwrap();
    let ids = [todo.id.to_string()];

    store.close(&ids).await.unwrap();
    let reopened = store.reopen(&ids).await.unwrap();
    assert_eq!(reopened[0].status, incr_core::TodoStatus::Open);
    assert!(reopened[0].closed_at.is_none());
    store.release().unwrap();
}

#[tokio::test]
async fn second_identical_dep_add_is_rejected() {
    let repo = repo().await;
    let store = open(&repo).await;
    let a = store.create("a", CreateOptions::default()).await.unwrap();
    let b = store.create("b", CreateOptions::default()).await.unwrap();

    store.dep_add(a.id.as_str(), b.id.as_str()).await.unwrap();
    let err = store
        .dep_add(a.id.as_str(), b.id.as_str())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Todo(incr_core::TodoError::DuplicateDependency)
    ));
    store.release().unwrap();
}

#[tokio::test]
async fn double_release_does_not_corrupt_state() {
    let repo = repo().await;
    let store = open(&repo).await;
    let ws = store.workspace_path().unwrap().to_path_buf();
    store.release().unwrap();

    // Second release of the same workspace is a documented no-op
    repo.pool.release(&ws).unwrap();
    repo.pool.release(&ws).unwrap();

    // State remains usable: a new open succeeds and reuses the checkout
    let store = open(&repo).await;
    assert_eq!(store.workspace_path().unwrap(), ws);
    store.release().unwrap();
}

#[tokio::test]
async fn store_survives_reopen_across_handles() {
    let repo = repo().await;
    let store = open(&repo).await;
    let todo = store
        .create("persisted", CreateOptions::default())
        .await
        .unwrap();
    store.release().unwrap();

    let store = open(&repo).await;
    let todos = store.todos().await.unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].id, todo.id);
    store.release().unwrap();
}
