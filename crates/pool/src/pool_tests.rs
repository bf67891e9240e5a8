// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use incr_storage::StateFile;
use incr_vcs::{FakeVcs, VcsCall};
use std::collections::HashSet;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    repo: PathBuf,
    pool: WorkspacePool<FakeVcs>,
    vcs: FakeVcs,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("repo");
    let vcs = FakeVcs::new();
    vcs.init(&repo).await.unwrap();
    let pool = WorkspacePool::new(
        StateFile::new(&dir.path().join("state")),
        vcs.clone(),
        dir.path().join("workspaces"),
    );
    Fixture {
        _dir: dir,
        repo,
        pool,
        vcs,
    }
}

#[tokio::test]
async fn acquire_creates_first_workspace() {
    let fx = fixture().await;
    let path = fx
        .pool
        .acquire(&fx.repo, AcquireOptions::purpose("test"))
        .await
        .unwrap();
    assert!(path.ends_with("ws-001"));
    assert!(path.is_dir());

    let records = fx.pool.list(&fx.repo).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].acquired);
    assert_eq!(records[0].purpose, "test");
}

#[tokio::test]
async fn released_workspace_is_reused() {
    let fx = fixture().await;
    let first = fx
        .pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap();
    fx.pool.release(&first).unwrap();

    let second = fx
        .pool
        .acquire(&fx.repo, AcquireOptions::purpose("again"))
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(fx.pool.list(&fx.repo).unwrap().len(), 1);
}

#[tokio::test]
async fn busy_workspace_forces_new_allocation() {
    let fx = fixture().await;
    let first = fx
        .pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap();
    let second = fx
        .pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap();
    assert_ne!(first, second);
    assert!(second.ends_with("ws-002"));
}

#[tokio::test]
async fn create_failure_rolls_back_record() {
    let fx = fixture().await;
    fx.vcs.fail_next("workspace_add", "disk full");

    let err = fx
        .pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("disk full"));

    // No record left behind; next acquire starts over at ws-001
    assert!(fx.pool.list(&fx.repo).unwrap().is_empty());
    let path = fx
        .pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap();
    assert!(path.ends_with("ws-001"));
}

#[tokio::test]
async fn edit_failure_releases_acquisition() {
    let fx = fixture().await;
    let opts = AcquireOptions {
        rev: Some("nonexistent-rev".to_string()),
        ..AcquireOptions::default()
    };
    fx.pool.acquire(&fx.repo, opts).await.unwrap_err();

    // Record exists (checkout was created) but is not stuck acquired
    let records = fx.pool.list(&fx.repo).unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].acquired);
}

#[tokio::test]
async fn stale_repair_errors_are_swallowed() {
    let fx = fixture().await;
    fx.vcs.fail_next("workspace_update_stale", "stale working copy");
    fx.pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn acquire_with_rev_checks_out() {
    let fx = fixture().await;
    let opts = AcquireOptions {
        rev: Some("root()".to_string()),
        ..AcquireOptions::default()
    };
    fx.pool.acquire(&fx.repo, opts).await.unwrap();
    assert!(fx
        .vcs
        .calls()
        .iter()
        .any(|c| matches!(c, VcsCall::Edit { rev, .. } if rev == "root()")));
}

#[tokio::test]
async fn acquire_with_message_creates_described_change() {
    let fx = fixture().await;
    let opts = AcquireOptions {
        new_change_message: Some("staging for todo x".to_string()),
        ..AcquireOptions::default()
    };
    fx.pool.acquire(&fx.repo, opts).await.unwrap();

    let calls = fx.vcs.calls();
    assert!(calls
        .iter()
        .any(|c| matches!(c, VcsCall::NewChange { parent } if parent == "@")));
    assert!(calls
        .iter()
        .any(|c| matches!(c, VcsCall::Describe { message } if message == "staging for todo x")));
}

#[tokio::test]
async fn release_unknown_path_errors() {
    let fx = fixture().await;
    let err = fx.pool.release(Path::new("/nope")).unwrap_err();
    assert!(matches!(err, PoolError::UnknownWorkspace(_)));
}

#[tokio::test]
async fn double_release_is_noop() {
    let fx = fixture().await;
    let path = fx
        .pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap();
    fx.pool.release(&path).unwrap();
    fx.pool.release(&path).unwrap();
    assert!(!fx.pool.list(&fx.repo).unwrap()[0].acquired);
}

#[tokio::test]
async fn release_by_name_flips_flag() {
    let fx = fixture().await;
    fx.pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap();
    fx.pool.release_by_name(&fx.repo, "ws-001").unwrap();
    assert!(!fx.pool.list(&fx.repo).unwrap()[0].acquired);
}

#[tokio::test]
async fn workspace_name_for_path_walks_up() {
    let fx = fixture().await;
    let path = fx
        .pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap();
    let nested = path.join("src").join("deep");
    std::fs::create_dir_all(&nested).unwrap();
    assert_eq!(fx.pool.workspace_name_for_path(&nested).unwrap(), "ws-001");

    let err = fx
        .pool
        .workspace_name_for_path(Path::new("/unrelated"))
        .unwrap_err();
    assert!(matches!(err, PoolError::WorkspaceRootNotFound(_)));
}

#[tokio::test]
async fn release_all_clears_stuck_acquisitions() {
    let fx = fixture().await;
    fx.pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap();
    fx.pool
        .acquire(&fx.repo, AcquireOptions::default())
        .await
        .unwrap();
    assert_eq!(fx.pool.release_all(&fx.repo).unwrap(), 2);
    assert!(fx.pool.list(&fx.repo).unwrap().iter().all(|ws| !ws.acquired));
}

#[tokio::test]
async fn acquire_unknown_repo_path_errors() {
    let fx = fixture().await;
    let err = fx
        .pool
        .acquire(Path::new("/no/such/repo"), AcquireOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::RepoPathNotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_acquires_return_distinct_workspaces() {
    let fx = fixture().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = fx.pool.clone();
        let repo = fx.repo.clone();
        handles.push(tokio::spawn(async move {
            pool.acquire(&repo, AcquireOptions::default()).await.unwrap()
        }));
    }

    let mut paths = HashSet::new();
    for handle in handles {
        paths.insert(handle.await.unwrap());
    }
    assert_eq!(paths.len(), 8);

    let records = fx.pool.list(&fx.repo).unwrap();
    assert_eq!(records.len(), 8);
    assert!(records.iter().all(|ws| ws.acquired));
}
