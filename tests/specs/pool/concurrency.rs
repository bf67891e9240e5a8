//! Concurrent workspace acquisition.

use incr_pool::{AcquireOptions, WorkspacePool};
use incr_storage::StateFile;
use incr_vcs::{FakeVcs, Vcs};
use std::collections::HashSet;
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread")]
async fn eight_concurrent_acquires_get_distinct_workspaces() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("repo");
    let vcs = FakeVcs::new();
    vcs.init(&repo).await.unwrap();
    let pool = WorkspacePool::new(
        StateFile::new(&dir.path().join("state")),
        vcs,
        dir.path().join("workspaces"),
    );

    let mut handles = Vec::new();
    for i in 0..8 {
        let pool = pool.clone();
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            pool.acquire(&repo, AcquireOptions::purpose(format!("worker {i}")))
                .await
                .unwrap()
        }));
    }

    let mut paths = HashSet::new();
    for handle in handles {
        assert!(paths.insert(handle.await.unwrap()), "duplicate workspace");
    }
    assert_eq!(paths.len(), 8);

    // Every record is marked acquired in the state file
    let records = pool.list(&repo).unwrap();
    assert_eq!(records.len(), 8);
    assert!(records.iter().all(|ws| ws.acquired));

    // Releases free them all for reuse
    for path in &paths {
        pool.release(path).unwrap();
    }
    assert!(pool.list(&repo).unwrap().iter().all(|ws| !ws.acquired));
}

#[tokio::test(flavor = "multi_thread")]
async fn acquire_release_cycles_reuse_instead_of_growing() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("repo");
    let vcs = FakeVcs::new();
    vcs.init(&repo).await.unwrap();
    let pool = WorkspacePool::new(
        StateFile::new(&dir.path().join("state")),
        vcs,
        dir.path().join("workspaces"),
    );

    for _ in 0..5 {
        let path = pool
            .acquire(&repo, AcquireOptions::purpose("cycle"))
            .await
            .unwrap();
        pool.release(&path).unwrap();
    }
    assert_eq!(pool.list(&repo).unwrap().len(), 1);
}
