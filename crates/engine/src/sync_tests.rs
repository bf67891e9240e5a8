// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn setup() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let ws = dir.path().join("ws");
    let repo = dir.path().join("repo");
    fs::create_dir_all(&ws).unwrap();
    fs::create_dir_all(&repo).unwrap();
    (dir, ws, repo)
}

#[test]
fn copies_regular_files() {
    let (_dir, ws, repo) = setup();
    fs::write(ws.join("main.rs"), b"fn main() {}").unwrap();
    fs::write(ws.join("README.md"), b"hi").unwrap();

    let copied = sync_outputs(&ws, &repo).unwrap();
    assert_eq!(copied, 2);
    assert!(repo.join("main.rs").exists());
    assert!(repo.join("README.md").exists());
}

#[test]
fn copies_nested_directories() {
    let (_dir, ws, repo) = setup();
    fs::create_dir_all(ws.join("src/deep")).unwrap();
    fs::write(ws.join("src/deep/lib.rs"), b"pub fn f() {}").unwrap();

    let copied = sync_outputs(&ws, &repo).unwrap();
    assert_eq!(copied, 1);
    assert_eq!(
        fs::read(repo.join("src/deep/lib.rs")).unwrap(),
        b"pub fn f() {}"
    );
}

#[yare::parameterized(
    jj = { ".jj" },
    git = { ".git" },
    meta = { ".incrementum-state" },
    dotfile = { ".env" },
)]
fn skips_internal_entries(name: &str) {
    let (_dir, ws, repo) = setup();
    fs::create_dir_all(ws.join(name)).unwrap();
    fs::write(ws.join(name).join("data"), b"x").unwrap();

    let copied = sync_outputs(&ws, &repo).unwrap();
    assert_eq!(copied, 0);
    assert!(!repo.join(name).exists());
}

#[test]
fn overwrites_existing_files() {
    let (_dir, ws, repo) = setup();
    fs::write(ws.join("file.txt"), b"new").unwrap();
    fs::write(repo.join("file.txt"), b"old").unwrap();

    sync_outputs(&ws, &repo).unwrap();
    assert_eq!(fs::read(repo.join("file.txt")).unwrap(), b"new");
}

#[test]
fn skips_dotfiles_at_any_depth() {
    let (_dir, ws, repo) = setup();
    fs::create_dir_all(ws.join("src")).unwrap();
    fs::write(ws.join("src/.hidden"), b"x").unwrap();
    fs::write(ws.join("src/kept.rs"), b"y").unwrap();

    let copied = sync_outputs(&ws, &repo).unwrap();
    assert_eq!(copied, 1);
    assert!(!repo.join("src/.hidden").exists());
}
