// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jujutsu (`jj`) client: one tool invocation per call.

use crate::{is_file_not_found_output, Vcs, VcsError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Ceiling on a single `jj` invocation. The tool is local and usually
/// sub-second; a call past this is hung, not slow.
const TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// VCS client backed by the `jj` binary.
#[derive(Clone, Default)]
pub struct JjClient;

impl JjClient {
    pub fn new() -> Self {
        Self
    }

    /// Run a prepared tool command under [`TOOL_TIMEOUT`].
    ///
    /// Spawn failures and timeouts both land in [`VcsError::Spawn`] keyed by
    /// `op`, the `jj <args>` line being attempted. On timeout the dropped
    /// child is reaped by tokio.
    async fn invoke(mut cmd: Command, op: String) -> Result<std::process::Output, VcsError> {
        match tokio::time::timeout(TOOL_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(VcsError::Spawn {
                command: op,
                message: e.to_string(),
            }),
            Err(_) => Err(VcsError::Spawn {
                command: op,
                message: format!("gave no result within {}s", TOOL_TIMEOUT.as_secs()),
            }),
        }
    }

    /// Run `jj` with `-R repo` and the given args, returning raw output.
    async fn run(&self, repo: &Path, args: &[&str]) -> Result<std::process::Output, VcsError> {
        let op = format!("jj {}", args.join(" "));
        debug!(repo = %repo.display(), command = %op, "running vcs command");

        let mut cmd = Command::new("jj");
        cmd.arg("-R").arg(repo).args(args);
        Self::invoke(cmd, op).await
    }

    /// Run and require a zero exit, returning stdout.
    async fn run_ok(&self, repo: &Path, args: &[&str]) -> Result<Vec<u8>, VcsError> {
        let output = self.run(repo, args).await?;
        if output.status.success() {
            return Ok(output.stdout);
        }
        let combined = combine_output(&output);
        let command = format!("jj {}", args.join(" "));
        if is_file_not_found_output(&combined) {
            // The last positional arg is the path jj complained about.
            let path = args.last().copied().unwrap_or_default().to_string();
            return Err(VcsError::FileNotFound { path });
        }
        Err(VcsError::Command {
            command,
            output: combined,
        })
    }

    async fn run_ok_str(&self, repo: &Path, args: &[&str]) -> Result<String, VcsError> {
        let stdout = self.run_ok(repo, args).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }
}

fn parse_bookmark_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `jj workspace list` output; lines look like `name: path/to/checkout`.
fn parse_workspace_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|l| l.split(':').next())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

fn combine_output(output: &std::process::Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr.trim());
    }
    combined.trim().to_string()
}

#[async_trait]
impl Vcs for JjClient {
    async fn init(&self, path: &Path) -> Result<(), VcsError> {
        // `jj git init` does not take -R; it creates the repo in place.
        let op = "jj git init".to_string();
        let mut cmd = Command::new("jj");
        cmd.arg("git").arg("init").arg(path);
        let output = Self::invoke(cmd, op.clone()).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(VcsError::Command {
                command: op,
                output: combine_output(&output),
            })
        }
    }

    async fn bookmark_list(&self, path: &Path) -> Result<Vec<String>, VcsError> {
        let stdout = self
            .run_ok_str(path, &["bookmark", "list", "-T", r#"name ++ "\n""#])
            .await?;
        Ok(parse_bookmark_names(&stdout))
    }

    async fn bookmark_create(&self, path: &Path, name: &str, rev: &str) -> Result<(), VcsError> {
        self.run_ok(path, &["bookmark", "create", name, "-r", rev])
            .await?;
        Ok(())
    }

    async fn new_change(&self, path: &Path, parent_rev: &str) -> Result<String, VcsError> {
        self.run_ok(path, &["new", parent_rev]).await?;
        self.current_change_id(path).await
    }

    async fn edit(&self, path: &Path, rev: &str) -> Result<(), VcsError> {
        self.run_ok(path, &["edit", rev]).await?;
        Ok(())
    }

    async fn current_change_id(&self, path: &Path) -> Result<String, VcsError> {
        self.run_ok_str(path, &["log", "-r", "@", "--no-graph", "-T", "change_id"])
            .await
    }

    async fn workspace_root(&self, path: &Path) -> Result<PathBuf, VcsError> {
        let stdout = self.run_ok_str(path, &["workspace", "root"]).await?;
        Ok(PathBuf::from(stdout))
    }

    async fn workspace_add(
        &self,
        repo: &Path,
        name: &str,
        ws_path: &Path,
    ) -> Result<(), VcsError> {
        let ws = ws_path.display().to_string();
        self.run_ok(repo, &["workspace", "add", "--name", name, &ws])
            .await?;
        Ok(())
    }

    async fn workspace_list(&self, repo: &Path) -> Result<Vec<String>, VcsError> {
        let stdout = self.run_ok_str(repo, &["workspace", "list"]).await?;
        Ok(parse_workspace_names(&stdout))
    }

    async fn workspace_forget(&self, repo: &Path, name: &str) -> Result<(), VcsError> {
        self.run_ok(repo, &["workspace", "forget", name]).await?;
        Ok(())
    }

    async fn workspace_update_stale(&self, ws_path: &Path) -> Result<(), VcsError> {
        self.run_ok(ws_path, &["workspace", "update-stale"]).await?;
        Ok(())
    }

    async fn file_show(
        &self,
        repo: &Path,
        rev: &str,
        relative_path: &str,
    ) -> Result<Vec<u8>, VcsError> {
        self.run_ok(repo, &["file", "show", "-r", rev, relative_path])
            .await
    }

    async fn snapshot(&self, ws_path: &Path) -> Result<(), VcsError> {
        self.run_ok(ws_path, &["debug", "snapshot"]).await?;
        Ok(())
    }

    async fn describe(&self, ws_path: &Path, message: &str) -> Result<(), VcsError> {
        self.run_ok(ws_path, &["describe", "-m", message]).await?;
        Ok(())
    }

    async fn commit(&self, ws_path: &Path, message: &str) -> Result<(), VcsError> {
        self.run_ok(ws_path, &["commit", "-m", message]).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "jj_tests.rs"]
mod tests;
