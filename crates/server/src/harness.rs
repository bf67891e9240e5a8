// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared in-process HTTP harness for server tests.

use crate::config::Config;
use crate::server::{SwarmServer, SwarmState};
use incr_vcs::{FakeVcs, Vcs};
use serde_json::Value;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Agent script that exits successfully after emitting one event.
pub const OK_AGENT: &str = r#"printf '{"name":"agent.note","data":{"ok":true}}\n'"#;

/// Agent script that blocks until interrupted, then exits 130.
pub const BLOCKING_AGENT: &str = r#"trap 'exit 130' INT; while true; do sleep 0.05; done"#;

pub struct Harness {
    pub _dir: TempDir,
    pub repo: PathBuf,
    pub vcs: FakeVcs,
    pub state: Arc<SwarmState<FakeVcs>>,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with_agent(OK_AGENT).await
    }

    pub async fn start_with_agent(script: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        let vcs = FakeVcs::new();
        vcs.init(&repo).await.unwrap();

        let config = Config {
            repo_path: std::fs::canonicalize(&repo).unwrap(),
            state_dir: dir.path().join("state"),
            workspaces_dir: dir.path().join("workspaces"),
            events_dir: dir.path().join("events"),
            listen: "127.0.0.1:0".parse().unwrap(),
            agent_command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        };

        let server = SwarmServer::new(config, vcs.clone());
        let state = Arc::clone(&server.state);
        let router = server.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(axum::serve(listener, router).into_future());

        Self {
            _dir: dir,
            repo,
            vcs,
            state,
            addr,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// POST expecting 200; returns the parsed body.
    pub async fn post_ok(&self, path: &str, body: Value) -> Value {
        let response = self.post(path, body).await;
        let status = response.status();
        let body: Value = response.json().await.unwrap();
        assert!(status.is_success(), "POST {path} -> {status}: {body}");
        body
    }

    pub async fn create_todo(&self, title: &str) -> String {
        let body = self
            .post_ok(
                "/todos/create",
                serde_json::json!({ "title": title, "options": {} }),
            )
            .await;
        body["todo"]["id"].as_str().unwrap().to_string()
    }

    /// Run a todo and wait for the job to leave the in-process registry.
    pub async fn run_to_completion(&self, todo_id: &str) -> String {
        let body = self
            .post_ok("/do", serde_json::json!({ "todo_id": todo_id }))
            .await;
        let job_id = body["job_id"].as_str().unwrap().to_string();
        self.wait_for_job_end(&job_id).await;
        job_id
    }

    pub async fn wait_for_job_end(&self, job_id: &str) {
        for _ in 0..200 {
            if !self
                .state
                .registry
                .is_running(&incr_core::JobId::new(job_id))
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        panic!("job {job_id} did not finish");
    }

    pub async fn todo_status(&self, todo_id: &str) -> String {
        let body = self
            .post_ok("/todos/show", serde_json::json!({ "ids": [todo_id] }))
            .await;
        body["todos"][0]["status"].as_str().unwrap().to_string()
    }
}
