// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful shutdown with a bounded drain.
//!
//! Every live job gets an interrupt, then up to five seconds to finish.
//! Stragglers are forcibly marked failed and their todos reopened so no
//! todo is left `in_progress` by a dying server.

use crate::server::SwarmState;
use incr_core::JobStatus;
use incr_engine::JobUpdate;
use incr_todo::{OpenOptions, TodoStore};
use incr_vcs::Vcs;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Per-job drain deadline, also used for the HTTP shutdown.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Interrupt and drain all live jobs. Returns the accumulated errors.
pub async fn drain_jobs<V: Vcs>(state: &SwarmState<V>) -> Vec<String> {
    let jobs = state.registry.all();
    if jobs.is_empty() {
        return Vec::new();
    }
    info!(count = jobs.len(), "interrupting live jobs for shutdown");

    for (job_id, job) in &jobs {
        if job.interrupts.try_send(()).is_err() {
            // Channel full means an interrupt is already pending.
            info!(job_id = %job_id, "interrupt already pending");
        }
    }

    let mut errors = Vec::new();
    for (job_id, mut job) in jobs {
        let drained = timeout(DRAIN_TIMEOUT, async {
            while !*job.done.borrow() {
                if job.done.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;

        if drained.is_ok() {
            continue;
        }

        warn!(job_id = %job_id, "job did not stop in time, marking failed");
        errors.push(format!(
            "job {job_id} did not stop within {}s",
            DRAIN_TIMEOUT.as_secs()
        ));

        if let Err(e) = state.runner.jobs().update(
            &job_id,
            JobUpdate {
                status: Some(JobStatus::Failed),
                ..JobUpdate::default()
            },
        ) {
            errors.push(format!("job {job_id}: {e}"));
        }

        if let Err(e) = reopen_todo(state, job.todo_id.as_str()).await {
            errors.push(format!("todo {}: {e}", job.todo_id));
        }

        // Drop the registry entry so tailers stop lingering on a job that
        // will never log again from this process.
        state.registry.remove(&job_id);
    }
    errors
}

async fn reopen_todo<V: Vcs>(
    state: &SwarmState<V>,
    todo_id: &str,
) -> Result<(), incr_todo::StoreError> {
    let store = TodoStore::open_read_write(
        &state.config.repo_path,
        state.pool.clone(),
        OpenOptions::default(),
    )
    .await?;
    let result = store.reopen(&[todo_id.to_string()]).await;
    store.release()?;
    result.map(|_| ())
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
