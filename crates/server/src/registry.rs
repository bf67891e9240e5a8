// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process registry of running jobs.
//!
//! The registry answers "is this job alive in THIS process" for kill and
//! tail; the state file stays the authority for job records. The mutex is
//! never held across I/O.

use incr_core::{JobId, TodoId};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};

/// A running job's control handles.
#[derive(Clone)]
pub struct LiveJob {
    pub todo_id: TodoId,
    /// Buffered interrupt channel (size 1); dropped sends are fine because
    /// the runner only needs one signal.
    pub interrupts: mpsc::Sender<()>,
    /// Flips to true when the job's task has fully completed.
    pub done: watch::Receiver<bool>,
}

/// Registry of jobs currently running in this process.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, LiveJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: JobId, job: LiveJob) {
        self.jobs.lock().insert(id, job);
    }

    pub fn remove(&self, id: &JobId) -> Option<LiveJob> {
        self.jobs.lock().remove(id)
    }

    pub fn get(&self, id: &JobId) -> Option<LiveJob> {
        self.jobs.lock().get(id).cloned()
    }

    /// Whether the job is alive in this process.
    pub fn is_running(&self, id: &JobId) -> bool {
        self.jobs.lock().contains_key(id)
    }

    /// Snapshot of all live jobs.
    pub fn all(&self) -> Vec<(JobId, LiveJob)> {
        self.jobs
            .lock()
            .iter()
            .map(|(id, job)| (id.clone(), job.clone()))
            .collect()
    }

    /// Request an interrupt. Non-blocking; returns whether the job was
    /// found. A full channel still counts as delivered.
    pub fn interrupt(&self, id: &JobId) -> bool {
        let Some(job) = self.get(id) else {
            return false;
        };
        let _ = job.interrupts.try_send(());
        true
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
