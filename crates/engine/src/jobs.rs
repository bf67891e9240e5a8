// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record-keeping for jobs on top of the state file.

use incr_core::{Clock, JobId, JobRecord, JobStage, JobStatus, SystemClock, TodoId};
use incr_storage::{StateError, StateFile};
use std::path::Path;
use thiserror::Error;

/// Errors from job bookkeeping.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("ambiguous job id prefix {prefix:?} ({} matches)", matches.len())]
    AmbiguousJobIdPrefix { prefix: String, matches: Vec<JobId> },
    #[error(transparent)]
    State(#[from] StateError),
}

/// Per-field updates to a job record.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub stage: Option<JobStage>,
    pub status: Option<JobStatus>,
    pub workspace_name: Option<String>,
}

/// Filter for listing jobs. Defaults to active jobs only.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub include_all: bool,
}

/// Thin façade over the jobs section of the state file.
#[derive(Clone)]
pub struct JobManager<C: Clock = SystemClock> {
    state: StateFile,
    clock: C,
}

impl JobManager {
    pub fn new(state: StateFile) -> Self {
        Self::with_clock(state, SystemClock)
    }
}

impl<C: Clock> JobManager<C> {
    pub fn with_clock(state: StateFile, clock: C) -> Self {
        Self { state, clock }
    }

    /// Create an active job record for a todo.
    pub fn create(&self, repo_path: &Path, todo_id: &TodoId) -> Result<JobRecord, JobError> {
        let now = self.clock.now();
        let id = JobId::generate();
        let todo_id = todo_id.clone();
        let repo_path = repo_path.to_path_buf();
        let record = self.state.update(move |doc| {
            let repo = std::fs::canonicalize(&repo_path).unwrap_or(repo_path);
            let alias = doc.get_or_create_repo_alias(&repo);
            let record = JobRecord::new(id.clone(), alias, todo_id, now);
            doc.jobs.insert(id.to_string(), record.clone());
            record
        })?;
        Ok(record)
    }

    /// Apply updates to a job. Every mutation bumps `updatedAt`; terminal
    /// transitions set `completedAt`.
    pub fn update(&self, id: &JobId, update: JobUpdate) -> Result<JobRecord, JobError> {
        let now = self.clock.now();
        let key = id.to_string();
        self.state.update(move |doc| {
            let Some(record) = doc.jobs.get_mut(&key) else {
                return Err(JobError::JobNotFound(key));
            };
            if let Some(stage) = update.stage {
                record.stage = stage;
            }
            if let Some(status) = update.status {
                record.status = status;
                if status.is_terminal() && record.completed_at.is_none() {
                    record.completed_at = Some(now);
                }
            }
            if let Some(workspace_name) = update.workspace_name {
                record.workspace_name = workspace_name;
            }
            record.updated_at = now;
            Ok(record.clone())
        })?
    }

    pub fn get(&self, id: &JobId) -> Result<JobRecord, JobError> {
        let doc = self.state.load()?;
        doc.jobs
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| JobError::JobNotFound(id.to_string()))
    }

    /// Find a job by exact job ID, falling back to todo-ID prefix.
    ///
    /// When the prefix matches jobs for one todo, the active job wins, then
    /// the latest started. A prefix spanning several todos is ambiguous.
    pub fn find(&self, query: &str) -> Result<JobRecord, JobError> {
        let doc = self.state.load()?;
        if let Some(record) = doc.jobs.get(query) {
            return Ok(record.clone());
        }

        let needle = query.to_lowercase();
        let mut matches: Vec<&JobRecord> = doc
            .jobs
            .values()
            .filter(|job| job.todo_id.as_str().starts_with(&needle))
            .collect();
        if matches.is_empty() {
            return Err(JobError::JobNotFound(query.to_string()));
        }

        let mut todo_ids: Vec<&str> = matches.iter().map(|j| j.todo_id.as_str()).collect();
        todo_ids.sort_unstable();
        todo_ids.dedup();
        if todo_ids.len() > 1 {
            return Err(JobError::AmbiguousJobIdPrefix {
                prefix: query.to_string(),
                matches: matches.iter().map(|j| j.id.clone()).collect(),
            });
        }

        matches.sort_by(|a, b| {
            let a_active = a.status == JobStatus::Active;
            let b_active = b.status == JobStatus::Active;
            b_active
                .cmp(&a_active)
                .then(b.started_at.cmp(&a.started_at))
        });
        Ok(matches[0].clone())
    }

    /// List jobs, newest first. Defaults to active jobs only.
    pub fn list(&self, filter: JobFilter) -> Result<Vec<JobRecord>, JobError> {
        let doc = self.state.load()?;
        let mut jobs: Vec<JobRecord> = doc
            .jobs
            .values()
            .filter(|job| match (filter.status, filter.include_all) {
                (Some(status), _) => job.status == status,
                (None, true) => true,
                (None, false) => job.status == JobStatus::Active,
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(jobs)
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
