// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job records: one execution attempt for a todo.

use crate::todo::TodoId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a job instance.
///
/// Jobs are one-shot execution attempts, so IDs are minted at random
/// (UUID v4) rather than content-derived like todo IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random job ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase a job is currently working through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Staging,
    Implementing,
    Testing,
    Reviewing,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStage::Staging => "staging",
            JobStage::Implementing => "implementing",
            JobStage::Testing => "testing",
            JobStage::Reviewing => "reviewing",
        };
        write!(f, "{s}")
    }
}

impl FromStr for JobStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staging" => Ok(JobStage::Staging),
            "implementing" => Ok(JobStage::Implementing),
            "testing" => Ok(JobStage::Testing),
            "reviewing" => Ok(JobStage::Reviewing),
            other => Err(format!("invalid job stage: {other:?}")),
        }
    }
}

/// Terminal-or-not status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Completed,
    Failed,
    Killed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Active)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Killed => "killed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(JobStatus::Active),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "killed" => Ok(JobStatus::Killed),
            other => Err(format!("invalid job status: {other:?}")),
        }
    }
}

/// A single execution attempt for a todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub repo_alias: String,
    pub todo_id: TodoId,
    pub stage: JobStage,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workspace_name: String,
}

impl JobRecord {
    pub fn new(
        id: JobId,
        repo_alias: impl Into<String>,
        todo_id: TodoId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            repo_alias: repo_alias.into(),
            todo_id,
            stage: JobStage::Staging,
            status: JobStatus::Active,
            created_at: started_at,
            started_at,
            updated_at: started_at,
            completed_at: None,
            workspace_name: String::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
