// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job events: one NDJSON line per event in a job's log.
//!
//! The `data` payload is opaque to the log layer — the agent subprocess emits
//! arbitrary JSON, and the runner adds a few well-known events around it.

use crate::job::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One entry in a job's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub name: String,
    #[serde(default)]
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(name: impl Into<String>, data: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            data,
            timestamp,
        }
    }

    /// Emitted when the job begins executing in its workspace.
    pub fn started(todo_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new("job.start", json!({ "todoId": todo_id }), timestamp)
    }

    /// Emitted when the job advances to a new stage.
    pub fn stage(stage: impl std::fmt::Display, timestamp: DateTime<Utc>) -> Self {
        Self::new("job.stage", json!({ "stage": stage.to_string() }), timestamp)
    }

    /// Terminal event: the job finished with the given status.
    pub fn ended(status: JobStatus, exit_code: Option<i32>, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            "job.end",
            json!({ "status": status.to_string(), "exitCode": exit_code }),
            timestamp,
        )
    }

    /// Raw non-JSON output line from the agent subprocess.
    pub fn agent_output(line: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new("agent.output", json!({ "line": line }), timestamp)
    }

    /// Whether this event marks the end of the job's log.
    pub fn is_terminal(&self) -> bool {
        self.name == "job.end"
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
