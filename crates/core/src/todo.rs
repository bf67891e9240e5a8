// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Todo work items: statuses, priorities, dependencies, and the
//! status-transition rules every write path shares.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of characters in a todo ID.
pub const TODO_ID_LEN: usize = 8;

/// Lowercase base32 alphabet (RFC 4648, no padding) used for todo IDs.
const ID_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Unique identifier for a todo: 8 lowercase base32 characters derived
/// from the title and creation timestamp.
///
/// Users address todos by unique prefix, so IDs stay short and entirely
/// lowercase — prefix lookup can normalize input without information loss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TodoId(pub String);

impl TodoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the ID for a title created at `epoch_ms`.
    ///
    /// The first [`TODO_ID_LEN`] base32 characters of
    /// `SHA-256(title \n epoch_ms)`: 40 bits of digest keeps accidental
    /// collisions out of reach for store-sized populations while staying
    /// short enough to type.
    pub fn derive(title: &str, epoch_ms: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(b"\n");
        hasher.update(epoch_ms.to_be_bytes());
        let digest = hasher.finalize();

        // 8 chars x 5 bits, consumed from the first 5 digest bytes.
        let mut acc: u64 = 0;
        for byte in &digest[..5] {
            acc = (acc << 8) | u64::from(*byte);
        }
        let mut id = String::with_capacity(TODO_ID_LEN);
        for i in (0..TODO_ID_LEN).rev() {
            let idx = ((acc >> (i * 5)) & 0x1f) as usize;
            id.push(ID_ALPHABET[idx] as char);
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for TodoId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TodoId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Maximum visible characters in a todo title.
pub const TITLE_MAX_CHARS: usize = 500;

/// Errors from todo validation and mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TodoError {
    #[error("todo title must not be empty")]
    EmptyTitle,
    #[error("todo title exceeds {TITLE_MAX_CHARS} characters ({len})")]
    TitleTooLong { len: usize },
    #[error("invalid status: {0:?}")]
    InvalidStatus(String),
    #[error("invalid type: {0:?}")]
    InvalidType(String),
    #[error("invalid priority: {0} (must be 0..=4)")]
    InvalidPriority(i64),
    #[error("todo cannot depend on itself")]
    SelfDependency,
    #[error("dependency already exists")]
    DuplicateDependency,
    #[error("deletedAt may only be set on tombstone todos")]
    DeletedAtRequiresTombstoneStatus,
    #[error("status {status} requires closedAt")]
    MissingClosedAt { status: TodoStatus },
    #[error("status {status} must not carry closedAt")]
    UnexpectedClosedAt { status: TodoStatus },
    #[error("tombstone status requires deletedAt")]
    MissingDeletedAt,
    #[error("deleteReason requires a tombstone with deletedAt")]
    DeleteReasonRequiresDeletedAt,
    #[error("status in_progress requires startedAt")]
    MissingStartedAt,
}

/// Lifecycle status of a todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Open,
    Proposed,
    InProgress,
    Closed,
    Done,
    Waiting,
    Tombstone,
}

impl TodoStatus {
    /// Statuses that resolve a blocking dependency.
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            TodoStatus::Closed | TodoStatus::Done | TodoStatus::Tombstone
        )
    }

    pub const ALL: [TodoStatus; 7] = [
        TodoStatus::Open,
        TodoStatus::Proposed,
        TodoStatus::InProgress,
        TodoStatus::Closed,
        TodoStatus::Done,
        TodoStatus::Waiting,
        TodoStatus::Tombstone,
    ];
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TodoStatus::Open => "open",
            TodoStatus::Proposed => "proposed",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Closed => "closed",
            TodoStatus::Done => "done",
            TodoStatus::Waiting => "waiting",
            TodoStatus::Tombstone => "tombstone",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TodoStatus {
    type Err = TodoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TodoStatus::Open),
            "proposed" => Ok(TodoStatus::Proposed),
            "in_progress" => Ok(TodoStatus::InProgress),
            "closed" => Ok(TodoStatus::Closed),
            "done" => Ok(TodoStatus::Done),
            "waiting" => Ok(TodoStatus::Waiting),
            "tombstone" => Ok(TodoStatus::Tombstone),
            other => Err(TodoError::InvalidStatus(other.to_string())),
        }
    }
}

/// Kind of work a todo represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoType {
    Task,
    Bug,
    Feature,
    Design,
}

impl TodoType {
    /// Sort rank for the ready ordering (bugs first).
    pub fn rank(self) -> u8 {
        match self {
            TodoType::Bug => 0,
            TodoType::Task => 1,
            TodoType::Feature => 2,
            TodoType::Design => 3,
        }
    }
}

impl Default for TodoType {
    fn default() -> Self {
        TodoType::Task
    }
}

impl fmt::Display for TodoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TodoType::Task => "task",
            TodoType::Bug => "bug",
            TodoType::Feature => "feature",
            TodoType::Design => "design",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TodoType {
    type Err = TodoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(TodoType::Task),
            "bug" => Ok(TodoType::Bug),
            "feature" => Ok(TodoType::Feature),
            "design" => Ok(TodoType::Design),
            other => Err(TodoError::InvalidType(other.to_string())),
        }
    }
}

/// Priority in 0..=4, 0 = critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    pub const CRITICAL: Priority = Priority(0);
    pub const DEFAULT: Priority = Priority(2);
    pub const MAX: u8 = 4;

    pub fn new(value: i64) -> Result<Self, TodoError> {
        if (0..=i64::from(Self::MAX)).contains(&value) {
            Ok(Priority(value as u8))
        } else {
            Err(TodoError::InvalidPriority(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::DEFAULT
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TodoStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(rename = "type", default)]
    pub todo_type: TodoType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub delete_reason: String,
}

impl Todo {
    /// Create a new todo with a hash-derived ID.
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Result<Self, TodoError> {
        let title = title.into();
        validate_title(&title)?;
        let id = TodoId::derive(&title, now.timestamp_millis().max(0) as u64);
        Ok(Self {
            id,
            title,
            description: String::new(),
            status: TodoStatus::Open,
            priority: Priority::default(),
            todo_type: TodoType::default(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            started_at: None,
            completed_at: None,
            deleted_at: None,
            delete_reason: String::new(),
        })
    }

    /// Apply a status transition, adjusting timestamps per the lifecycle rules.
    ///
    /// Same-status transitions only bump `updated_at`.
    pub fn transition(&mut self, to: TodoStatus, now: DateTime<Utc>) {
        if to == self.status {
            self.updated_at = now;
            return;
        }
        let from = self.status;

        match to {
            TodoStatus::Closed | TodoStatus::Done => {
                self.closed_at = Some(now);
                self.deleted_at = None;
                self.delete_reason.clear();
                if to == TodoStatus::Done && from == TodoStatus::InProgress {
                    // Done straight from in_progress keeps startedAt and
                    // records the completion time.
                    self.completed_at = Some(now);
                } else if from == TodoStatus::InProgress {
                    self.started_at = None;
                    self.completed_at = None;
                }
            }
            TodoStatus::Tombstone => {
                self.closed_at = None;
                if self.deleted_at.is_none() {
                    self.deleted_at = Some(now);
                }
                if from == TodoStatus::InProgress {
                    self.started_at = None;
                    self.completed_at = None;
                }
            }
            TodoStatus::InProgress => {
                self.closed_at = None;
                self.deleted_at = None;
                self.delete_reason.clear();
                self.started_at = Some(now);
                self.completed_at = None;
            }
            TodoStatus::Open | TodoStatus::Proposed | TodoStatus::Waiting => {
                self.closed_at = None;
                self.deleted_at = None;
                self.delete_reason.clear();
                if from == TodoStatus::InProgress {
                    self.started_at = None;
                    self.completed_at = None;
                }
            }
        }

        self.status = to;
        self.updated_at = now;
    }

    /// Check status/timestamp coherence. Run on every write.
    pub fn validate(&self) -> Result<(), TodoError> {
        validate_title(&self.title)?;

        match self.status {
            TodoStatus::Closed | TodoStatus::Done => {
                if self.closed_at.is_none() {
                    return Err(TodoError::MissingClosedAt {
                        status: self.status,
                    });
                }
            }
            TodoStatus::Tombstone => {
                if self.closed_at.is_some() {
                    return Err(TodoError::UnexpectedClosedAt {
                        status: self.status,
                    });
                }
                if self.deleted_at.is_none() {
                    return Err(TodoError::MissingDeletedAt);
                }
            }
            _ => {
                if self.closed_at.is_some() {
                    return Err(TodoError::UnexpectedClosedAt {
                        status: self.status,
                    });
                }
            }
        }

        if !self.delete_reason.is_empty()
            && (self.deleted_at.is_none() || self.status != TodoStatus::Tombstone)
        {
            return Err(TodoError::DeleteReasonRequiresDeletedAt);
        }

        if self.status == TodoStatus::InProgress && self.started_at.is_none() {
            return Err(TodoError::MissingStartedAt);
        }

        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), TodoError> {
    if title.trim().is_empty() {
        return Err(TodoError::EmptyTitle);
    }
    let len = title.chars().count();
    if len > TITLE_MAX_CHARS {
        return Err(TodoError::TitleTooLong { len });
    }
    Ok(())
}

/// Directed dependency edge: `todo_id` depends on `depends_on_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub todo_id: TodoId,
    pub depends_on_id: TodoId,
    pub created_at: DateTime<Utc>,
}

impl Dependency {
    pub fn new(
        todo_id: TodoId,
        depends_on_id: TodoId,
        now: DateTime<Utc>,
    ) -> Result<Self, TodoError> {
        if todo_id == depends_on_id {
            return Err(TodoError::SelfDependency);
        }
        Ok(Self {
            todo_id,
            depends_on_id,
            created_at: now,
        })
    }
}

#[cfg(test)]
#[path = "todo_tests.rs"]
mod tests;
