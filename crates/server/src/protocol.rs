// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response DTOs for the HTTP surface.
//!
//! All endpoints are POST with JSON bodies; errors are `{"error": "..."}`.

use chrono::{DateTime, Utc};
use incr_core::{JobEvent, JobRecord, Todo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// -- jobs --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoRequest {
    pub todo_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoResponse {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KillResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub events: Vec<JobEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub filter: JobFilterBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilterBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub include_all: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub jobs: Vec<JobRecord>,
}

// -- todos --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodosListRequest {
    #[serde(default)]
    pub filter: TodoFilterBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoFilterBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub todo_type: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub title_substring: String,
    #[serde(default)]
    pub description_substring: String,
    #[serde(default)]
    pub include_tombstones: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoOptionsBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub todo_type: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delete_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoCreateRequest {
    pub title: String,
    #[serde(default)]
    pub options: TodoOptionsBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoResponse {
    pub todo: Todo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoUpdateRequest {
    pub ids: Vec<String>,
    #[serde(default)]
    pub options: TodoOptionsBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodosResponse {
    pub todos: Vec<Todo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadyRequest {
    #[serde(default)]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowRequest {
    pub ids: Vec<String>,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
