// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP error mapping: every failure becomes `{"error": "..."}` with an
//! appropriate 4xx/5xx status.

use crate::protocol::ErrorBody;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use incr_engine::{JobError, RunnerError};
use incr_pool::PoolError;
use incr_todo::StoreError;
use incr_vcs::VcsError;

/// An error ready to be serialized as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::TodoNotFound { .. } | StoreError::NoTodoStore => StatusCode::NOT_FOUND,
            StoreError::AmbiguousTodoIdPrefix { .. }
            | StoreError::ReadOnlyStore
            | StoreError::Todo(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        let status = match &e {
            JobError::JobNotFound(_) => StatusCode::NOT_FOUND,
            JobError::AmbiguousJobIdPrefix { .. } => StatusCode::BAD_REQUEST,
            JobError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(e: PoolError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<VcsError> for ApiError {
    fn from(e: VcsError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<RunnerError> for ApiError {
    fn from(e: RunnerError) -> Self {
        match e {
            RunnerError::Store(store) => store.into(),
            RunnerError::Job(job) => job.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
