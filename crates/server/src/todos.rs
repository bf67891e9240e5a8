// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/todos/*` handlers.
//!
//! Reads open the store read-only (no workspace, one VCS invocation per
//! read) and treat an absent store as empty. Writes acquire a store
//! workspace for the duration of the request; `/todos/create` creates the
//! store on demand without prompting.

use crate::error::ApiError;
use crate::protocol::{
    ReadyRequest, ShowRequest, TodoCreateRequest, TodoOptionsBody, TodoResponse,
    TodoUpdateRequest, TodosListRequest, TodosResponse,
};
use crate::server::SwarmState;
use axum::extract::State;
use axum::Json;
use incr_todo::{
    CreateOptions, ListFilter, OpenOptions, StoreError, TodoStore, UpdateOptions,
};
use incr_vcs::Vcs;
use std::sync::Arc;

pub async fn handle_list<V: Vcs>(
    State(state): State<Arc<SwarmState<V>>>,
    Json(req): Json<TodosListRequest>,
) -> Result<Json<TodosResponse>, ApiError> {
    let store =
        match TodoStore::open_read_only(&state.config.repo_path, state.vcs.clone()).await {
            Ok(store) => store,
            Err(StoreError::NoTodoStore) => {
                return Ok(Json(TodosResponse { todos: Vec::new() }))
            }
            Err(e) => return Err(e.into()),
        };

    let todos = store
        .list(ListFilter {
            status: req.filter.status,
            todo_type: req.filter.todo_type,
            priority: req.filter.priority,
            ids: req.filter.ids,
            title_substring: req.filter.title_substring,
            description_substring: req.filter.description_substring,
            include_tombstones: req.filter.include_tombstones,
        })
        .await?;
    Ok(Json(TodosResponse { todos }))
}

pub async fn handle_create<V: Vcs>(
    State(state): State<Arc<SwarmState<V>>>,
    Json(req): Json<TodoCreateRequest>,
) -> Result<Json<TodoResponse>, ApiError> {
    let store = TodoStore::open_read_write(
        &state.config.repo_path,
        state.pool.clone(),
        OpenOptions {
            create_if_missing: true,
        },
    )
    .await?;

    let result = store
        .create(
            &req.title,
            CreateOptions {
                status: req.options.status,
                todo_type: req.options.todo_type,
                priority: req.options.priority,
                description: req.options.description.unwrap_or_default(),
                dependencies: req.options.dependencies,
            },
        )
        .await;
    let released = store.release();

    let todo = result?;
    released?;
    Ok(Json(TodoResponse { todo }))
}

pub async fn handle_update<V: Vcs>(
    State(state): State<Arc<SwarmState<V>>>,
    Json(req): Json<TodoUpdateRequest>,
) -> Result<Json<TodosResponse>, ApiError> {
    let store = TodoStore::open_read_write(
        &state.config.repo_path,
        state.pool.clone(),
        OpenOptions::default(),
    )
    .await?;

    let result = store.update(&req.ids, update_options(req.options)).await;
    let released = store.release();

    let todos = result?;
    released?;
    Ok(Json(TodosResponse { todos }))
}

pub async fn handle_ready<V: Vcs>(
    State(state): State<Arc<SwarmState<V>>>,
    Json(req): Json<ReadyRequest>,
) -> Result<Json<TodosResponse>, ApiError> {
    let store =
        match TodoStore::open_read_only(&state.config.repo_path, state.vcs.clone()).await {
            Ok(store) => store,
            Err(StoreError::NoTodoStore) => {
                return Ok(Json(TodosResponse { todos: Vec::new() }))
            }
            Err(e) => return Err(e.into()),
        };
    let todos = store.ready(req.limit).await?;
    Ok(Json(TodosResponse { todos }))
}

pub async fn handle_show<V: Vcs>(
    State(state): State<Arc<SwarmState<V>>>,
    Json(req): Json<ShowRequest>,
) -> Result<Json<TodosResponse>, ApiError> {
    let store =
        TodoStore::open_read_only(&state.config.repo_path, state.vcs.clone()).await?;
    let todos = store.show(&req.ids).await?;
    Ok(Json(TodosResponse { todos }))
}

fn update_options(body: TodoOptionsBody) -> UpdateOptions {
    UpdateOptions {
        title: body.title,
        description: body.description,
        status: body.status,
        todo_type: body.todo_type,
        priority: body.priority,
        deleted_at: body.deleted_at,
        delete_reason: body.delete_reason,
    }
}

#[cfg(test)]
#[path = "todos_tests.rs"]
mod tests;
