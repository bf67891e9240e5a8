// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Swarm server state and the HTTP router.

use crate::config::Config;
use crate::error::ApiError;
use crate::protocol::{
    DoRequest, DoResponse, KillRequest, KillResponse, ListRequest, ListResponse, LogsRequest,
    LogsResponse,
};
use crate::registry::{JobRegistry, LiveJob};
use crate::{tail, todos};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use incr_core::{JobId, JobStatus, TodoId};
use incr_engine::{sync_outputs, JobFilter, JobManager, JobRunner, JobStartInfo, RunOptions};
use incr_pool::{AcquireOptions, WorkspacePool};
use incr_storage::{EventLog, StateFile};
use incr_vcs::Vcs;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info, warn};

/// Shared context for all request handlers.
pub struct SwarmState<V: Vcs> {
    pub config: Config,
    pub pool: WorkspacePool<V>,
    pub runner: JobRunner<V>,
    pub vcs: V,
    pub registry: JobRegistry,
}

/// The swarm server: composes pool, store, jobs, and runner behind HTTP.
pub struct SwarmServer<V: Vcs> {
    pub state: Arc<SwarmState<V>>,
}

impl<V: Vcs> SwarmServer<V> {
    pub fn new(config: Config, vcs: V) -> Self {
        let state_file = StateFile::new(&config.state_dir);
        let pool = WorkspacePool::new(
            state_file.clone(),
            vcs.clone(),
            config.workspaces_dir.clone(),
        );
        let jobs = JobManager::new(state_file);
        let runner = JobRunner::new(pool.clone(), jobs, incr_core::SystemClock);
        Self {
            state: Arc::new(SwarmState {
                config,
                pool,
                runner,
                vcs,
                registry: JobRegistry::new(),
            }),
        }
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }
}

/// Build the endpoint surface. Method mismatches get 405 + `Allow` from the
/// method router; handler panics become a plain 500.
pub fn router<V: Vcs>(state: Arc<SwarmState<V>>) -> Router {
    Router::new()
        .route("/do", post(handle_do::<V>))
        .route("/kill", post(handle_kill::<V>))
        .route("/logs", post(handle_logs::<V>))
        .route("/tail", post(tail::handle_tail::<V>))
        .route("/list", post(handle_list::<V>))
        .route("/todos/list", post(todos::handle_list::<V>))
        .route("/todos/create", post(todos::handle_create::<V>))
        .route("/todos/update", post(todos::handle_update::<V>))
        .route("/todos/ready", post(todos::handle_ready::<V>))
        .route("/todos/show", post(todos::handle_show::<V>))
        .layer(CatchPanicLayer::custom(|_panic: Box<dyn std::any::Any + Send>| {
            axum::response::IntoResponse::into_response((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(crate::protocol::ErrorBody {
                    error: "internal server error".to_string(),
                }),
            ))
        }))
        .with_state(state)
}

/// Final word on a `/do` job task, for callers still waiting on the
/// response when the job ends before `on_start`.
enum JobOutcome {
    Finished { job_id: JobId },
    Failed { job_id: Option<JobId>, message: String },
}

async fn handle_do<V: Vcs>(
    State(state): State<Arc<SwarmState<V>>>,
    Json(req): Json<DoRequest>,
) -> Result<Json<DoResponse>, ApiError> {
    let todo_id = req.todo_id.trim().to_string();
    if todo_id.is_empty() {
        return Err(ApiError::bad_request("todo_id must not be blank"));
    }

    let ws_path = state
        .pool
        .acquire(
            &state.config.repo_path,
            AcquireOptions {
                purpose: format!("swarm job {todo_id}"),
                rev: Some("@".to_string()),
                new_change_message: Some(format!("staging for todo {todo_id}")),
            },
        )
        .await?;

    let (interrupt_tx, interrupt_rx) = mpsc::channel(1);
    let (done_tx, done_rx) = watch::channel(false);
    let (started_tx, started_rx) = oneshot::channel::<JobId>();
    let (outcome_tx, outcome_rx) = oneshot::channel::<JobOutcome>();

    // Filled by on_start so the completion path knows the job id even if
    // the runner errors later.
    let job_id_slot: Arc<Mutex<Option<(JobId, TodoId)>>> = Arc::new(Mutex::new(None));

    let on_start: Box<dyn FnOnce(JobStartInfo) + Send> = {
        let state = Arc::clone(&state);
        let slot = Arc::clone(&job_id_slot);
        Box::new(move |info: JobStartInfo| {
            *slot.lock() = Some((info.job_id.clone(), info.todo_id.clone()));
            state.registry.insert(
                info.job_id.clone(),
                LiveJob {
                    todo_id: info.todo_id,
                    interrupts: interrupt_tx,
                    done: done_rx,
                },
            );
            let _ = started_tx.send(info.job_id);
        })
    };

    let opts = RunOptions {
        workspace_path: ws_path.clone(),
        events_dir: state.config.events_dir.clone(),
        agent_command: state.config.agent_command.clone(),
        interrupts: interrupt_rx,
        on_start: Some(on_start),
        timeout: None,
        input: None,
    };

    tokio::spawn(run_job(
        Arc::clone(&state),
        ws_path,
        todo_id,
        opts,
        job_id_slot,
        done_tx,
        outcome_tx,
    ));

    // Race the first job id against job completion; request cancellation
    // drops this future without touching the spawned job.
    match started_rx.await {
        Ok(job_id) => Ok(Json(DoResponse {
            job_id: job_id.to_string(),
        })),
        // on_start never fired; wait for the task's verdict
        Err(_) => match outcome_rx.await {
            Ok(JobOutcome::Finished { job_id })
            | Ok(JobOutcome::Failed {
                job_id: Some(job_id),
                ..
            }) => Ok(Json(DoResponse {
                job_id: job_id.to_string(),
            })),
            Ok(JobOutcome::Failed {
                job_id: None,
                message,
            }) => Err(ApiError::internal(message)),
            Err(_) => Err(ApiError::internal("job task ended unexpectedly")),
        },
    }
}

/// Run the job to completion, then clean up: release the workspace, sync
/// outputs on success, drop the registry entry, and wake waiters.
#[allow(clippy::too_many_arguments)]
async fn run_job<V: Vcs>(
    state: Arc<SwarmState<V>>,
    ws_path: PathBuf,
    todo_id: String,
    opts: RunOptions,
    job_id_slot: Arc<Mutex<Option<(JobId, TodoId)>>>,
    done_tx: watch::Sender<bool>,
    outcome_tx: oneshot::Sender<JobOutcome>,
) {
    let runner = state.runner.clone();
    let repo = state.config.repo_path.clone();
    let run_todo_id = todo_id.clone();
    let handle =
        tokio::spawn(async move { runner.run(&repo, &run_todo_id, opts).await });

    let outcome = match handle.await {
        Ok(Ok(result)) => {
            let success = result.job.status == JobStatus::Completed;
            if success {
                match sync_outputs(&ws_path, &state.config.repo_path) {
                    Ok(copied) => info!(job_id = %result.job.id, copied, "workspace outputs synced"),
                    Err(e) => warn!(job_id = %result.job.id, error = %e, "output sync failed"),
                }
            }
            JobOutcome::Finished {
                job_id: result.job.id,
            }
        }
        Ok(Err(e)) => {
            warn!(todo_id = %todo_id, error = %e, "job run failed");
            let job_id = job_id_slot.lock().clone().map(|(id, _)| id);
            JobOutcome::Failed {
                job_id,
                message: e.to_string(),
            }
        }
        Err(join_err) if join_err.is_panic() => {
            error!(todo_id = %todo_id, "job task panicked");
            let known = job_id_slot.lock().clone();
            if let Some((job_id, todo)) = &known {
                recover_panicked_job(&state, job_id, todo).await;
            }
            JobOutcome::Failed {
                job_id: known.map(|(id, _)| id),
                message: "job panicked".to_string(),
            }
        }
        Err(join_err) => {
            error!(todo_id = %todo_id, error = %join_err, "job task aborted");
            JobOutcome::Failed {
                job_id: job_id_slot.lock().clone().map(|(id, _)| id),
                message: join_err.to_string(),
            }
        }
    };

    if let Err(e) = state.pool.release(&ws_path) {
        warn!(path = %ws_path.display(), error = %e, "workspace release failed");
    }

    if let Some((job_id, _)) = job_id_slot.lock().clone() {
        state.registry.remove(&job_id);
    }

    let _ = done_tx.send(true);
    let _ = outcome_tx.send(outcome);
    info!(todo_id = %todo_id, "job task complete");
}

/// Land a panicked job in the failed state: job record, todo, terminal
/// event. Mirrors the runner's own terminal path.
async fn recover_panicked_job<V: Vcs>(state: &Arc<SwarmState<V>>, job_id: &JobId, todo_id: &TodoId) {
    match EventLog::open(&state.config.events_dir, job_id) {
        Ok(mut log) => {
            if let Err(e) = state
                .runner
                .finish(
                    job_id,
                    todo_id,
                    &state.config.repo_path,
                    JobStatus::Failed,
                    None,
                    &mut log,
                )
                .await
            {
                warn!(job_id = %job_id, error = %e, "panicked job cleanup failed");
            }
        }
        Err(e) => warn!(job_id = %job_id, error = %e, "event log open for panicked job failed"),
    }
}

async fn handle_kill<V: Vcs>(
    State(state): State<Arc<SwarmState<V>>>,
    Json(req): Json<KillRequest>,
) -> Result<Json<KillResponse>, ApiError> {
    let job_id = req.job_id.trim();
    if job_id.is_empty() {
        return Err(ApiError::bad_request("job_id must not be blank"));
    }
    if state.registry.interrupt(&JobId::new(job_id)) {
        Ok(Json(KillResponse::default()))
    } else {
        Err(ApiError::not_found(format!("job not found: {job_id}")))
    }
}

async fn handle_logs<V: Vcs>(
    State(state): State<Arc<SwarmState<V>>>,
    Json(req): Json<LogsRequest>,
) -> Result<Json<LogsResponse>, ApiError> {
    let job = state.runner.jobs().find(&req.job_id)?;
    let events = EventLog::snapshot(&state.config.events_dir, &job.id)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(LogsResponse { events }))
}

async fn handle_list<V: Vcs>(
    State(state): State<Arc<SwarmState<V>>>,
    Json(req): Json<ListRequest>,
) -> Result<Json<ListResponse>, ApiError> {
    let status = req
        .filter
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;
    let jobs = state.runner.jobs().list(JobFilter {
        status,
        include_all: req.filter.include_all,
    })?;
    Ok(Json(ListResponse { jobs }))
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
