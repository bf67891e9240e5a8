// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job runner: spawn the agent subprocess in a workspace, drain its
//! event stream into the job log, and land todo + job in terminal states.
//!
//! The workspace is allocated by the caller (the swarm server in
//! production). The agent command is opaque: exit 0 means completed, an
//! interrupt-triggered exit means killed, anything else means failed.

use crate::jobs::{JobError, JobManager, JobUpdate};
use incr_core::{Clock, JobEvent, JobId, JobRecord, JobStage, JobStatus, SystemClock, TodoId};
use incr_pool::{PoolError, WorkspacePool};
use incr_storage::{EventLog, EventLogError};
use incr_todo::{OpenOptions, StoreError, TodoStore};
use incr_vcs::Vcs;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Errors from running a job.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no agent command configured")]
    NoAgentCommand,
    #[error("agent spawn failed: {0}")]
    Spawn(#[source] std::io::Error),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    EventLog(#[from] EventLogError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Information handed to the `on_start` callback once the job id exists.
#[derive(Debug, Clone)]
pub struct JobStartInfo {
    pub job_id: JobId,
    pub todo_id: TodoId,
}

/// Options for a single run.
pub struct RunOptions {
    /// Workspace allocated by the caller; the agent's working directory.
    pub workspace_path: PathBuf,
    /// Directory holding per-job event logs.
    pub events_dir: PathBuf,
    /// Agent argv. The runner treats it as an opaque subprocess emitting
    /// JSON events on stdout.
    pub agent_command: Vec<String>,
    /// Interrupt signals from the caller; each one is forwarded to the
    /// child as SIGINT.
    pub interrupts: mpsc::Receiver<()>,
    /// Invoked exactly once as soon as the job id is known.
    pub on_start: Option<Box<dyn FnOnce(JobStartInfo) + Send>>,
    /// Wall-clock limit for the subprocess; exceeding it fails the job.
    pub timeout: Option<Duration>,
    /// Text forwarded to the agent's stdin at startup.
    pub input: Option<String>,
}

/// Outcome of a run. Populated even when the job failed so callers can
/// observe the exit code.
#[derive(Debug)]
pub struct RunResult {
    pub job: JobRecord,
    pub exit_code: Option<i32>,
}

/// Runs jobs against a repository.
#[derive(Clone)]
pub struct JobRunner<V: Vcs, C: Clock = SystemClock> {
    pool: WorkspacePool<V, C>,
    jobs: JobManager<C>,
    clock: C,
}

impl<V: Vcs, C: Clock + 'static> JobRunner<V, C> {
    pub fn new(pool: WorkspacePool<V, C>, jobs: JobManager<C>, clock: C) -> Self {
        Self { pool, jobs, clock }
    }

    pub fn jobs(&self) -> &JobManager<C> {
        &self.jobs
    }

    /// Run the todo's agent job to completion.
    pub async fn run(
        &self,
        repo_path: &Path,
        todo_id: &str,
        mut opts: RunOptions,
    ) -> Result<RunResult, RunnerError> {
        if opts.agent_command.is_empty() {
            return Err(RunnerError::NoAgentCommand);
        }

        // Transition the todo to in_progress before anything else; the
        // store workspace is held only for the duration of the write.
        let todo = {
            let store = self.open_store(repo_path).await?;
            let result = store.start(&[todo_id.to_string()]).await;
            store.release()?;
            result?.remove(0)
        };

        let job = self.jobs.create(repo_path, &todo.id)?;
        let workspace_name = self
            .pool
            .workspace_name_for_path(&opts.workspace_path)
            .unwrap_or_default();
        let job = self.jobs.update(
            &job.id,
            JobUpdate {
                workspace_name: Some(workspace_name),
                ..JobUpdate::default()
            },
        )?;

        if let Some(on_start) = opts.on_start.take() {
            on_start(JobStartInfo {
                job_id: job.id.clone(),
                todo_id: todo.id.clone(),
            });
        }

        let mut log = EventLog::open(&opts.events_dir, &job.id)?;
        log.append(&JobEvent::started(todo.id.as_str(), self.clock.now()))?;

        info!(job_id = %job.id, todo_id = %todo.id, "job starting");

        let outcome = self.drive_agent(&job, &mut log, &mut opts).await;

        let (status, exit_code) = match &outcome {
            Ok(AgentOutcome {
                interrupted: true,
                exit_code,
            }) => (JobStatus::Killed, *exit_code),
            Ok(AgentOutcome {
                exit_code: Some(0), ..
            }) => (JobStatus::Completed, Some(0)),
            Ok(AgentOutcome { exit_code, .. }) => (JobStatus::Failed, *exit_code),
            Err(_) => (JobStatus::Failed, None),
        };

        let job = self
            .finish(&job.id, &todo.id, repo_path, status, exit_code, &mut log)
            .await?;

        match outcome {
            Ok(_) => Ok(RunResult { job, exit_code }),
            Err(e) => Err(e),
        }
    }

    /// Terminal bookkeeping: job record, todo status, terminal event.
    /// Used by the runner itself and by the server's panic/shutdown paths.
    pub async fn finish(
        &self,
        job_id: &JobId,
        todo_id: &TodoId,
        repo_path: &Path,
        status: JobStatus,
        exit_code: Option<i32>,
        log: &mut EventLog,
    ) -> Result<JobRecord, RunnerError> {
        let job = self.jobs.update(
            job_id,
            JobUpdate {
                status: Some(status),
                ..JobUpdate::default()
            },
        )?;

        // Reopen or finish the todo. Best-effort: a todo store failure must
        // not mask the job result.
        if let Err(e) = self.settle_todo(repo_path, todo_id, status).await {
            warn!(todo_id = %todo_id, error = %e, "todo settle failed");
        }

        if let Err(e) = log.append(&JobEvent::ended(status, exit_code, self.clock.now())) {
            warn!(job_id = %job_id, error = %e, "terminal event append failed");
        }
        info!(job_id = %job_id, status = %status, exit_code, "job finished");
        Ok(job)
    }

    async fn settle_todo(
        &self,
        repo_path: &Path,
        todo_id: &TodoId,
        status: JobStatus,
    ) -> Result<(), StoreError> {
        let store = self.open_store_raw(repo_path).await?;
        let ids = [todo_id.to_string()];
        let result = match status {
            JobStatus::Completed => store.finish(&ids).await,
            _ => store.reopen(&ids).await,
        };
        store.release()?;
        result.map(|_| ())
    }

    async fn open_store_raw(&self, repo_path: &Path) -> Result<TodoStore<V, C>, StoreError> {
        TodoStore::open_read_write_with_clock(
            repo_path,
            self.pool.clone(),
            OpenOptions::default(),
            self.clock.clone(),
        )
        .await
    }

    async fn open_store(&self, repo_path: &Path) -> Result<TodoStore<V, C>, RunnerError> {
        Ok(self.open_store_raw(repo_path).await?)
    }

    async fn drive_agent(
        &self,
        job: &JobRecord,
        log: &mut EventLog,
        opts: &mut RunOptions,
    ) -> Result<AgentOutcome, RunnerError> {
        let job_id = job.id.clone();
        self.jobs.update(
            &job_id,
            JobUpdate {
                stage: Some(JobStage::Implementing),
                ..JobUpdate::default()
            },
        )?;
        log.append(&JobEvent::stage(JobStage::Implementing, self.clock.now()))?;

        let mut cmd = Command::new(&opts.agent_command[0]);
        cmd.args(&opts.agent_command[1..])
            .current_dir(&opts.workspace_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(RunnerError::Spawn)?;
        let pid = child.id();

        if let Some(input) = opts.input.take() {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(input.as_bytes()).await;
                // Dropping stdin closes the pipe.
            }
        } else {
            drop(child.stdin.take());
        }

        let (event_tx, mut event_rx) = mpsc::channel::<JobEvent>(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(drain_stdout(stdout, event_tx.clone(), self.clock.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr, event_tx.clone(), self.clock.clone()));
        }
        drop(event_tx);

        let deadline = opts.timeout.map(|t| tokio::time::Instant::now() + t);
        let mut interrupted = false;
        let mut timed_out = false;

        loop {
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(event) => log.append(&event)?,
                        // Both output streams closed: the agent has exited.
                        None => break,
                    }
                }
                Some(()) = opts.interrupts.recv() => {
                    interrupted = true;
                    debug!(job_id = %job_id, "interrupt received, signalling agent");
                    send_interrupt(pid);
                }
                () = sleep_until_deadline(deadline), if deadline.is_some() && !timed_out => {
                    timed_out = true;
                    warn!(job_id = %job_id, "job timed out, killing agent");
                    let _ = child.start_kill();
                }
            }
        }

        let status = child.wait().await?;
        let exit_code = status.code();

        if timed_out && !interrupted {
            // A timeout kill is a failure, not a kill request.
            return Ok(AgentOutcome {
                interrupted: false,
                exit_code: exit_code.or(Some(-1)),
            });
        }

        Ok(AgentOutcome {
            interrupted,
            exit_code,
        })
    }
}

struct AgentOutcome {
    interrupted: bool,
    exit_code: Option<i32>,
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Forward SIGINT to the agent process.
fn send_interrupt(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        warn!(pid, error = %e, "interrupt delivery failed");
    }
}

/// Parse agent stdout lines into events.
///
/// A JSON object with a `name` field is taken as a structured event; any
/// other line is wrapped as raw agent output.
async fn drain_stdout(
    stdout: tokio::process::ChildStdout,
    tx: mpsc::Sender<JobEvent>,
    clock: impl Clock,
) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let event = parse_agent_line(&line, &clock);
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

async fn drain_stderr(
    stderr: tokio::process::ChildStderr,
    tx: mpsc::Sender<JobEvent>,
    clock: impl Clock,
) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let event = JobEvent::new(
            "agent.stderr",
            serde_json::json!({ "line": line }),
            clock.now(),
        );
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

fn parse_agent_line(line: &str, clock: &impl Clock) -> JobEvent {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(mut obj)) if obj.contains_key("name") => {
            let name = obj
                .remove("name")
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_else(|| "agent.event".to_string());
            let data = obj.remove("data").unwrap_or(Value::Null);
            JobEvent::new(name, data, clock.now())
        }
        _ => JobEvent::agent_output(line, clock.now()),
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
