// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live NDJSON streaming of a job's event log.
//!
//! The stream starts with historical events and follows live appends. On
//! EOF it polls while the job is still running in this process, and closes
//! after a final drain once the job is terminal. Partial trailing lines
//! (writer mid-flush) stay buffered until the newline arrives.

use crate::error::ApiError;
use crate::protocol::TailRequest;
use crate::server::SwarmState;
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::Response;
use axum::Json;
use futures_util::stream;
use incr_core::{JobEvent, JobId};
use incr_storage::{event_log_path, MAX_JSONL_LINE_BYTES};
use incr_vcs::Vcs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::debug;

/// Poll cadence while waiting for the log file to appear.
const CREATE_POLL: Duration = Duration::from_millis(100);

/// Poll cadence at EOF while the job is still running.
const EOF_POLL: Duration = Duration::from_millis(200);

pub async fn handle_tail<V: Vcs>(
    State(state): State<Arc<SwarmState<V>>>,
    Json(req): Json<TailRequest>,
) -> Result<Response, ApiError> {
    let job = state.runner.jobs().find(&req.job_id)?;
    let path = event_log_path(&state.config.events_dir, &job.id);
    debug!(job_id = %job.id, path = %path.display(), "tail stream starting");

    let tail = Tail {
        state,
        job_id: job.id,
        path,
        file: None,
        pending: Vec::new(),
        finishing: false,
        closed: false,
    };

    let body = Body::from_stream(stream::unfold(tail, |mut tail| async move {
        tail.next_line().await.map(|item| (item, tail))
    }));

    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .map_err(|e| ApiError::internal(e.to_string()))
}

struct Tail<V: Vcs> {
    state: Arc<SwarmState<V>>,
    job_id: JobId,
    path: PathBuf,
    file: Option<File>,
    pending: Vec<u8>,
    /// Terminal state observed; one final drain pass remains.
    finishing: bool,
    closed: bool,
}

impl<V: Vcs> Tail<V> {
    /// Produce the next complete event line, or `None` to end the stream.
    async fn next_line(&mut self) -> Option<Result<Vec<u8>, io::Error>> {
        if self.closed {
            return None;
        }
        loop {
            // Emit any complete buffered line first.
            while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                // Decode + re-encode so the client gets exactly one JSON
                // document per line regardless of writer formatting.
                match serde_json::from_slice::<JobEvent>(&line) {
                    Ok(event) => match serde_json::to_vec(&event) {
                        Ok(mut bytes) => {
                            bytes.push(b'\n');
                            return Some(Ok(bytes));
                        }
                        Err(e) => return self.fail(e.to_string()),
                    },
                    // Mid-file garbage: skip the line, keep streaming.
                    Err(_) => continue,
                }
            }

            // An unterminated line larger than the write-side cap can only
            // come from a corrupt or hostile log; stop rather than buffer
            // without bound.
            if self.pending.len() > MAX_JSONL_LINE_BYTES {
                return self.fail("event line exceeds max JSON line size".to_string());
            }

            // Need more bytes.
            let Some(file) = &mut self.file else {
                match File::open(&self.path).await {
                    Ok(mut file) => {
                        if let Err(e) = file.seek(SeekFrom::Start(0)).await {
                            return self.fail(e.to_string());
                        }
                        self.file = Some(file);
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        if !self.still_running() {
                            if self.finishing {
                                self.closed = true;
                                return None;
                            }
                            self.finishing = true;
                        }
                        tokio::time::sleep(CREATE_POLL).await;
                    }
                    Err(e) => return self.fail(e.to_string()),
                }
                continue;
            };

            let mut chunk = [0u8; 8192];
            match file.read(&mut chunk).await {
                Ok(0) => {
                    if self.still_running() {
                        tokio::time::sleep(EOF_POLL).await;
                    } else if self.finishing {
                        // Final drain already happened; anything left in
                        // pending is an unterminated tail.
                        self.closed = true;
                        return None;
                    } else {
                        // The terminal event may land between our read and
                        // the registry check; drain once more.
                        self.finishing = true;
                    }
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) => return self.fail(e.to_string()),
            }
        }
    }

    fn still_running(&self) -> bool {
        self.state.registry.is_running(&self.job_id)
    }

    fn fail(&mut self, message: String) -> Option<Result<Vec<u8>, io::Error>> {
        self.closed = true;
        Some(Err(io::Error::other(message)))
    }
}

#[cfg(test)]
#[path = "tail_tests.rs"]
mod tests;
