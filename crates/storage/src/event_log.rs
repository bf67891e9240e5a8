// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only NDJSON event log, one file per job.
//!
//! At most one writer (the job runner); many readers (tailers). Readers
//! tolerate a partial trailing line from a writer still flushing.

use crate::jsonl::{JsonlError, MAX_JSONL_LINE_BYTES};
use incr_core::{JobEvent, JobId};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from event-log operations.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("event encode failed: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("event exceeds max JSON line size ({MAX_JSONL_LINE_BYTES} bytes)")]
    EventTooLarge,
}

/// Path of a job's event log file.
pub fn event_log_path(events_dir: &Path, id: &JobId) -> PathBuf {
    events_dir.join(format!("{id}.jsonl"))
}

/// Append-mode writer for a job's event log.
pub struct EventLog {
    file: File,
    path: PathBuf,
}

impl EventLog {
    /// Open (creating if needed) the log for `id` under `events_dir`.
    pub fn open(events_dir: &Path, id: &JobId) -> Result<Self, EventLogError> {
        fs::create_dir_all(events_dir)?;
        let path = event_log_path(events_dir, id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single NDJSON line and flush.
    pub fn append(&mut self, event: &JobEvent) -> Result<(), EventLogError> {
        let mut line = serde_json::to_vec(event).map_err(EventLogError::Encode)?;
        if line.len() > MAX_JSONL_LINE_BYTES {
            return Err(EventLogError::EventTooLarge);
        }
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(())
    }

    /// Read the whole log for `id` into a vec.
    ///
    /// A missing file is an empty log. A partial trailing line (writer mid
    /// flush) is skipped rather than treated as corruption.
    pub fn snapshot(events_dir: &Path, id: &JobId) -> Result<Vec<JobEvent>, EventLogError> {
        let path = event_log_path(events_dir, id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(decode_events_lossy(&bytes))
    }
}

/// Decode complete event lines, skipping blanks and an undecodable
/// unterminated tail.
fn decode_events_lossy(bytes: &[u8]) -> Vec<JobEvent> {
    let ends_with_newline = bytes.last() == Some(&b'\n');
    let segments: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    let mut events = Vec::new();
    for (idx, segment) in segments.iter().copied().enumerate() {
        let is_tail = idx == segments.len() - 1 && !ends_with_newline;
        let line = segment.strip_suffix(b"\r").unwrap_or(segment);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice(line) {
            Ok(event) => events.push(event),
            Err(_) if is_tail => {
                // Writer is still flushing this line; the next snapshot
                // will pick it up.
            }
            Err(_) => {
                // Mid-file garbage: skip the line, keep the rest of the log
                // readable.
            }
        }
    }
    events
}

impl From<JsonlError> for EventLogError {
    fn from(e: JsonlError) -> Self {
        match e {
            JsonlError::Io(io) => EventLogError::Io(io),
            JsonlError::LineTooLong { .. } => EventLogError::EventTooLarge,
            JsonlError::Decode { source, .. } | JsonlError::Encode(source) => {
                EventLogError::Encode(source)
            }
        }
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
