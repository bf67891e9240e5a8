// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-delimited JSON I/O shared by the todo store and event log.
//!
//! Reads tolerate blank and CR-terminated lines; decode errors carry the
//! 1-based line number. Writes go to a temp file and rename over the target
//! so readers never see a partial file.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Maximum bytes in a single JSONL line (1 MiB).
///
/// Caps buffering for readers; a record this large is a bug upstream.
pub const MAX_JSONL_LINE_BYTES: usize = 1024 * 1024;

/// Errors from JSONL encoding/decoding.
#[derive(Debug, Error)]
pub enum JsonlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("line {line} exceeds max JSON line size ({MAX_JSONL_LINE_BYTES} bytes)")]
    LineTooLong { line: usize },
    #[error("line {line}: {source}")]
    Decode {
        line: usize,
        source: serde_json::Error,
    },
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Decode a whole JSONL byte buffer into records.
pub fn decode_jsonl<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, JsonlError> {
    let mut records = Vec::new();
    for (idx, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = trim_line(raw_line);
        if line.is_empty() {
            continue;
        }
        if line.len() > MAX_JSONL_LINE_BYTES {
            return Err(JsonlError::LineTooLong { line: line_no });
        }
        let record = serde_json::from_slice(line).map_err(|source| JsonlError::Decode {
            line: line_no,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Encode records as JSONL bytes, enforcing the per-line cap.
pub fn encode_jsonl<T: Serialize>(records: &[T]) -> Result<Vec<u8>, JsonlError> {
    let mut out = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let line = serde_json::to_vec(record).map_err(JsonlError::Encode)?;
        if line.len() > MAX_JSONL_LINE_BYTES {
            return Err(JsonlError::LineTooLong { line: idx + 1 });
        }
        out.extend_from_slice(&line);
        out.push(b'\n');
    }
    Ok(out)
}

/// Read records from a JSONL file. A missing file is an empty list.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, JsonlError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    decode_jsonl(&bytes)
}

/// Write records to a JSONL file atomically (temp file + rename).
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<(), JsonlError> {
    let bytes = encode_jsonl(records)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Strip a trailing CR (Windows line ending) and surrounding whitespace.
fn trim_line(line: &[u8]) -> &[u8] {
    let mut line = line;
    while let Some((first, rest)) = line.split_first() {
        if first.is_ascii_whitespace() {
            line = rest;
        } else {
            break;
        }
    }
    while let Some((last, rest)) = line.split_last() {
        if last.is_ascii_whitespace() {
            line = rest;
        } else {
            break;
        }
    }
    line
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
