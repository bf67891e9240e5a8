// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for Incrementum: the state file, per-job event logs, and
//! the JSONL I/O they share.

mod event_log;
mod jsonl;
mod state;
mod state_file;

pub use event_log::{event_log_path, EventLog, EventLogError};
pub use jsonl::{
    decode_jsonl, encode_jsonl, read_jsonl, write_jsonl, JsonlError, MAX_JSONL_LINE_BYTES,
};
pub use state::StateDoc;
pub use state_file::{StateError, StateFile};
