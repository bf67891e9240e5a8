// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use incr_core::{Clock, FakeClock, JobStatus};
use std::io::Write as _;
use tempfile::TempDir;

fn sample_events(clock: &FakeClock, n: usize) -> Vec<JobEvent> {
    (0..n)
        .map(|i| JobEvent::agent_output(&format!("line {i}"), clock.now()))
        .collect()
}

#[test]
fn append_then_snapshot_preserves_order() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::new();
    let id = JobId::new("job-1");

    let mut log = EventLog::open(dir.path(), &id).unwrap();
    let events = sample_events(&clock, 5);
    for event in &events {
        log.append(event).unwrap();
    }

    let back = EventLog::snapshot(dir.path(), &id).unwrap();
    assert_eq!(back, events);
}

#[test]
fn snapshot_of_missing_log_is_empty() {
    let dir = TempDir::new().unwrap();
    let events = EventLog::snapshot(dir.path(), &JobId::new("nope")).unwrap();
    assert!(events.is_empty());
}

#[test]
fn reopening_appends_rather_than_truncates() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::new();
    let id = JobId::new("job-1");

    let mut log = EventLog::open(dir.path(), &id).unwrap();
    log.append(&JobEvent::started("t1", clock.now())).unwrap();
    drop(log);

    let mut log = EventLog::open(dir.path(), &id).unwrap();
    log.append(&JobEvent::ended(JobStatus::Completed, Some(0), clock.now()))
        .unwrap();

    let events = EventLog::snapshot(dir.path(), &id).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[1].is_terminal());
}

#[test]
fn partial_trailing_line_is_skipped() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::new();
    let id = JobId::new("job-1");

    let mut log = EventLog::open(dir.path(), &id).unwrap();
    log.append(&JobEvent::started("t1", clock.now())).unwrap();

    // Simulate a writer mid-flush: an unterminated half line at the tail
    let mut file = OpenOptions::new()
        .append(true)
        .open(event_log_path(dir.path(), &id))
        .unwrap();
    file.write_all(b"{\"name\":\"job.en").unwrap();
    file.flush().unwrap();

    let events = EventLog::snapshot(dir.path(), &id).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "job.start");
}

#[test]
fn oversized_event_rejected() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::new();
    let id = JobId::new("job-1");
    let mut log = EventLog::open(dir.path(), &id).unwrap();

    let big = "x".repeat(MAX_JSONL_LINE_BYTES + 1);
    let event = JobEvent::agent_output(&big, clock.now());
    assert!(matches!(
        log.append(&event),
        Err(EventLogError::EventTooLarge)
    ));
}

#[test]
fn path_is_job_id_dot_jsonl() {
    let path = event_log_path(Path::new("/events"), &JobId::new("abc"));
    assert_eq!(path, PathBuf::from("/events/abc.jsonl"));
}
