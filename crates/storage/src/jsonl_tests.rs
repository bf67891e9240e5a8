// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Rec {
    name: String,
    n: u32,
}

fn sample() -> Vec<Rec> {
    vec![
        Rec {
            name: "a".into(),
            n: 1,
        },
        Rec {
            name: "b".into(),
            n: 2,
        },
    ]
}

#[test]
fn write_then_read_roundtrips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recs.jsonl");
    write_jsonl(&path, &sample()).unwrap();
    let back: Vec<Rec> = read_jsonl(&path).unwrap();
    assert_eq!(back, sample());
}

#[test]
fn missing_file_reads_empty() {
    let dir = TempDir::new().unwrap();
    let recs: Vec<Rec> = read_jsonl(&dir.path().join("nope.jsonl")).unwrap();
    assert!(recs.is_empty());
}

#[test]
fn blank_and_cr_terminated_lines_tolerated() {
    let bytes = b"{\"name\":\"a\",\"n\":1}\r\n\n  \n{\"name\":\"b\",\"n\":2}\n";
    let recs: Vec<Rec> = decode_jsonl(bytes).unwrap();
    assert_eq!(recs, sample());
}

#[test]
fn decode_error_names_line_number() {
    let bytes = b"{\"name\":\"a\",\"n\":1}\nnot json\n";
    let err = decode_jsonl::<Rec>(bytes).unwrap_err();
    match err {
        JsonlError::Decode { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn oversized_line_rejected_with_limit_in_message() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"{\"name\":\"");
    bytes.resize(MAX_JSONL_LINE_BYTES + 16, b'x');
    bytes.extend_from_slice(b"\",\"n\":1}\n");
    let err = decode_jsonl::<Rec>(&bytes).unwrap_err();
    assert!(matches!(err, JsonlError::LineTooLong { line: 1 }));
    assert!(err.to_string().contains("exceeds max JSON line size"));
}

#[test]
fn encode_rejects_oversized_record() {
    let rec = Rec {
        name: "y".repeat(MAX_JSONL_LINE_BYTES + 1),
        n: 0,
    };
    let err = encode_jsonl(&[rec]).unwrap_err();
    assert!(matches!(err, JsonlError::LineTooLong { line: 1 }));
}

#[test]
fn write_replaces_existing_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recs.jsonl");
    write_jsonl(&path, &sample()).unwrap();
    write_jsonl(
        &path,
        &[Rec {
            name: "only".into(),
            n: 9,
        }],
    )
    .unwrap();
    let back: Vec<Rec> = read_jsonl(&path).unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].name, "only");
}
