// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn do_request_uses_snake_case() {
    let req: DoRequest = serde_json::from_str(r#"{"todo_id":"abcd2345"}"#).unwrap();
    assert_eq!(req.todo_id, "abcd2345");
}

#[test]
fn list_request_defaults_to_empty_filter() {
    let req: ListRequest = serde_json::from_str("{}").unwrap();
    assert!(req.filter.status.is_none());
    assert!(!req.filter.include_all);
}

#[test]
fn todo_filter_type_field_is_renamed() {
    let body: TodoFilterBody =
        serde_json::from_str(r#"{"type":"bug","include_tombstones":true}"#).unwrap();
    assert_eq!(body.todo_type.as_deref(), Some("bug"));
    assert!(body.include_tombstones);
}

#[test]
fn todo_options_all_fields_optional() {
    let body: TodoOptionsBody = serde_json::from_str("{}").unwrap();
    assert!(body.status.is_none());
    assert!(body.dependencies.is_empty());
    assert!(body.deleted_at.is_none());
}

#[test]
fn create_request_requires_title() {
    assert!(serde_json::from_str::<TodoCreateRequest>(r#"{"options":{}}"#).is_err());
    let req: TodoCreateRequest = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
    assert_eq!(req.title, "x");
}

#[test]
fn error_body_shape() {
    let body = ErrorBody {
        error: "boom".to_string(),
    };
    assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"error":"boom"}"#);
}

#[test]
fn ready_request_defaults_to_unbounded() {
    let req: ReadyRequest = serde_json::from_str("{}").unwrap();
    assert_eq!(req.limit, 0);
}
