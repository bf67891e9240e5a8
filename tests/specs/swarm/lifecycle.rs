//! Create → start → complete, observed end to end over HTTP.

use crate::prelude::*;
use serde_json::json;

#[tokio::test]
async fn create_start_complete() {
    let swarm = Swarm::start(OK_AGENT).await;

    // Create a todo through the HTTP surface
    let todo_id = swarm.create_todo("Fix login bug").await;

    // Run it
    let job_id = swarm.start_job(&todo_id).await;
    swarm.wait_for_job_end(&job_id).await;

    // The log carries the stage event and a terminal event
    let body = swarm.post_ok("/logs", json!({ "job_id": job_id })).await;
    let events = body["events"].as_array().unwrap();
    assert!(events
        .iter()
        .any(|e| e["name"] == "job.stage" && e["data"]["stage"] == "implementing"));
    assert_eq!(events.last().unwrap()["name"], "job.end");
    assert_eq!(events.last().unwrap()["data"]["status"], "completed");

    // Active list is empty once the job completed
    let body = swarm.post_ok("/list", json!({})).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 0);

    let job = swarm.job(&job_id).await;
    assert_eq!(job["status"], "completed");
    assert!(job.get("completedAt").is_some());

    // The todo landed in done with a completion timestamp
    let todo = swarm.todo(&todo_id).await;
    assert_eq!(todo["status"], "done");
    assert!(todo.get("completedAt").is_some());
}

#[tokio::test]
async fn do_rejects_blank_and_unknown_ids() {
    let swarm = Swarm::start(OK_AGENT).await;

    let response = swarm.post("/do", json!({ "todo_id": "" })).await;
    assert_eq!(response.status(), 400);

    let response = swarm.post("/do", json!({ "todo_id": "zzzz9999" })).await;
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn failed_agent_reopens_the_todo() {
    let swarm = Swarm::start("exit 7").await;
    let todo_id = swarm.create_todo("doomed work").await;
    let job_id = swarm.start_job(&todo_id).await;
    swarm.wait_for_job_end(&job_id).await;

    assert_eq!(swarm.job(&job_id).await["status"], "failed");
    assert_eq!(swarm.todo(&todo_id).await["status"], "open");

    let body = swarm.post_ok("/logs", json!({ "job_id": job_id })).await;
    let end = body["events"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(end["data"]["status"], "failed");
    assert_eq!(end["data"]["exitCode"], 7);
}
