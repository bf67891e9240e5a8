//! Killing an active job.

use crate::prelude::*;
use serde_json::json;

#[tokio::test]
async fn kill_interrupts_and_reverts_todo() {
    let swarm = Swarm::start(BLOCKING_AGENT).await;
    let todo_id = swarm.create_todo("long running work").await;
    let job_id = swarm.start_job(&todo_id).await;

    // While running, the todo is in progress and the job is listed active
    let todo = swarm.todo(&todo_id).await;
    assert_eq!(todo["status"], "in_progress");
    let body = swarm.post_ok("/list", json!({})).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);

    swarm.post_ok("/kill", json!({ "job_id": job_id })).await;
    swarm.wait_for_job_end(&job_id).await;

    // The agent trapped SIGINT and exited 130
    let job = swarm.job(&job_id).await;
    assert_eq!(job["status"], "killed");

    let body = swarm.post_ok("/logs", json!({ "job_id": job_id })).await;
    let end = body["events"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(end["data"]["status"], "killed");
    assert_eq!(end["data"]["exitCode"], 130);

    // The todo reverts to open for the next attempt
    assert_eq!(swarm.todo(&todo_id).await["status"], "open");
}

#[tokio::test]
async fn kill_after_completion_is_404() {
    let swarm = Swarm::start(OK_AGENT).await;
    let todo_id = swarm.create_todo("quick work").await;
    let job_id = swarm.start_job(&todo_id).await;
    swarm.wait_for_job_end(&job_id).await;

    let response = swarm.post("/kill", json!({ "job_id": job_id })).await;
    assert_eq!(response.status(), 404);
}
