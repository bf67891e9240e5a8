//! Tail streaming: historical + live events, clean termination.

use crate::prelude::*;
use serde_json::json;

async fn tail_lines(swarm: &Swarm, job_id: &str) -> Vec<serde_json::Value> {
    let response = swarm.post("/tail", json!({ "job_id": job_id })).await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/x-ndjson"
    );
    let text = response.text().await.unwrap();
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn tail_live_job_receives_events_then_closes() {
    // The agent emits an early event, waits, then a late one — the tailer
    // connects in between and must see both plus the terminal event.
    let script = r#"printf '{"name":"agent.early","data":{}}\n'; sleep 0.6; printf '{"name":"agent.late","data":{}}\n'"#;
    let swarm = Swarm::start(script).await;
    let todo_id = swarm.create_todo("streamed work").await;
    let job_id = swarm.start_job(&todo_id).await;

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let events = tail_lines(&swarm, &job_id).await;

    let names: Vec<&str> = events
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"agent.early"));
    assert!(names.contains(&"agent.late"));
    assert_eq!(*names.last().unwrap(), "job.end");

    // In-order: early before late before end
    let early = names.iter().position(|n| *n == "agent.early").unwrap();
    let late = names.iter().position(|n| *n == "agent.late").unwrap();
    assert!(early < late);
}

#[tokio::test]
async fn tail_terminal_job_replays_and_closes_immediately() {
    let swarm = Swarm::start(OK_AGENT).await;
    let todo_id = swarm.create_todo("already done").await;
    let job_id = swarm.start_job(&todo_id).await;
    swarm.wait_for_job_end(&job_id).await;

    let events = tail_lines(&swarm, &job_id).await;
    assert_eq!(events.first().unwrap()["name"], "job.start");
    assert_eq!(events.last().unwrap()["name"], "job.end");
}

#[tokio::test]
async fn tail_accepts_todo_id_prefix() {
    let swarm = Swarm::start(OK_AGENT).await;
    let todo_id = swarm.create_todo("prefix lookup").await;
    let job_id = swarm.start_job(&todo_id).await;
    swarm.wait_for_job_end(&job_id).await;

    let events = tail_lines(&swarm, &todo_id[..4]).await;
    assert!(!events.is_empty());
}
