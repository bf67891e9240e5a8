//! Ready ordering and dependency unblocking over the HTTP surface.

use crate::prelude::*;
use serde_json::json;

#[tokio::test]
async fn ready_orders_by_priority_and_unblocks_on_close() {
    let swarm = Swarm::start(OK_AGENT).await;

    let low = swarm
        .create_todo_with("low", json!({ "priority": 3 }))
        .await;
    let high = swarm
        .create_todo_with("high", json!({ "priority": 1 }))
        .await;
    let critical = swarm
        .create_todo_with("critical", json!({ "priority": 0 }))
        .await;

    let body = swarm.post_ok("/todos/ready", json!({ "limit": 10 })).await;
    let order: Vec<&str> = body["todos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec![critical.as_str(), high.as_str(), low.as_str()]);

    // A todo depending on critical stays out of ready while it is open
    let created = swarm
        .post_ok(
            "/todos/create",
            json!({ "title": "dep holder", "options": { "dependencies": [critical.as_str()] } }),
        )
        .await;
    let dep_holder = created["todo"]["id"].as_str().unwrap().to_string();

    let body = swarm.post_ok("/todos/ready", json!({ "limit": 10 })).await;
    let titles: Vec<&str> = body["todos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert!(!titles.contains(&"dep holder"));

    // Closing the blocker unblocks the dependent
    swarm
        .post_ok(
            "/todos/update",
            json!({ "ids": [critical.as_str()], "options": { "status": "closed" } }),
        )
        .await;
    let body = swarm.post_ok("/todos/ready", json!({ "limit": 10 })).await;
    let ids: Vec<&str> = body["todos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&dep_holder.as_str()));
    assert!(!ids.contains(&critical.as_str()));
    // Ordering still holds: high (p1) before low (p3)
    let high_pos = ids.iter().position(|id| *id == high.as_str()).unwrap();
    let low_pos = ids.iter().position(|id| *id == low.as_str()).unwrap();
    assert!(high_pos < low_pos);
}

#[tokio::test]
async fn ready_limit_caps_results() {
    let swarm = Swarm::start(OK_AGENT).await;
    for i in 0..5 {
        swarm.create_todo(&format!("todo {i}")).await;
    }
    let body = swarm.post_ok("/todos/ready", json!({ "limit": 2 })).await;
    assert_eq!(body["todos"].as_array().unwrap().len(), 2);
}
