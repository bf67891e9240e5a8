//! Shutdown drain: cooperative jobs finish, stubborn jobs are force-failed.

use crate::prelude::*;
use incr_server::drain_jobs;
use serde_json::json;

#[tokio::test(flavor = "multi_thread")]
async fn drain_finishes_cooperative_and_force_fails_stubborn() {
    let swarm = Swarm::start(BLOCKING_AGENT).await;

    // One server runs an agent that cooperates with SIGINT, the other an
    // agent that ignores it.
    let cooperative_todo = swarm.create_todo("cooperative work").await;
    let cooperative_job = swarm.start_job(&cooperative_todo).await;

    let stubborn = Swarm::start(STUBBORN_AGENT).await;
    let stubborn_todo = stubborn.create_todo("stubborn work").await;
    let stubborn_job = stubborn.start_job(&stubborn_todo).await;

    // Cooperative server: drain ends cleanly, job lands killed
    let errors = drain_jobs(&swarm.state).await;
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    swarm.wait_for_job_end(&cooperative_job).await;
    assert_eq!(swarm.job(&cooperative_job).await["status"], "killed");
    assert_eq!(swarm.todo(&cooperative_todo).await["status"], "open");

    // Stubborn server: the drain deadline expires, the job is forced down
    let errors = drain_jobs(&stubborn.state).await;
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("did not stop"));
    assert_eq!(stubborn.job(&stubborn_job).await["status"], "failed");
    assert_eq!(stubborn.todo(&stubborn_todo).await["status"], "open");

    // Tailers no longer consider the forced job live
    assert!(!stubborn
        .state
        .registry
        .is_running(&incr_core::JobId::new(stubborn_job.as_str())));

    let body = stubborn.post_ok("/list", json!({})).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 0);
}
