//! Agent cycle specs
//!
//! Verify that every completed cycle leaves exactly one audit entry and one
//! grant.

use crate::prelude::*;

#[tokio::test]
async fn single_agent_three_cycles_leaves_three_audit_lines() {
    let cluster = Cluster::start(Duration::from_millis(50)).await;
    let audit = cluster.audit_log();

    let cycles = cluster.agent("1", 3).run(&audit).await.unwrap();

    assert_eq!(cycles, 3);
    let lines = cluster.audit_lines();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l.starts_with("1, ")));

    cluster.disconnected("1").await;
    assert_eq!(cluster.grant_counts().get("1"), Some(&3));
}

#[tokio::test]
async fn concurrent_agents_share_one_audit_log() {
    let cluster = Cluster::start(Duration::from_millis(30)).await;
    let audit = Arc::new(cluster.audit_log());

    let mut tasks = Vec::new();
    for id in ["1", "2", "3"] {
        let agent = cluster.agent(id, 2);
        let audit = Arc::clone(&audit);
        tasks.push(tokio::spawn(async move { agent.run(audit.as_ref()).await }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 2);
    }

    let lines = cluster.audit_lines();
    assert_eq!(lines.len(), 6);
    for id in ["1", "2", "3"] {
        cluster.disconnected(id).await;
        let prefix = format!("{}, ", id);
        assert_eq!(lines.iter().filter(|l| l.starts_with(&prefix)).count(), 2);
        assert_eq!(cluster.grant_counts().get(id), Some(&2));
    }
}

#[tokio::test]
async fn passive_agent_keeps_the_grant_for_the_full_hold() {
    let hold = Duration::from_millis(200);
    let cluster = Cluster::start(hold).await;
    let audit = cluster.audit_log();

    let started = std::time::Instant::now();
    cluster.agent("1", 2).run(&audit).await.unwrap();

    assert!(started.elapsed() >= hold * 2);
}

#[tokio::test]
async fn operator_sees_grant_counts_of_finished_agents() {
    let cluster = Cluster::start(Duration::from_millis(30)).await;
    let audit = cluster.audit_log();

    cluster.agent("1", 3).run(&audit).await.unwrap();
    cluster.disconnected("1").await;

    let report = baton_daemon::console::render_grants(&cluster.daemon.coordinator);
    assert_eq!(report, "Grant counts:\n  1: 3\n");
}
