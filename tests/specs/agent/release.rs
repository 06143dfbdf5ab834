//! Release specs
//!
//! Verify explicit release and identity handling as seen by agents.

use crate::prelude::*;

#[tokio::test]
async fn explicit_release_ends_the_hold_early() {
    let cluster = Cluster::start(Duration::from_secs(30)).await;
    let audit = cluster.audit_log();
    let config = cluster
        .agent_config(2)
        .with_release_mode(ReleaseMode::Explicit);
    let agent = Agent::new("5", config).unwrap();

    let cycles = tokio::time::timeout(WAIT, agent.run(&audit))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(cycles, 2);
    assert_eq!(cluster.audit_lines().len(), 2);
    cluster.disconnected("5").await;
    assert_eq!(cluster.grant_counts().get("5"), Some(&2));
}

#[tokio::test]
async fn duplicate_identity_is_turned_away() {
    let cluster = Cluster::start(Duration::from_millis(50)).await;
    let mut original = cluster.session("1").await;

    let mut impostor = cluster.agent("1", 1).connect().await.unwrap();
    let rejected = tokio::time::timeout(WAIT, impostor.await_grant())
        .await
        .unwrap();
    assert!(matches!(rejected, Err(AgentError::ConnectionLost)));

    original.request_access().await.unwrap();
    original.await_grant().await.unwrap();
    original.await_release().await.unwrap();
    assert_eq!(cluster.grant_counts().get("1"), Some(&1));
}

#[tokio::test]
async fn identifier_too_long_for_the_frame_is_refused_locally() {
    let cluster = Cluster::start(Duration::from_millis(50)).await;
    let err = Agent::new("1234567", cluster.agent_config(1)).unwrap_err();
    assert!(matches!(err, AgentError::Config(_)));
}
