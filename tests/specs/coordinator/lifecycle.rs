//! Coordinator lifecycle specs
//!
//! Verify shutdown behavior seen from the client side.

use crate::prelude::*;

#[tokio::test]
async fn shutdown_keeps_the_audit_log() {
    let cluster = Cluster::start(Duration::from_millis(30)).await;
    let audit = cluster.audit_log();
    cluster.agent("1", 2).run(&audit).await.unwrap();
    let path = cluster.audit_path();

    let dir = cluster.stop().await;

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
    drop(dir);
}

#[tokio::test]
async fn shutdown_disconnects_holder_and_waiters() {
    let cluster = Cluster::start(Duration::from_secs(30)).await;
    let mut holder = cluster.session("1").await;
    let mut waiter = cluster.session("2").await;

    holder.request_access().await.unwrap();
    holder.await_grant().await.unwrap();
    waiter.request_access().await.unwrap();
    cluster.queue_is(&["2"]).await;

    cluster.daemon.coordinator.shutdown();

    let held = tokio::time::timeout(WAIT, holder.await_release()).await.unwrap();
    assert!(matches!(held, Err(AgentError::ConnectionLost)));
    let waited = tokio::time::timeout(WAIT, waiter.await_grant()).await.unwrap();
    assert!(matches!(waited, Err(AgentError::ConnectionLost)));
}

#[tokio::test]
async fn agent_cannot_reach_a_stopped_coordinator() {
    let cluster = Cluster::start(Duration::from_millis(30)).await;
    let agent = cluster.agent("1", 1);
    let _dir = cluster.stop().await;

    let result = tokio::time::timeout(WAIT, agent.run(&NoopSection)).await.unwrap();
    assert!(result.is_err());
}

struct NoopSection;

#[async_trait::async_trait]
impl CriticalSection for NoopSection {
    async fn use_section(&self, _id: &ProcessId) -> Result<(), AuditError> {
        Ok(())
    }
}
