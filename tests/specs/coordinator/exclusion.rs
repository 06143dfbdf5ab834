//! Mutual exclusion specs
//!
//! Verify that no two agents are ever inside the critical section at once.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::prelude::*;

/// Counts overlapping uses of the section
#[derive(Default)]
struct Exclusive {
    inside: AtomicUsize,
    overlaps: AtomicUsize,
    uses: AtomicUsize,
}

#[async_trait]
impl CriticalSection for Exclusive {
    async fn use_section(&self, _id: &ProcessId) -> Result<(), AuditError> {
        if self.inside.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.inside.fetch_sub(1, Ordering::SeqCst);
        self.uses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn at_most_one_agent_uses_the_section() {
    let cluster = Cluster::start(Duration::from_millis(100)).await;
    let section = Arc::new(Exclusive::default());

    let mut tasks = Vec::new();
    for id in ["1", "2", "3", "4"] {
        let agent = cluster.agent(id, 3);
        let section = Arc::clone(&section);
        tasks.push(tokio::spawn(async move { agent.run(section.as_ref()).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(section.uses.load(Ordering::SeqCst), 12);
    assert_eq!(section.overlaps.load(Ordering::SeqCst), 0);
    for id in ["1", "2", "3", "4"] {
        cluster.disconnected(id).await;
    }
    assert_eq!(cluster.grant_counts().values().sum::<u64>(), 12);
}
