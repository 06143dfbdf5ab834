//! Shared fixtures for specs

use std::collections::BTreeMap;
use std::path::PathBuf;
pub use std::sync::{Arc, Mutex};
pub use std::time::Duration;

pub use baton_agent::{Agent, AgentError, AgentSession, AuditError, AuditLog, CriticalSection};
pub use baton_core::{AgentConfig, CoordinatorConfig, ProcessId, ReleaseMode};
use baton_daemon::RunningDaemon;
use tempfile::TempDir;

pub const WAIT: Duration = Duration::from_secs(5);

/// A running coordinator plus a scratch directory for audit logs
pub struct Cluster {
    pub daemon: RunningDaemon,
    dir: TempDir,
}

impl Cluster {
    /// Start a coordinator on an ephemeral port with the given hold time
    pub async fn start(hold: Duration) -> Self {
        Self::start_with(CoordinatorConfig::default().with_hold(hold)).await
    }

    pub async fn start_with(config: CoordinatorConfig) -> Self {
        let daemon = baton_daemon::startup(config.with_port(0))
            .await
            .unwrap()
            .spawn();
        Self {
            daemon,
            dir: TempDir::new().unwrap(),
        }
    }

    /// Agent config pointing at this coordinator, no think time
    pub fn agent_config(&self, repetitions: u32) -> AgentConfig {
        AgentConfig::default()
            .with_port(self.daemon.local_addr.port())
            .with_frame_width(self.daemon.coordinator.config().frame_width)
            .with_repetitions(repetitions)
            .with_think_time(Duration::ZERO)
    }

    /// Shut the coordinator down, keeping the scratch directory
    pub async fn stop(self) -> TempDir {
        self.daemon.shutdown().await;
        self.dir
    }

    pub fn agent(&self, id: &str, repetitions: u32) -> Agent {
        Agent::new(id, self.agent_config(repetitions)).unwrap()
    }

    /// Connect an agent without running its cycle loop
    pub async fn session(&self, id: &str) -> AgentSession {
        let session = self.agent(id, 1).connect().await.unwrap();
        self.registered(id).await;
        session
    }

    pub fn audit_path(&self) -> PathBuf {
        self.dir.path().join("resultado.txt")
    }

    pub fn audit_log(&self) -> AuditLog {
        AuditLog::open(&self.audit_path()).unwrap()
    }

    pub fn audit_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.audit_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn grant_counts(&self) -> BTreeMap<String, u64> {
        self.daemon
            .coordinator
            .grant_counts()
            .into_iter()
            .map(|(id, n)| (id.to_string(), n))
            .collect()
    }

    pub fn queue(&self) -> Vec<String> {
        self.daemon
            .coordinator
            .queue_snapshot()
            .iter()
            .map(|id| id.to_string())
            .collect()
    }

    pub fn holder(&self) -> Option<String> {
        self.daemon.coordinator.holder().map(|id| id.to_string())
    }

    pub fn connected(&self, id: &str) -> bool {
        self.daemon
            .coordinator
            .sessions()
            .iter()
            .any(|s| s.id == id)
    }

    pub async fn registered(&self, id: &str) {
        wait_for(|| self.connected(id)).await;
    }

    /// Wait until the coordinator has dropped `id`'s session
    pub async fn disconnected(&self, id: &str) {
        wait_for(|| !self.connected(id)).await;
    }

    pub async fn queue_is(&self, expected: &[&str]) {
        wait_for(|| self.queue() == expected).await;
    }

    pub async fn holder_is(&self, expected: Option<&str>) {
        wait_for(|| self.holder().as_deref() == expected).await;
    }
}

/// Poll `check` until it holds, failing the test after [`WAIT`]
pub async fn wait_for(check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within {:?}", WAIT);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
