// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator lifecycle management: startup and shutdown.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use baton_core::{ConfigError, CoordinatorConfig};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::Coordinator;
use crate::server;

/// How long shutdown waits for each loop to finish
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error("Could not determine log directory")]
    NoLogDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bound coordinator that has not started serving yet
pub struct Daemon {
    pub coordinator: Coordinator,
    listener: TcpListener,
    pub local_addr: SocketAddr,
}

/// Start the coordinator: validate configuration and bind the listener.
///
/// Bind failure is the only fatal startup error.
pub async fn startup(config: CoordinatorConfig) -> Result<Daemon, LifecycleError> {
    config.validate()?;

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(addr.clone(), e))?;
    let local_addr = listener.local_addr()?;

    info!(
        addr = %local_addr,
        frame_width = config.frame_width,
        hold_ms = config.hold.as_millis() as u64,
        policy = %config.release_policy,
        "Coordinator is listening"
    );

    Ok(Daemon {
        coordinator: Coordinator::new(config),
        listener,
        local_addr,
    })
}

impl Daemon {
    /// Spawn the accept loop and the grant loop
    pub fn spawn(self) -> RunningDaemon {
        let accept = tokio::spawn(server::accept_loop(
            self.coordinator.clone(),
            self.listener,
        ));
        let engine = self.coordinator.clone();
        let grants = tokio::spawn(async move { engine.run_grants().await });

        RunningDaemon {
            coordinator: self.coordinator,
            local_addr: self.local_addr,
            start_time: Instant::now(),
            accept,
            grants,
        }
    }
}

/// A serving coordinator and its background loops
pub struct RunningDaemon {
    pub coordinator: Coordinator,
    pub local_addr: SocketAddr,
    pub start_time: Instant,
    accept: JoinHandle<()>,
    grants: JoinHandle<()>,
}

impl RunningDaemon {
    /// Resolve once shutdown has been requested by anyone
    pub async fn stopped(&self) {
        let mut shutdown = self.coordinator.shutdown_signal();
        while !*shutdown.borrow_and_update() {
            if shutdown.changed().await.is_err() {
                return;
            }
        }
    }

    /// Shut the coordinator down and wait for its loops to finish
    pub async fn shutdown(self) {
        self.coordinator.shutdown();

        for (name, handle) in [("accept", self.accept), ("grant", self.grants)] {
            match tokio::time::timeout(STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("{} loop failed: {}", name, e),
                Err(_) => warn!("{} loop did not stop in time", name),
            }
        }

        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "Coordinator shutdown complete"
        );
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
