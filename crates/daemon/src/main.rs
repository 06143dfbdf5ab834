// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! baton coordinator daemon (batond)
//!
//! Owns the request queue and hands the critical section to one client at a
//! time. Reads operator commands from stdin.

use std::path::{Path, PathBuf};
use std::time::Duration;

use baton_core::{CoordinatorConfig, ReleasePolicy};
use baton_daemon::console::{self, ConsoleExit};
use baton_daemon::lifecycle::{self, LifecycleError};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "batond", version, about = "baton mutual-exclusion coordinator")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(long, short)]
    port: Option<u16>,

    /// Bytes per frame
    #[arg(long)]
    frame_width: Option<usize>,

    /// Grant duration, e.g. "1s" or "250ms"
    #[arg(long, value_parser = humantime::parse_duration)]
    hold: Option<Duration>,

    /// What happens after RELEASE: per-cycle or requeue
    #[arg(long)]
    release_policy: Option<ReleasePolicy>,

    /// Consecutive malformed frames before a client is dropped
    #[arg(long)]
    malformed_threshold: Option<u32>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not read operator commands from stdin
    #[arg(long)]
    no_console: bool,
}

impl Args {
    fn into_config(self) -> Result<(CoordinatorConfig, Option<PathBuf>, bool), LifecycleError> {
        let mut config = match &self.config {
            Some(path) => CoordinatorConfig::load(path)?,
            None => CoordinatorConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(width) = self.frame_width {
            config.frame_width = width;
        }
        if let Some(hold) = self.hold {
            config.hold = hold;
        }
        if let Some(policy) = self.release_policy {
            config.release_policy = policy;
        }
        if let Some(threshold) = self.malformed_threshold {
            config.malformed_threshold = threshold;
        }
        config.validate()?;
        Ok((config, self.log_file, !self.no_console))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, log_file, with_console) = Args::parse().into_config()?;

    let _log_guard = setup_logging(log_file.as_deref())?;

    let daemon = match lifecycle::startup(config).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("batond: {}", e);
            error!("Failed to start coordinator: {}", e);
            return Err(e.into());
        }
    };
    println!("Coordinator is listening on {}", daemon.local_addr);

    let running = daemon.spawn();

    if with_console {
        let coordinator = running.coordinator.clone();
        let lines = console::stdin_lines();
        tokio::spawn(async move {
            match console::run_console(&coordinator, lines, tokio::io::stdout()).await {
                Ok(ConsoleExit::InputClosed) => info!("Console input closed, coordinator keeps running"),
                Ok(_) => {}
                Err(e) => error!("Console failed: {}", e),
            }
        });
    }

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = running.stopped() => {
            info!("Shutdown requested from console");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }
    }

    running.shutdown().await;
    info!("Coordinator stopped");
    Ok(())
}

/// Startup marker prefix written to the log file before anything else.
/// Full format: "--- batond: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- batond: starting (pid: ";

fn write_startup_marker(log_path: &Path) -> Result<(), LifecycleError> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

fn setup_logging(
    log_path: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(log_path) = log_path else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    let dir = log_path.parent().ok_or(LifecycleError::NoLogDir)?;
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)?;
    }
    write_startup_marker(log_path)?;

    let file_appender = tracing_appender::rolling::never(
        dir,
        log_path.file_name().ok_or(LifecycleError::NoLogDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(Some(guard))
}
