// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! baton client agent launcher
//!
//! Runs one or more agents against a coordinator, each on its own
//! connection, sharing one audit log.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use baton_agent::{Agent, AuditLog, DEFAULT_AUDIT_FILE};
use baton_core::{AgentConfig, ProcessId, ReleaseMode};
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "baton-agent", version, about = "baton critical-section client")]
struct Args {
    /// Agent identifier (repeatable)
    #[arg(long = "id", conflicts_with = "count")]
    ids: Vec<String>,

    /// Launch agents 1..=N
    #[arg(long, short = 'n')]
    count: Option<u32>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Coordinator host
    #[arg(long)]
    host: Option<String>,

    /// Coordinator port
    #[arg(long, short)]
    port: Option<u16>,

    /// Bytes per frame
    #[arg(long)]
    frame_width: Option<usize>,

    /// Request cycles per agent
    #[arg(long, short)]
    repetitions: Option<u32>,

    /// Idle time between cycles, e.g. "2s"
    #[arg(long, value_parser = humantime::parse_duration)]
    think_time: Option<Duration>,

    /// How the grant is given back: passive or explicit
    #[arg(long)]
    release_mode: Option<ReleaseMode>,

    /// Append critical-section entries to this file
    #[arg(long, default_value = DEFAULT_AUDIT_FILE)]
    audit_file: PathBuf,
}

impl Args {
    fn config(&self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::load(path)?,
            None => AgentConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(width) = self.frame_width {
            config.frame_width = width;
        }
        if let Some(repetitions) = self.repetitions {
            config.repetitions = repetitions;
        }
        if let Some(think_time) = self.think_time {
            config.think_time = think_time;
        }
        if let Some(mode) = self.release_mode {
            config.release_mode = mode;
        }
        Ok(config)
    }

    fn identifiers(&self) -> Result<Vec<ProcessId>> {
        match self.count {
            Some(0) => bail!("--count must be at least 1"),
            Some(n) => Ok((1..=n).map(|i| ProcessId::new(i.to_string())).collect()),
            None if self.ids.is_empty() => bail!("give at least one --id or a --count"),
            None => Ok(self.ids.iter().map(|id| ProcessId::new(id.as_str())).collect()),
        }
    }
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging();

    let config = args.config()?;
    let agents = args
        .identifiers()?
        .into_iter()
        .map(|id| Agent::new(id, config.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    let audit = Arc::new(
        AuditLog::open(&args.audit_file)
            .with_context(|| format!("cannot use audit file {}", args.audit_file.display()))?,
    );

    let mut tasks = JoinSet::new();
    for agent in agents {
        let audit = Arc::clone(&audit);
        tasks.spawn(async move {
            let result = agent.run(audit.as_ref()).await;
            (agent.id().clone(), result)
        });
    }

    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, Ok(cycles))) => info!(id = %id, cycles, "agent completed"),
            Ok((id, Err(e))) => {
                error!(id = %id, error = %e, "agent stopped");
                failed += 1;
            }
            Err(e) => {
                error!(error = %e, "agent task failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} agent(s) did not complete", failed);
    }
    Ok(())
}
