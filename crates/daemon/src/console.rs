// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-oriented operator console
//!
//! Commands: `1` prints the request queue, `2` prints grant counts, `3`
//! shuts the coordinator down.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::Coordinator;

const HELP: &str = "Commands: 1 = show queue, 2 = show grant counts, 3 = shut down";
const PROMPT: &str = "Enter command: ";

/// Why the console stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// Operator issued the shutdown command
    Shutdown,
    /// Input closed; the coordinator keeps running
    InputClosed,
    /// The coordinator shut down for another reason
    Stopped,
}

/// Parsed console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ShowQueue,
    ShowGrants,
    Shutdown,
    Help,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "1" => Some(Command::ShowQueue),
            "2" => Some(Command::ShowGrants),
            "3" => Some(Command::Shutdown),
            "help" | "?" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Spawn a thread forwarding stdin lines to the console.
///
/// Stdin reads block, so they live on a plain thread that dies with the
/// process rather than on the runtime.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Serve console commands until shutdown or end of input
pub async fn run_console<W: AsyncWrite + Unpin>(
    coordinator: &Coordinator,
    mut lines: mpsc::Receiver<String>,
    mut output: W,
) -> io::Result<ConsoleExit> {
    let mut shutdown = coordinator.shutdown_signal();
    loop {
        if *shutdown.borrow_and_update() {
            return Ok(ConsoleExit::Stopped);
        }
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let line = tokio::select! {
            line = lines.recv() => line,
            _ = shutdown.changed() => return Ok(ConsoleExit::Stopped),
        };
        let Some(line) = line else {
            debug!("console input closed");
            return Ok(ConsoleExit::InputClosed);
        };

        match Command::parse(&line) {
            Some(Command::ShowQueue) => {
                let text = render_queue(coordinator);
                output.write_all(text.as_bytes()).await?;
            }
            Some(Command::ShowGrants) => {
                let text = render_grants(coordinator);
                output.write_all(text.as_bytes()).await?;
            }
            Some(Command::Shutdown) => {
                output.write_all(b"Shutting down coordinator.\n").await?;
                output.flush().await?;
                coordinator.shutdown();
                return Ok(ConsoleExit::Shutdown);
            }
            Some(Command::Help) => {
                output.write_all(format!("{}\n", HELP).as_bytes()).await?;
            }
            None if line.trim().is_empty() => {}
            None => {
                let text = format!("Unknown command '{}'. {}\n", line.trim(), HELP);
                output.write_all(text.as_bytes()).await?;
            }
        }
    }
}

pub fn render_queue(coordinator: &Coordinator) -> String {
    let ids: Vec<String> = coordinator
        .queue_snapshot()
        .iter()
        .map(|id| id.to_string())
        .collect();
    let holder = match coordinator.holder() {
        Some(id) => format!(" (holding: {})", id),
        None => String::new(),
    };
    format!("Current queue: [{}]{}\n", ids.join(", "), holder)
}

pub fn render_grants(coordinator: &Coordinator) -> String {
    let counts = coordinator.grant_counts();
    if counts.is_empty() {
        return "Grant counts: (none)\n".to_string();
    }
    let mut out = String::from("Grant counts:\n");
    for (id, grants) in counts {
        out.push_str(&format!("  {}: {}\n", id, grants));
    }
    out
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
