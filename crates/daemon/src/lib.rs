// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! baton coordinator daemon
//!
//! Arbitrates one critical section among TCP clients: accepts connections,
//! queues requests in arrival order and hands out one grant at a time.

pub mod console;
pub mod engine;
pub mod lifecycle;
pub mod server;

#[cfg(test)]
mod test_support;

pub use console::{run_console, ConsoleExit};
pub use engine::{Coordinator, FrameOutcome, HoldEnd};
pub use lifecycle::{startup, Daemon, LifecycleError, RunningDaemon};
pub use server::ServerError;
