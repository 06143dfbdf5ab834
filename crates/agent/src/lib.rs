// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! baton client agent
//!
//! Connects to a coordinator, waits its turn, uses the critical section and
//! gives it back, a fixed number of times.

pub mod agent;
pub mod audit;
pub mod error;

pub use agent::{Agent, AgentSession};
pub use audit::{AuditLog, CriticalSection, DEFAULT_AUDIT_FILE};
pub use error::{AgentError, AuditError};
