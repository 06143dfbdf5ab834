// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! baton-core: shared building blocks for the baton coordinator and agents
//!
//! This crate provides:
//! - The fixed-width frame codec and its async stream helpers
//! - The session registry and FIFO request queue the coordinator owns
//! - Coordinator and agent configuration

pub mod config;
pub mod frame;
pub mod id;
pub mod protocol;
pub mod queue;
pub mod registry;

pub use config::{AgentConfig, ConfigError, CoordinatorConfig, ReleaseMode};
pub use frame::{Frame, FrameError, FrameKind, DEFAULT_FRAME_WIDTH};
pub use id::ProcessId;
pub use protocol::ProtocolError;
pub use queue::{ReleasePolicy, RequestQueue};
pub use registry::{Connection, Session, SessionRegistry, SessionState, SessionSummary};
