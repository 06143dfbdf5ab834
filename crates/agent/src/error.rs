// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent error types

use std::path::PathBuf;

use baton_core::{ConfigError, ProtocolError};
use thiserror::Error;

/// Errors that stop an agent
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to coordinator at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection to coordinator lost")]
    ConnectionLost,

    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),

    #[error("Critical section failed: {0}")]
    Section(#[from] AuditError),
}

impl From<ProtocolError> for AgentError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::ConnectionLost => AgentError::ConnectionLost,
            other => AgentError::Protocol(other),
        }
    }
}

/// Audit log errors
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to open audit log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write audit log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
