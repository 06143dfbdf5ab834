// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator and agent configuration
//!
//! Both configs deserialize from TOML with every field optional, e.g.
//!
//! ```toml
//! port = 5000
//! frame_width = 10
//! hold = "1s"
//! release_policy = "requeue"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{self, FrameError, DEFAULT_FRAME_WIDTH};
use crate::id::ProcessId;
use crate::protocol::DEFAULT_TIMEOUT;
use crate::queue::ReleasePolicy;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid frame width: {0}")]
    Width(FrameError),

    #[error("invalid process identifier '{id}': {source}")]
    Identifier {
        id: ProcessId,
        #[source]
        source: FrameError,
    },

    #[error("{0} must be nonzero")]
    Zero(&'static str),
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

fn check_width(width: usize) -> Result<(), ConfigError> {
    if width < frame::MIN_FRAME_WIDTH {
        return Err(ConfigError::Width(FrameError::WidthTooSmall {
            width,
            min: frame::MIN_FRAME_WIDTH,
        }));
    }
    Ok(())
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub host: String,
    pub port: u16,
    /// Bytes per frame
    pub frame_width: usize,
    /// How long a grant lasts unless the client releases early
    #[serde(with = "humantime_serde")]
    pub hold: Duration,
    /// Deadline for a new connection's identity frame
    #[serde(with = "humantime_serde")]
    pub identity_timeout: Duration,
    /// Deadline for delivering GRANT or RELEASE
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    /// Consecutive malformed frames tolerated before teardown
    pub malformed_threshold: u32,
    pub release_policy: ReleasePolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            frame_width: DEFAULT_FRAME_WIDTH,
            hold: Duration::from_secs(1),
            identity_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            malformed_threshold: 3,
            release_policy: ReleasePolicy::PerCycle,
        }
    }
}

impl CoordinatorConfig {
    /// Load from a TOML file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_width(self.frame_width)?;
        if self.malformed_threshold == 0 {
            return Err(ConfigError::Zero("malformed_threshold"));
        }
        if self.identity_timeout.is_zero() {
            return Err(ConfigError::Zero("identity_timeout"));
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::Zero("write_timeout"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_frame_width(mut self, width: usize) -> Self {
        self.frame_width = width;
        self
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }

    pub fn with_malformed_threshold(mut self, threshold: u32) -> Self {
        self.malformed_threshold = threshold;
        self
    }

    pub fn with_identity_timeout(mut self, timeout: Duration) -> Self {
        self.identity_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// How an agent gives the critical section back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseMode {
    /// Wait for the coordinator to end the hold and push RELEASE
    #[default]
    Passive,
    /// Send RELEASE as soon as the work is done, then wait for the echo
    Explicit,
}

impl std::str::FromStr for ReleaseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passive" => Ok(ReleaseMode::Passive),
            "explicit" => Ok(ReleaseMode::Explicit),
            other => Err(format!(
                "unknown release mode '{}' (expected passive or explicit)",
                other
            )),
        }
    }
}

/// Client agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Coordinator host
    pub host: String,
    /// Coordinator port
    pub port: u16,
    pub frame_width: usize,
    /// Request cycles before disconnecting
    pub repetitions: u32,
    /// Idle time after each cycle
    #[serde(with = "humantime_serde")]
    pub think_time: Duration,
    pub release_mode: ReleaseMode,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            frame_width: DEFAULT_FRAME_WIDTH,
            repetitions: 5,
            think_time: Duration::from_secs(2),
            release_mode: ReleaseMode::Passive,
        }
    }
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_toml(path)?;
        check_width(config.frame_width)?;
        Ok(config)
    }

    pub fn coordinator_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check that `id` can be carried in this config's frames
    pub fn validate_identifier(&self, id: &ProcessId) -> Result<(), ConfigError> {
        frame::validate_identifier(id.as_str(), self.frame_width).map_err(|source| {
            ConfigError::Identifier {
                id: id.clone(),
                source,
            }
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_frame_width(mut self, width: usize) -> Self {
        self.frame_width = width;
        self
    }

    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.repetitions = repetitions;
        self
    }

    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }

    pub fn with_release_mode(mut self, mode: ReleaseMode) -> Self {
        self.release_mode = mode;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
