// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Critical-section hook and the append-only audit log
//!
//! Each use of the section appends one `"<id>, <timestamp>"` line. The file
//! is never truncated, so entries from earlier runs are kept.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use baton_core::ProcessId;
use chrono::{DateTime, Local};

use crate::error::AuditError;

/// Default audit log path, relative to the working directory
pub const DEFAULT_AUDIT_FILE: &str = "resultado.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Work done while an agent holds the grant
#[async_trait]
pub trait CriticalSection: Send + Sync {
    async fn use_section(&self, id: &ProcessId) -> Result<(), AuditError>;
}

/// Shared append-only result file
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    /// Open or create the audit log for appending
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        let open_err = |source| AuditError::Open {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(open_err)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry stamped with `at`
    pub fn append(&self, id: &ProcessId, at: DateTime<Local>) -> Result<(), AuditError> {
        let line = format_entry(id, at);
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(file, "{}", line)
            .and_then(|()| file.flush())
            .map_err(|source| AuditError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl CriticalSection for AuditLog {
    async fn use_section(&self, id: &ProcessId) -> Result<(), AuditError> {
        self.append(id, Local::now())?;
        tracing::debug!(id = %id, path = %self.path.display(), "audit entry written");
        Ok(())
    }
}

/// Render one audit line, without the trailing newline
pub fn format_entry(id: &ProcessId, at: DateTime<Local>) -> String {
    format!("{}, {}", id, at.format(TIMESTAMP_FORMAT))
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
