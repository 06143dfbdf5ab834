// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO request queue
//!
//! Holds the identifiers waiting for a grant. Order of arrival is the only
//! fairness guarantee; an identifier is queued at most once at a time.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::id::ProcessId;

/// What happens to an identifier once its hold ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleasePolicy {
    /// The identifier leaves the queue until the client sends a new REQUEST
    #[default]
    PerCycle,
    /// The identifier goes straight back to the tail of the queue
    Requeue,
}

impl std::fmt::Display for ReleasePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleasePolicy::PerCycle => write!(f, "per-cycle"),
            ReleasePolicy::Requeue => write!(f, "requeue"),
        }
    }
}

impl std::str::FromStr for ReleasePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-cycle" => Ok(ReleasePolicy::PerCycle),
            "requeue" => Ok(ReleasePolicy::Requeue),
            other => Err(format!(
                "unknown release policy '{}' (expected per-cycle or requeue)",
                other
            )),
        }
    }
}

/// Queue of identifiers awaiting a grant
#[derive(Debug, Clone, Default)]
pub struct RequestQueue {
    order: VecDeque<ProcessId>,
    members: HashSet<ProcessId>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. Returns false if the identifier is already queued.
    pub fn enqueue(&mut self, id: ProcessId) -> bool {
        if !self.members.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        true
    }

    /// Remove and return the head
    pub fn dequeue(&mut self) -> Option<ProcessId> {
        let id = self.order.pop_front()?;
        self.members.remove(&id);
        Some(id)
    }

    /// Purge an identifier wherever it sits. Returns whether it was queued.
    pub fn remove(&mut self, id: &ProcessId) -> bool {
        if !self.members.remove(id) {
            return false;
        }
        self.order.retain(|queued| queued != id);
        true
    }

    pub fn contains(&self, id: &ProcessId) -> bool {
        self.members.contains(id)
    }

    /// Ordered snapshot, head first
    pub fn peek_all(&self) -> Vec<ProcessId> {
        self.order.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
