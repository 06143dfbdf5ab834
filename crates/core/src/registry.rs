// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry
//!
//! Maps each live [`ProcessId`] to its connection handle and grant counter.
//! The registry is the sole owner of connection handles: removing a session
//! closes its connection.
//!
//! Grant totals are kept per identifier for the registry's lifetime and
//! survive disconnects and reconnects.

use std::collections::{BTreeMap, HashMap};

use crate::id::ProcessId;

/// Connection handle owned by a session
pub trait Connection: Send + Sync {
    /// Close the underlying connection. Must be idempotent.
    fn close(&self);
}

/// Where a registered session is in its request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected and registered, nothing outstanding
    Registered,
    /// Waiting in the request queue
    Queued,
    /// Holds the critical section
    Holding,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Registered => write!(f, "registered"),
            SessionState::Queued => write!(f, "queued"),
            SessionState::Holding => write!(f, "holding"),
        }
    }
}

/// A registered client session
#[derive(Debug)]
pub struct Session<C> {
    pub id: ProcessId,
    pub conn: C,
    /// Distinguishes successive connections that reuse one identifier
    pub serial: u64,
    pub grants: u64,
    pub state: SessionState,
}

/// Read-only view of a session for introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: ProcessId,
    pub serial: u64,
    pub grants: u64,
    pub state: SessionState,
}

/// Live sessions keyed by identifier
#[derive(Debug)]
pub struct SessionRegistry<C> {
    sessions: HashMap<ProcessId, Session<C>>,
    totals: BTreeMap<ProcessId, u64>,
}

impl<C> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
            totals: BTreeMap::new(),
        }
    }
}

impl<C: Connection> SessionRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Returns false, leaving the existing session
    /// untouched, if the identifier is already live.
    pub fn register(&mut self, id: ProcessId, conn: C, serial: u64) -> bool {
        if self.sessions.contains_key(&id) {
            return false;
        }
        self.totals.entry(id.clone()).or_insert(0);
        self.sessions.insert(
            id.clone(),
            Session {
                id,
                conn,
                serial,
                grants: 0,
                state: SessionState::Registered,
            },
        );
        true
    }

    pub fn lookup(&self, id: &ProcessId) -> Option<&Session<C>> {
        self.sessions.get(id)
    }

    pub fn lookup_mut(&mut self, id: &ProcessId) -> Option<&mut Session<C>> {
        self.sessions.get_mut(id)
    }

    pub fn contains(&self, id: &ProcessId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Whether `id` is registered by the connection with `serial`
    pub fn is_current(&self, id: &ProcessId, serial: u64) -> bool {
        self.sessions.get(id).is_some_and(|s| s.serial == serial)
    }

    /// Remove a session and close its connection. Idempotent.
    pub fn deregister(&mut self, id: &ProcessId) -> Option<SessionSummary> {
        let session = self.sessions.remove(id)?;
        session.conn.close();
        Some(summarize(&session))
    }

    /// Remove a session only if it belongs to the connection with `serial`
    pub fn deregister_connection(&mut self, id: &ProcessId, serial: u64) -> Option<SessionSummary> {
        if !self.is_current(id, serial) {
            return None;
        }
        self.deregister(id)
    }

    /// Count a delivered grant. Returns the identifier's lifetime total.
    pub fn record_grant(&mut self, id: &ProcessId) -> Option<u64> {
        let session = self.sessions.get_mut(id)?;
        session.grants += 1;
        let total = self.totals.entry(id.clone()).or_insert(0);
        *total += 1;
        Some(*total)
    }

    pub fn set_state(&mut self, id: &ProcessId, state: SessionState) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.state = state;
                true
            }
            None => false,
        }
    }

    /// Snapshot of registered identifiers, sorted
    pub fn all_identifiers(&self) -> Vec<ProcessId> {
        let mut ids: Vec<_> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Lifetime grant totals of every identifier that ever registered,
    /// sorted by identifier
    pub fn grant_counts(&self) -> BTreeMap<ProcessId, u64> {
        self.totals.clone()
    }

    /// Snapshot of every session, sorted by identifier
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let mut out: Vec<_> = self.sessions.values().map(summarize).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Close and remove every session. Grant totals are kept.
    pub fn drain(&mut self) -> Vec<SessionSummary> {
        let mut out = Vec::with_capacity(self.sessions.len());
        for (_, session) in self.sessions.drain() {
            session.conn.close();
            out.push(summarize(&session));
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn summarize<C>(session: &Session<C>) -> SessionSummary {
    SessionSummary {
        id: session.id.clone(),
        serial: session.serial,
        grants: session.grants,
        state: session.state,
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
