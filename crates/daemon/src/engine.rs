// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator engine: registry, queue, and the grant/release loop
//!
//! All mutable state sits behind one short-lived `std::sync::Mutex` that is
//! never held across an `.await`. The critical section itself is gated by a
//! one-permit semaphore that the grant loop holds from GRANT until RELEASE.
//!
//! ## Turn lifecycle
//!
//! 1. A reader task enqueues the client's REQUEST and signals `queued`
//! 2. The grant loop dequeues the head and acquires the token
//! 3. GRANT is sent and the hold starts
//! 4. The hold ends when the hold timer fires, the client sends RELEASE,
//!    the client disconnects, or the coordinator shuts down
//! 5. RELEASE is sent (unless the client is gone) and the token is dropped

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use baton_core::protocol::{self, ProtocolError};
use baton_core::{
    Connection, CoordinatorConfig, Frame, FrameKind, ProcessId, ReleasePolicy, RequestQueue,
    SessionRegistry, SessionState, SessionSummary,
};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{oneshot, watch, Notify, Semaphore};
use tracing::{debug, error, info, warn};

/// Write half shared between a connection's reader task and the grant loop
pub type SharedWriter = Arc<tokio::sync::Mutex<OwnedWriteHalf>>;

/// Connection handle stored in the registry
pub struct ClientConnection {
    writer: SharedWriter,
    closed: watch::Sender<bool>,
}

impl ClientConnection {
    fn writer(&self) -> SharedWriter {
        Arc::clone(&self.writer)
    }
}

impl Connection for ClientConnection {
    fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Handed to a connection's reader task after a successful registration
pub struct Registration {
    pub serial: u64,
    /// Flips to `true` (or closes) when the engine drops the session
    pub closed: watch::Receiver<bool>,
}

/// Why a hold ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldEnd {
    /// The configured hold duration elapsed
    Elapsed,
    /// The client sent an explicit RELEASE
    Released,
    /// The holder's connection went away
    Disconnected,
    /// The coordinator is shutting down
    Shutdown,
}

/// Result of applying one client frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Enqueued,
    AlreadyQueued,
    Released,
    /// RELEASE from a client that does not hold the section
    NotHolding,
    /// Frame the client may not send, or one naming another identifier
    Rejected,
}

struct Hold {
    id: ProcessId,
    serial: u64,
    end: Option<oneshot::Sender<HoldEnd>>,
}

impl Hold {
    fn finish(&mut self, why: HoldEnd) {
        if let Some(tx) = self.end.take() {
            let _ = tx.send(why);
        }
    }
}

struct EngineState {
    registry: SessionRegistry<ClientConnection>,
    queue: RequestQueue,
    hold: Option<Hold>,
}

struct Inner {
    config: CoordinatorConfig,
    state: Mutex<EngineState>,
    queued: Notify,
    token: Semaphore,
    shutdown: watch::Sender<bool>,
    next_serial: AtomicU64,
}

/// The coordinator engine. Cloning shares the same engine.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(EngineState {
                    registry: SessionRegistry::new(),
                    queue: RequestQueue::new(),
                    hold: None,
                }),
                queued: Notify::new(),
                token: Semaphore::new(1),
                shutdown,
                next_serial: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a freshly identified connection
    pub fn register(
        &self,
        id: ProcessId,
        writer: SharedWriter,
    ) -> Result<Registration, ProtocolError> {
        if self.is_shutdown() {
            return Err(ProtocolError::ConnectionLost);
        }
        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        let (closed_tx, closed_rx) = watch::channel(false);
        let conn = ClientConnection {
            writer,
            closed: closed_tx,
        };

        let mut state = self.lock();
        if !state.registry.register(id.clone(), conn, serial) {
            return Err(ProtocolError::DuplicateIdentity(id));
        }
        debug!(id = %id, serial, "session registered");
        Ok(Registration {
            serial,
            closed: closed_rx,
        })
    }

    /// Apply a frame received on the connection `serial` owned by `id`
    pub fn handle_frame(&self, id: &ProcessId, serial: u64, frame: Frame) -> FrameOutcome {
        if &frame.id != id {
            warn!(id = %id, claimed = %frame.id, "frame names another process");
            return FrameOutcome::Rejected;
        }
        match frame.kind {
            FrameKind::Request => self.request(id, serial),
            FrameKind::Release => self.release(id, serial),
            FrameKind::Grant => {
                warn!(id = %id, "client sent GRANT");
                FrameOutcome::Rejected
            }
        }
    }

    fn request(&self, id: &ProcessId, serial: u64) -> FrameOutcome {
        let mut state = self.lock();
        if !state.registry.is_current(id, serial) {
            return FrameOutcome::Rejected;
        }
        if !state.queue.enqueue(id.clone()) {
            debug!(id = %id, "REQUEST ignored, already queued");
            return FrameOutcome::AlreadyQueued;
        }
        let holding = state
            .hold
            .as_ref()
            .is_some_and(|h| &h.id == id && h.serial == serial);
        if !holding {
            state.registry.set_state(id, SessionState::Queued);
        }
        drop(state);

        info!(id = %id, "REQUEST queued");
        self.inner.queued.notify_one();
        FrameOutcome::Enqueued
    }

    fn release(&self, id: &ProcessId, serial: u64) -> FrameOutcome {
        let mut state = self.lock();
        match state.hold.as_mut() {
            Some(hold) if &hold.id == id && hold.serial == serial => {
                hold.finish(HoldEnd::Released);
                FrameOutcome::Released
            }
            _ => {
                debug!(id = %id, "RELEASE from non-holder ignored");
                FrameOutcome::NotHolding
            }
        }
    }

    /// Drop the session for a closed connection. A pending queue entry is
    /// purged and an active hold ends at once.
    pub fn disconnect(&self, id: &ProcessId, serial: u64) -> bool {
        let mut state = self.lock();
        if state.registry.deregister_connection(id, serial).is_none() {
            return false;
        }
        if state.queue.remove(id) {
            info!(id = %id, "purged queued request of departed process");
        }
        if let Some(hold) = state.hold.as_mut() {
            if &hold.id == id && hold.serial == serial {
                warn!(id = %id, "holder disconnected, releasing critical section");
                hold.finish(HoldEnd::Disconnected);
            }
        }
        true
    }

    /// Tear a session down after a delivery failure
    fn teardown(&self, id: &ProcessId, serial: u64) {
        if self.disconnect(id, serial) {
            warn!(id = %id, "session torn down");
        }
    }

    /// Ordered snapshot of the request queue
    pub fn queue_snapshot(&self) -> Vec<ProcessId> {
        self.lock().queue.peek_all()
    }

    /// Grants delivered per identifier over the coordinator's lifetime,
    /// including identifiers that have since disconnected
    pub fn grant_counts(&self) -> BTreeMap<ProcessId, u64> {
        self.lock().registry.grant_counts()
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.lock().registry.summaries()
    }

    /// The process currently holding the critical section
    pub fn holder(&self) -> Option<ProcessId> {
        self.lock().hold.as_ref().map(|h| h.id.clone())
    }

    pub fn is_shutdown(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Receiver that flips to `true` when shutdown starts
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Stop all loops and close every session
    pub fn shutdown(&self) {
        if self.inner.shutdown.send_replace(true) {
            return;
        }
        info!("Shutting down coordinator");
        let closed = {
            let mut state = self.lock();
            if let Some(hold) = state.hold.as_mut() {
                hold.finish(HoldEnd::Shutdown);
            }
            state.queue.clear();
            state.registry.drain()
        };
        for session in closed {
            debug!(id = %session.id, grants = session.grants, "session closed");
        }
        self.inner.queued.notify_one();
    }

    /// Serve queued requests one at a time until shutdown
    pub async fn run_grants(&self) {
        let mut shutdown = self.shutdown_signal();
        while let Some((id, serial)) = self.next_turn(&mut shutdown).await {
            let Ok(permit) = self.inner.token.acquire().await else {
                break;
            };
            self.take_turn(id, serial).await;
            drop(permit);
        }
        debug!("grant loop stopped");
    }

    /// Dequeue the next requester along with the serial of the connection
    /// that asked
    async fn next_turn(&self, shutdown: &mut watch::Receiver<bool>) -> Option<(ProcessId, u64)> {
        loop {
            if *shutdown.borrow() {
                return None;
            }
            if let Some(turn) = self.dequeue_turn() {
                return Some(turn);
            }
            tokio::select! {
                _ = self.inner.queued.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    fn dequeue_turn(&self) -> Option<(ProcessId, u64)> {
        let mut state = self.lock();
        while let Some(id) = state.queue.dequeue() {
            if let Some(session) = state.registry.lookup(&id) {
                return Some((id, session.serial));
            }
        }
        None
    }

    async fn take_turn(&self, id: ProcessId, serial: u64) {
        let (end_tx, end_rx) = oneshot::channel();
        let writer = {
            let mut state = self.lock();
            let Some(session) = state
                .registry
                .lookup_mut(&id)
                .filter(|s| s.serial == serial)
            else {
                debug!(id = %id, serial, "skipping turn of departed connection");
                return;
            };
            session.state = SessionState::Holding;
            let writer = session.conn.writer();
            state.hold = Some(Hold {
                id: id.clone(),
                serial,
                end: Some(end_tx),
            });
            writer
        };

        if let Err(e) = self.deliver(&writer, &Frame::grant(id.clone())).await {
            error!(id = %id, error = %e, "failed to deliver GRANT");
            self.lock().hold = None;
            self.teardown(&id, serial);
            return;
        }
        let grants = self.lock().registry.record_grant(&id).unwrap_or_default();
        info!(id = %id, grants, "GRANT sent");

        let end = tokio::select! {
            _ = tokio::time::sleep(self.inner.config.hold) => HoldEnd::Elapsed,
            end = end_rx => end.unwrap_or(HoldEnd::Disconnected),
        };
        self.lock().hold = None;

        if matches!(end, HoldEnd::Disconnected | HoldEnd::Shutdown) {
            info!(id = %id, reason = ?end, "hold ended without RELEASE");
            return;
        }

        if let Err(e) = self.deliver(&writer, &Frame::release(id.clone())).await {
            error!(id = %id, error = %e, "failed to deliver RELEASE");
            self.teardown(&id, serial);
            return;
        }
        info!(id = %id, reason = ?end, "RELEASE sent");
        self.after_release(&id, serial);
    }

    fn after_release(&self, id: &ProcessId, serial: u64) {
        let mut state = self.lock();
        if !state.registry.is_current(id, serial) {
            return;
        }
        let requeued = self.inner.config.release_policy == ReleasePolicy::Requeue
            && state.queue.enqueue(id.clone());
        let next = if state.queue.contains(id) {
            SessionState::Queued
        } else {
            SessionState::Registered
        };
        state.registry.set_state(id, next);
        drop(state);

        if requeued {
            debug!(id = %id, "requeued after release");
            self.inner.queued.notify_one();
        }
    }

    async fn deliver(&self, writer: &SharedWriter, frame: &Frame) -> Result<(), ProtocolError> {
        let width = self.inner.config.frame_width;
        let write = async {
            let mut writer = writer.lock().await;
            protocol::write_frame(&mut *writer, frame, width).await
        };
        match tokio::time::timeout(self.inner.config.write_timeout, write).await {
            Err(_) => Err(ProtocolError::Timeout),
            Ok(Ok(())) => Ok(()),
            Ok(Err(ProtocolError::Io(source))) => Err(ProtocolError::SendFailure {
                id: frame.id.clone(),
                source,
            }),
            Ok(Err(e)) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
