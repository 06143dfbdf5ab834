// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the grant protocol
//!
//! An [`Agent`] owns its identity and configuration. Each call to
//! [`Agent::connect`] opens a fresh [`AgentSession`]; a lost connection is
//! terminal and never retried.

use baton_core::protocol;
use baton_core::{AgentConfig, Frame, FrameKind, ProcessId, ReleaseMode};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::audit::CriticalSection;
use crate::error::AgentError;

/// A client process competing for the critical section
#[derive(Debug, Clone)]
pub struct Agent {
    id: ProcessId,
    config: AgentConfig,
}

impl Agent {
    /// Create an agent, checking that `id` fits the configured frame width
    pub fn new(id: impl Into<ProcessId>, config: AgentConfig) -> Result<Self, AgentError> {
        let id = id.into();
        config.validate_identifier(&id)?;
        Ok(Self { id, config })
    }

    pub fn id(&self) -> &ProcessId {
        &self.id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Connect to the coordinator and announce this agent's identity
    pub async fn connect(&self) -> Result<AgentSession, AgentError> {
        let addr = self.config.coordinator_addr();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| AgentError::Connect {
                addr: addr.clone(),
                source,
            })?;
        let (reader, mut writer) = stream.into_split();
        protocol::write_identity(&mut writer, &self.id, self.config.frame_width).await?;
        info!(id = %self.id, addr = %addr, "connected to coordinator");

        Ok(AgentSession {
            id: self.id.clone(),
            width: self.config.frame_width,
            reader,
            writer,
        })
    }

    /// Run the configured number of request cycles on one connection.
    ///
    /// Returns the number of completed cycles.
    pub async fn run(&self, section: &dyn CriticalSection) -> Result<u32, AgentError> {
        let mut session = self.connect().await?;
        let repetitions = self.config.repetitions;

        for cycle in 1..=repetitions {
            session.request_access().await?;
            session.await_grant().await?;
            info!(id = %self.id, cycle, "access granted");

            self.hold_section(&mut session, section, cycle).await?;
            info!(id = %self.id, cycle, "access released");

            if cycle < repetitions && !self.config.think_time.is_zero() {
                tokio::time::sleep(self.config.think_time).await;
            }
        }

        session.close().await;
        info!(id = %self.id, cycles = repetitions, "agent finished");
        Ok(repetitions)
    }

    /// Use the section while holding the grant, then wait for RELEASE.
    ///
    /// The section only runs inside the hold if it finishes before the
    /// coordinator's hold time. When the hold ends first the section still
    /// runs to completion with a warning, and no explicit RELEASE is sent
    /// for the finished hold. Returns whether the hold ended first.
    async fn hold_section(
        &self,
        session: &mut AgentSession,
        section: &dyn CriticalSection,
        cycle: u32,
    ) -> Result<bool, AgentError> {
        let AgentSession {
            id,
            width,
            reader,
            writer,
        } = session;
        let id: &ProcessId = id;
        let width = *width;

        let work = section.use_section(id);
        let ended = read_until(reader, id, width, FrameKind::Release);
        tokio::pin!(work, ended);

        tokio::select! {
            biased;
            done = &mut work => {
                done?;
                if self.config.release_mode == ReleaseMode::Explicit {
                    send_frame(writer, &Frame::release(id.clone()), width).await?;
                }
                ended.await?;
                Ok(false)
            }
            released = &mut ended => {
                released?;
                warn!(id = %id, cycle, "hold ended before the critical section finished");
                work.await?;
                Ok(true)
            }
        }
    }
}

/// An open connection to the coordinator
pub struct AgentSession {
    id: ProcessId,
    width: usize,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl AgentSession {
    pub fn id(&self) -> &ProcessId {
        &self.id
    }

    /// Ask to be queued for the critical section
    pub async fn request_access(&mut self) -> Result<(), AgentError> {
        self.send(Frame::request(self.id.clone())).await
    }

    /// Give the grant back before the hold expires
    pub async fn release(&mut self) -> Result<(), AgentError> {
        self.send(Frame::release(self.id.clone())).await
    }

    /// Wait until the coordinator grants access to this agent
    pub async fn await_grant(&mut self) -> Result<(), AgentError> {
        self.await_frame(FrameKind::Grant).await
    }

    /// Wait until the coordinator ends this agent's hold
    pub async fn await_release(&mut self) -> Result<(), AgentError> {
        self.await_frame(FrameKind::Release).await
    }

    /// Close the connection cleanly
    pub async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!(id = %self.id, error = %e, "shutdown of coordinator connection failed");
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), AgentError> {
        send_frame(&mut self.writer, &frame, self.width).await
    }

    async fn await_frame(&mut self, kind: FrameKind) -> Result<(), AgentError> {
        read_until(&mut self.reader, &self.id, self.width, kind).await
    }
}

async fn send_frame(
    writer: &mut OwnedWriteHalf,
    frame: &Frame,
    width: usize,
) -> Result<(), AgentError> {
    protocol::write_frame(writer, frame, width).await?;
    debug!(id = %frame.id, kind = %frame.kind, "frame sent");
    Ok(())
}

/// Read until a `kind` frame addressed to `id` arrives.
/// Anything else, malformed frames included, is dropped.
async fn read_until(
    reader: &mut OwnedReadHalf,
    id: &ProcessId,
    width: usize,
    kind: FrameKind,
) -> Result<(), AgentError> {
    loop {
        match protocol::read_frame(reader, width).await {
            Ok(frame) if frame.kind == kind && &frame.id == id => return Ok(()),
            Ok(frame) => {
                debug!(id = %id, kind = %frame.kind, to = %frame.id, waiting = %kind, "discarding frame");
            }
            Err(e) if !e.is_fatal() => {
                warn!(id = %id, error = %e, "discarding malformed frame");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
