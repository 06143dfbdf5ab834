// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP accept loop and per-connection handling.

use std::sync::Arc;

use baton_core::protocol::{self, ProtocolError};
use baton_core::ProcessId;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::engine::{Coordinator, FrameOutcome, Registration, SharedWriter};

/// Accept connections until shutdown, one task per connection
pub async fn accept_loop(coordinator: Coordinator, listener: TcpListener) {
    let mut shutdown = coordinator.shutdown_signal();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(%addr, "connection accepted");
                        let coordinator = coordinator.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(coordinator, stream).await {
                                warn!(%addr, error = %e, "connection closed with error");
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
    }
    debug!("accept loop stopped");
}

/// Handle a single client connection from identity frame to close
pub async fn handle_connection(
    coordinator: Coordinator,
    stream: TcpStream,
) -> Result<(), ServerError> {
    let width = coordinator.config().frame_width;
    let (mut reader, writer) = stream.into_split();

    let id = match protocol::read_identity(
        &mut reader,
        width,
        coordinator.config().identity_timeout,
    )
    .await
    {
        Ok(id) => id,
        Err(ProtocolError::ConnectionLost) => {
            debug!("Client disconnected before identifying");
            return Ok(());
        }
        Err(e) => return Err(ServerError::Identity(e)),
    };

    let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(writer));
    let registration = match coordinator.register(id.clone(), Arc::clone(&writer)) {
        Ok(registration) => registration,
        Err(e) => {
            close_writer(&writer).await;
            return Err(ServerError::Protocol(e));
        }
    };
    let serial = registration.serial;
    info!(id = %id, "Process connected");

    let result = serve_session(&coordinator, &id, registration, &mut reader).await;

    coordinator.disconnect(&id, serial);
    close_writer(&writer).await;
    info!(id = %id, "Process disconnected");
    result
}

/// Read frames from a registered client until it leaves or is closed
async fn serve_session(
    coordinator: &Coordinator,
    id: &ProcessId,
    registration: Registration,
    reader: &mut OwnedReadHalf,
) -> Result<(), ServerError> {
    let width = coordinator.config().frame_width;
    let threshold = coordinator.config().malformed_threshold;
    let Registration { serial, mut closed } = registration;
    let mut malformed: u32 = 0;

    loop {
        let frame = tokio::select! {
            frame = protocol::read_frame(reader, width) => frame,
            _ = closed.changed() => {
                debug!(id = %id, "session closed by coordinator");
                return Ok(());
            }
        };

        let accepted = match frame {
            Ok(frame) => coordinator.handle_frame(id, serial, frame) != FrameOutcome::Rejected,
            Err(e) if !e.is_fatal() => {
                warn!(id = %id, error = %e, "discarding malformed frame");
                false
            }
            Err(ProtocolError::ConnectionLost) => return Ok(()),
            Err(e) => return Err(ServerError::Protocol(e)),
        };

        if accepted {
            malformed = 0;
            continue;
        }
        malformed += 1;
        if malformed >= threshold {
            warn!(id = %id, malformed, "too many malformed frames, dropping connection");
            return Err(ServerError::TooManyMalformed(malformed));
        }
    }
}

async fn close_writer(writer: &SharedWriter) {
    let _ = writer.lock().await.shutdown().await;
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid identity frame: {0}")]
    Identity(ProtocolError),

    #[error("{0} consecutive malformed frames")]
    TooManyMalformed(u32),
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
