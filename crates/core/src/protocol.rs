// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream I/O for fixed-width frames
//!
//! Both peers read exactly `width` bytes per frame. Frames carry no length
//! prefix, so a short read can only mean the peer went away.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::frame::{self, Frame, FrameError};
use crate::id::ProcessId;

/// Default timeout for identity reads and frame writes
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection lost")]
    ConnectionLost,

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    #[error("process {0} is already registered")]
    DuplicateIdentity(ProcessId),

    #[error("failed to deliver frame to {id}: {source}")]
    SendFailure {
        id: ProcessId,
        #[source]
        source: std::io::Error,
    },

    #[error("operation timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the connection is unusable after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProtocolError::MalformedFrame(_))
    }
}

/// Read exactly one frame's worth of bytes.
///
/// EOF before the first byte or part-way through the frame is reported as
/// [`ProtocolError::ConnectionLost`].
pub async fn read_raw<R: AsyncRead + Unpin>(
    reader: &mut R,
    width: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; width];
    match reader.read_exact(&mut buf).await {
        Ok(_) => Ok(buf),
        Err(e) if is_disconnect(&e) => Err(ProtocolError::ConnectionLost),
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

/// Read and decode one tagged frame
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    width: usize,
) -> Result<Frame, ProtocolError> {
    let bytes = read_raw(reader, width).await?;
    let frame = frame::decode(&bytes, width)?;
    tracing::trace!(kind = %frame.kind, id = %frame.id, "frame received");
    Ok(frame)
}

/// Read the identity frame with a timeout
pub async fn read_identity<R: AsyncRead + Unpin>(
    reader: &mut R,
    width: usize,
    timeout: Duration,
) -> Result<ProcessId, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_raw(reader, width))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    Ok(frame::decode_identity(&bytes, width)?)
}

/// Encode and write one tagged frame, flushing afterwards
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
    width: usize,
) -> Result<(), ProtocolError> {
    let bytes = frame.encode(width)?;
    write_bytes(writer, &bytes).await?;
    tracing::trace!(kind = %frame.kind, id = %frame.id, "frame sent");
    Ok(())
}

/// Encode and write the identity frame
pub async fn write_identity<W: AsyncWrite + Unpin>(
    writer: &mut W,
    id: &ProcessId,
    width: usize,
) -> Result<(), ProtocolError> {
    let bytes = frame::encode_identity(id, width)?;
    write_bytes(writer, &bytes).await
}

async fn write_bytes<W: AsyncWrite + Unpin>(
    writer: &mut W,
    bytes: &[u8],
) -> Result<(), ProtocolError> {
    match writer.write_all(bytes).await {
        Ok(()) => {}
        Err(e) if is_disconnect(&e) => return Err(ProtocolError::ConnectionLost),
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    writer.flush().await?;
    Ok(())
}

fn is_disconnect(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
    )
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
