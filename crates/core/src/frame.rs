// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-width frame codec
//!
//! Every frame on the wire is exactly `width` bytes:
//!
//! ```text
//! <tag>|<id>|<padding>     REQUEST / GRANT / RELEASE
//! <id>|<padding>           identity (first frame on a connection)
//! ```
//!
//! `<tag>` is one ASCII digit and `<padding>` is ASCII `0` repeated to fill
//! the frame. The codec is a pure transform; stream I/O lives in
//! [`crate::protocol`].

use crate::id::ProcessId;
use thiserror::Error;

/// Default frame width in bytes.
pub const DEFAULT_FRAME_WIDTH: usize = 10;

/// Smallest usable width: tag, two delimiters, a one-byte id, one pad byte.
pub const MIN_FRAME_WIDTH: usize = 5;

/// Bytes a tagged frame spends on everything but the identifier.
const TAGGED_OVERHEAD: usize = 4;

const DELIMITER: u8 = b'|';
const PADDING: u8 = b'0';

/// Frame type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Request,
    Grant,
    Release,
}

impl FrameKind {
    pub fn tag(self) -> u8 {
        match self {
            FrameKind::Request => b'1',
            FrameKind::Grant => b'2',
            FrameKind::Release => b'3',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'1' => Some(FrameKind::Request),
            b'2' => Some(FrameKind::Grant),
            b'3' => Some(FrameKind::Release),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameKind::Request => write!(f, "REQUEST"),
            FrameKind::Grant => write!(f, "GRANT"),
            FrameKind::Release => write!(f, "RELEASE"),
        }
    }
}

/// A decoded protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub id: ProcessId,
}

impl Frame {
    pub fn new(kind: FrameKind, id: impl Into<ProcessId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn request(id: impl Into<ProcessId>) -> Self {
        Self::new(FrameKind::Request, id)
    }

    pub fn grant(id: impl Into<ProcessId>) -> Self {
        Self::new(FrameKind::Grant, id)
    }

    pub fn release(id: impl Into<ProcessId>) -> Self {
        Self::new(FrameKind::Release, id)
    }

    /// Encode this frame at the given width
    pub fn encode(&self, width: usize) -> Result<Vec<u8>, FrameError> {
        encode(self.kind, &self.id, width)
    }
}

/// Codec errors. Every variant is a protocol violation by the sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),

    #[error("missing '|' delimiter")]
    MissingDelimiter,

    #[error("empty process identifier")]
    EmptyIdentifier,

    #[error("process identifier contains '|'")]
    InvalidIdentifier,

    #[error("process identifier is {len} bytes, limit is {max}")]
    IdentifierTooLong { len: usize, max: usize },

    #[error("padding contains non-'0' byte")]
    InvalidPadding,

    #[error("process identifier is not valid UTF-8")]
    NotUtf8,

    #[error("frame width {width} is below the minimum of {min}")]
    WidthTooSmall { width: usize, min: usize },
}

/// Longest identifier a tagged frame of `width` bytes can carry.
pub fn max_identifier_len(width: usize) -> usize {
    width.saturating_sub(TAGGED_OVERHEAD)
}

/// Check an identifier against the byte-level rules for `width`.
pub fn validate_identifier(id: &str, width: usize) -> Result<(), FrameError> {
    if width < MIN_FRAME_WIDTH {
        return Err(FrameError::WidthTooSmall {
            width,
            min: MIN_FRAME_WIDTH,
        });
    }
    if id.is_empty() {
        return Err(FrameError::EmptyIdentifier);
    }
    if id.as_bytes().contains(&DELIMITER) {
        return Err(FrameError::InvalidIdentifier);
    }
    let max = max_identifier_len(width);
    if id.len() > max {
        return Err(FrameError::IdentifierTooLong { len: id.len(), max });
    }
    Ok(())
}

/// Encode a tagged frame as exactly `width` bytes.
pub fn encode(kind: FrameKind, id: &ProcessId, width: usize) -> Result<Vec<u8>, FrameError> {
    validate_identifier(id.as_str(), width)?;

    let mut buf = Vec::with_capacity(width);
    buf.push(kind.tag());
    buf.push(DELIMITER);
    buf.extend_from_slice(id.as_str().as_bytes());
    buf.push(DELIMITER);
    buf.resize(width, PADDING);
    Ok(buf)
}

/// Decode a tagged frame; `bytes` must be exactly `width` long and `width`
/// at least [`MIN_FRAME_WIDTH`].
pub fn decode(bytes: &[u8], width: usize) -> Result<Frame, FrameError> {
    check_length(bytes, width)?;

    let kind = FrameKind::from_tag(bytes[0]).ok_or(FrameError::UnknownTag(bytes[0]))?;
    if bytes.get(1) != Some(&DELIMITER) {
        return Err(FrameError::MissingDelimiter);
    }
    let id = split_identifier(&bytes[2..])?;
    if id.len() > max_identifier_len(width) {
        return Err(FrameError::IdentifierTooLong {
            len: id.len(),
            max: max_identifier_len(width),
        });
    }
    Ok(Frame { kind, id })
}

/// Encode the identity frame a client sends once after connecting.
pub fn encode_identity(id: &ProcessId, width: usize) -> Result<Vec<u8>, FrameError> {
    validate_identifier(id.as_str(), width)?;

    let mut buf = Vec::with_capacity(width);
    buf.extend_from_slice(id.as_str().as_bytes());
    buf.push(DELIMITER);
    buf.resize(width, PADDING);
    Ok(buf)
}

/// Decode an identity frame.
///
/// Identities obey the same length limit as tagged frames so that every
/// registered session can be addressed by GRANT and RELEASE.
pub fn decode_identity(bytes: &[u8], width: usize) -> Result<ProcessId, FrameError> {
    check_length(bytes, width)?;

    let id = split_identifier(bytes)?;
    validate_identifier(id.as_str(), width)?;
    Ok(id)
}

fn check_length(bytes: &[u8], width: usize) -> Result<(), FrameError> {
    if width < MIN_FRAME_WIDTH {
        return Err(FrameError::WidthTooSmall {
            width,
            min: MIN_FRAME_WIDTH,
        });
    }
    if bytes.len() != width {
        return Err(FrameError::WrongLength {
            expected: width,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Split `<id>|<padding>` and verify the padding.
fn split_identifier(rest: &[u8]) -> Result<ProcessId, FrameError> {
    let end = rest
        .iter()
        .position(|&b| b == DELIMITER)
        .ok_or(FrameError::MissingDelimiter)?;
    if end == 0 {
        return Err(FrameError::EmptyIdentifier);
    }
    if rest[end + 1..].iter().any(|&b| b != PADDING) {
        return Err(FrameError::InvalidPadding);
    }
    let id = std::str::from_utf8(&rest[..end]).map_err(|_| FrameError::NotUtf8)?;
    Ok(ProcessId::new(id))
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
