//! Length-prefixed framing for snapshots on a byte stream.
//!
//! Wire format:
//! ```text
//! [payload_len:4][payload:N]
//! ```
//! `payload_len` is a big-endian `u32`.
//!
//! # Why framing is needed (for beginners)
//!
//! TCP delivers a stream of bytes, not a sequence of messages.  A single
//! `read()` may return half a snapshot, or the tail of one snapshot and the
//! head of the next.  Prefixing every payload with its length lets the reader
//! pull exactly one complete snapshot at a time with `read_exact`.

use std::io::{ErrorKind, Read, Write};

use thiserror::Error;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload accepted on the wire (64 MiB).
///
/// Guards against allocating an absurd buffer because of a corrupt or hostile
/// length prefix.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Errors that can occur while reading or writing frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The underlying stream failed.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The declared payload length exceeds [`MAX_FRAME_LEN`].
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    /// The stream ended in the middle of a frame.
    #[error("stream closed mid-frame")]
    Truncated,

    /// Empty payloads are never sent.
    #[error("refusing to send an empty frame")]
    Empty,
}

/// Builds the on-wire bytes for one payload (prefix + payload).
///
/// # Errors
///
/// Returns [`FrameError::Empty`] or [`FrameError::TooLarge`].
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Writes one frame with a single `write_all` and flushes.
///
/// Prefix and payload go out in one call so a concurrent writer holding the
/// same lock can never interleave between them.
///
/// # Errors
///
/// See [`encode_frame`]; I/O failures are returned as [`FrameError::Io`].
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let frame = encode_frame(payload)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary, which
/// is how a peer's orderly close shows up.  A zero-length frame is returned as
/// `Ok(Some(vec![]))`; callers skip it.
///
/// # Errors
///
/// [`FrameError::Truncated`] if the stream ends mid-frame,
/// [`FrameError::TooLarge`] for an oversized prefix, [`FrameError::Io`] for
/// read failures.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_SIZE {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(FrameError::Truncated),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FrameError::Io(e)),
        }
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            FrameError::Truncated
        } else {
            FrameError::Io(e)
        }
    })?;
    Ok(Some(payload))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
