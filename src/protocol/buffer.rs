//! C8: a small bounded-growth byte arena shared by the line reader, the
//! text reader, and the hex encoder.
//!
//! This replaces the original engine's manual `realloc`-on-demand pattern
//! (see `convertToHex`/`readText` in the C source this crate is modeled on)
//! with a reusable abstraction that reports a hard cap as an error instead
//! of growing without bound.

use super::error::ProtocolError;

/// A byte buffer that doubles its capacity on demand and never shrinks,
/// with an optional hard cap that turns further growth into an error.
#[derive(Debug, Default)]
pub(crate) struct ScratchBuffer {
    buf: Vec<u8>,
    cap_limit: Option<usize>,
}

impl ScratchBuffer {
    /// Creates an empty buffer with no hard cap.
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::new(),
            cap_limit: None,
        }
    }

    /// Creates an empty buffer that refuses to grow past `limit` bytes.
    pub(crate) fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            cap_limit: Some(limit),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Appends `data`, doubling capacity as needed. Fails with
    /// [`ProtocolError::TextBlockOverflow`] if the hard cap would be
    /// exceeded.
    pub(crate) fn extend(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let needed = self.buf.len() + data.len();
        if let Some(limit) = self.cap_limit {
            if needed > limit {
                return Err(ProtocolError::TextBlockOverflow);
            }
        }

        if needed > self.buf.capacity() {
            let mut new_cap = self.buf.capacity().max(64);
            while new_cap < needed {
                new_cap <<= 1;
            }
            if let Some(limit) = self.cap_limit {
                new_cap = new_cap.min(limit);
            }
            self.buf.reserve(new_cap - self.buf.len());
        }

        self.buf.extend_from_slice(data);
        Ok(())
    }
}
