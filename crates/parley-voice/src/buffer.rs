//! Duration-tracked audio accumulation with atomic drain.

use bytes::{Bytes, BytesMut};

/// Accumulates raw audio frames until the session drains them into a
/// turn.
///
/// Duration is derived from the configured byte rate of the transport's
/// audio encoding; the buffer itself never inspects the bytes.
pub struct AudioBuffer {
    data: BytesMut,
    bytes_per_second: u64,
}

impl AudioBuffer {
    /// Create an empty buffer for audio at `bytes_per_second`.
    #[must_use]
    pub fn new(bytes_per_second: u64) -> Self {
        Self {
            data: BytesMut::new(),
            bytes_per_second: bytes_per_second.max(1),
        }
    }

    /// Append one media frame.
    pub fn push(&mut self, frame: &[u8]) {
        self.data.extend_from_slice(frame);
    }

    /// Buffered audio duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.data.len() as u64 * 1000 / self.bytes_per_second
    }

    /// Buffered byte count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Swap-and-clear: the caller receives everything buffered so far
    /// and the buffer is empty afterwards. Never drains partially.
    pub fn drain(&mut self) -> Bytes {
        self.data.split().freeze()
    }
}
