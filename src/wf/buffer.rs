//! Growable write buffer backing one encode pass.
//!
//! The buffer owns a contiguous region and a write cursor. Writes never
//! allocate: when the region is out of room the write fails with
//! [`WireRet::BufferTooSmall`] and the caller decides where to re-attempt
//! from after calling [`GrowBuffer::grow`]. Growth preserves the written
//! prefix byte for byte, so rollback anchors recorded as absolute offsets
//! stay valid across any number of reallocations.

use tracing::trace;

use crate::WireRet;

/// Owned byte region plus write cursor. Exclusively held by one
/// [`EncodeIterator`](super::encode_iter::EncodeIterator) at a time.
#[derive(Debug)]
pub struct GrowBuffer {
    data: Box<[u8]>,
    written: usize,
}

impl GrowBuffer {
    /// Allocates a region of `capacity` bytes (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        GrowBuffer {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes written so far; also the current cursor position.
    pub fn written(&self) -> usize {
        self.written
    }

    /// The written prefix.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.written]
    }

    /// Appends `bytes` at the cursor. Fails without writing anything when
    /// the region is out of room.
    pub fn write(&mut self, bytes: &[u8]) -> WireRet {
        let end = self.written + bytes.len();
        if end > self.data.len() {
            return WireRet::BufferTooSmall;
        }
        self.data[self.written..end].copy_from_slice(bytes);
        self.written = end;
        WireRet::Success
    }

    /// Overwrites already-written bytes in place. Used to back-patch count
    /// and length fields whose values are only known at completion.
    pub fn patch(&mut self, pos: usize, bytes: &[u8]) {
        debug_assert!(pos + bytes.len() <= self.written, "patch outside written prefix");
        self.data[pos..pos + bytes.len()].copy_from_slice(bytes);
    }

    /// Moves the cursor back to `pos`, discarding everything after it.
    /// Never truncates below zero writes already confirmed by the caller.
    pub fn truncate(&mut self, pos: usize) {
        debug_assert!(pos <= self.written, "truncate past cursor");
        self.written = pos;
    }

    /// Reallocates to at least `max(capacity * 2, capacity + extra)` and
    /// copies the written prefix into the new region.
    pub fn grow(&mut self, extra: usize) {
        let new_cap = (self.data.len() * 2).max(self.data.len() + extra);
        let mut grown = vec![0u8; new_cap].into_boxed_slice();
        grown[..self.written].copy_from_slice(&self.data[..self.written]);
        trace!(
            old_capacity = self.data.len(),
            new_capacity = new_cap,
            written = self.written,
            "grew encode buffer"
        );
        self.data = grown;
    }
}
