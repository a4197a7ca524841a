//! Decode cursor over one received byte range.
//!
//! Construction checks the wire version in effect for the connection; a
//! range the cursor cannot be positioned or versioned over at all is the
//! [`CodecError::IteratorSetFailure`] class, distinct from running out of
//! bytes mid-stream. After construction every read is bounds-checked and
//! reports [`WireRet::IncompleteData`] exactly where the range ends.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::{CodecError, Result, WireRet, WIRE_MAJOR_VERSION};

/// Read cursor positioned over one wire-encoded value or container.
#[derive(Debug)]
pub struct DecodeIterator<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DecodeIterator<'a> {
    /// Positions the cursor over `data` for the given wire version.
    ///
    /// Minor revisions are additive, so only the major version gates
    /// decoding. An unsupported major fails with `IteratorSetFailure`.
    pub fn new(data: &'a [u8], major: u8, _minor: u8) -> Result<Self> {
        if major != WIRE_MAJOR_VERSION {
            return Err(CodecError::IteratorSetFailure {
                reason: "unsupported wire major version",
            });
        }
        Ok(DecodeIterator { data, pos: 0 })
    }

    /// Current read offset from the start of the range.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left in the range.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The unread suffix of the range.
    pub fn remaining_slice(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Consumes the entire unread suffix.
    pub(crate) fn take_remaining(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    pub(crate) fn read_u8(&mut self) -> std::result::Result<u8, WireRet> {
        if self.remaining() < 1 {
            return Err(WireRet::IncompleteData);
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub(crate) fn read_u16_le(&mut self) -> std::result::Result<u16, WireRet> {
        if self.remaining() < 2 {
            return Err(WireRet::IncompleteData);
        }
        let v = LittleEndian::read_u16(&self.data[self.pos..]);
        self.pos += 2;
        Ok(v)
    }

    pub(crate) fn read_f32_be(&mut self) -> std::result::Result<f32, WireRet> {
        if self.remaining() < 4 {
            return Err(WireRet::IncompleteData);
        }
        let v = BigEndian::read_f32(&self.data[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    pub(crate) fn read_f64_be(&mut self) -> std::result::Result<f64, WireRet> {
        if self.remaining() < 8 {
            return Err(WireRet::IncompleteData);
        }
        let v = BigEndian::read_f64(&self.data[self.pos..]);
        self.pos += 8;
        Ok(v)
    }

    /// Consumes `len` bytes as a sub-range.
    pub(crate) fn read_slice(&mut self, len: usize) -> std::result::Result<&'a [u8], WireRet> {
        if self.remaining() < len {
            return Err(WireRet::IncompleteData);
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }
}
