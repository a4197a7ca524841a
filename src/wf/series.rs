//! # Series - summary-data container family
//!
//! The second instantiation of the container pattern: entries carry no id,
//! action or permission bytes, only a length-delimited payload, and the
//! header can carry summary data, a single value that describes the entries
//! and establishes the container's payload type before any entry is added.
//!
//! Encoding discipline is shared with the filter-list family: lazy header
//! emission, grow-and-retry around every header and entry write, the
//! `Clear`/`Initialized`/`Complete` state machine, and cursor lending for
//! nested child encoders.

use tracing::{debug, trace};

use super::decode_iter::DecodeIterator;
use super::encode_iter::{DoneEntry, EncodeIterator, EncodeLevel, EntryHandle, LevelState};
use super::{
    check_declared_type, primitive, ContainerEncoder, DecodedPayload, Payload, ScalarValue,
    WireType, HDR_HAS_COUNT_HINT, HDR_HAS_SUMMARY,
};
use crate::{CodecError, ErrorCode, Result, WireRet, DEFAULT_ENCODE_CAPACITY};

enum EntryBody<'a> {
    None,
    Bytes(&'a [u8]),
    Scalar(ScalarValue<'a>),
}

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    depth: usize,
    entry_len_pos: usize,
}

/// Streaming encoder for the Series container family.
pub struct SeriesEncoder {
    iter: Option<EncodeIterator>,
    pending: Option<PendingEntry>,
    origin: Option<(usize, usize)>,
    container_type: Option<WireType>,
    count_hint: Option<u16>,
    capacity: usize,
    initialized: bool,
    complete: bool,
}

impl SeriesEncoder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ENCODE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SeriesEncoder {
            iter: None,
            pending: None,
            origin: None,
            container_type: None,
            count_hint: None,
            capacity,
            initialized: false,
            complete: false,
        }
    }

    /// Continues encoding over a cursor lent by a parent's `begin_entry`.
    pub fn nested(handle: EntryHandle) -> Self {
        let parent_depth = handle.parent_depth();
        let entry_len_pos = handle.entry_len_pos();
        SeriesEncoder {
            iter: Some(handle.into_inner()),
            pending: None,
            origin: Some((parent_depth, entry_len_pos)),
            container_type: None,
            count_hint: None,
            capacity: DEFAULT_ENCODE_CAPACITY,
            initialized: false,
            complete: false,
        }
    }

    /// Sets the cardinality hint. Allowed exactly once, before the header
    /// has been written; note that `summary_data()` writes the header.
    pub fn total_count_hint(&mut self, hint: u16) -> Result<()> {
        if self.initialized || self.complete {
            return Err(CodecError::invalid_usage(
                "Invalid attempt to call total_count_hint() when the container is not empty.",
            ));
        }
        if self.count_hint.is_some() {
            return Err(CodecError::invalid_usage(
                "Invalid attempt to call total_count_hint() more than once.",
            ));
        }
        self.count_hint = Some(hint);
        Ok(())
    }

    /// Attaches summary data and writes the container header around it.
    /// Accepts a value completed by its own encoder or a range lifted from
    /// a decoded message; anything else is rejected. The summary's type
    /// becomes the container's payload type.
    pub fn summary_data(&mut self, summary: Payload<'_>) -> Result<()> {
        if self.initialized || self.complete {
            return Err(CodecError::invalid_usage(
                "Invalid attempt to call summary_data() when the container is not empty.",
            ));
        }
        if self.pending.is_some() {
            return Err(CodecError::invalid_usage(
                "Attempt to summary_data() while the encode iterator is lent to a child encoder.",
            ));
        }
        let (tag, bytes) = match summary {
            Payload::Encoded(enc) => {
                if !enc.is_complete() {
                    return Err(CodecError::invalid_usage(
                        "Attempt to set summary_data() with a container while complete() was not called on it.",
                    ));
                }
                match enc.encoded_bytes() {
                    Some(bytes) => (enc.wire_type(), bytes),
                    None => {
                        return Err(CodecError::invalid_usage(
                            "Attempt to set summary_data() with a container that does not own its encoded bytes.",
                        ))
                    }
                }
            }
            Payload::Decoded(DecodedPayload { wire_type, bytes }) => (wire_type, bytes),
            Payload::None | Payload::Scalar(_) => {
                return Err(CodecError::invalid_usage(
                    "Attempt to pass an empty value to summary_data() while it is not supported.",
                ));
            }
        };
        if bytes.len() > u16::MAX as usize {
            return Err(CodecError::invalid_usage(
                "Summary data exceeds the 65535-byte framing limit.",
            ));
        }
        self.init_container(tag, Some(bytes))
    }

    /// Adds one entry. Series entries are payload-only; the declared tag
    /// must agree with the payload and the established container type.
    pub fn add(&mut self, payload_type: WireType, payload: Payload<'_>) -> Result<()> {
        self.check_mutable("add()")?;
        check_declared_type(payload_type, &payload)?;
        self.check_payload_type(payload_type, "add()")?;

        let body = if payload_type == WireType::NoData {
            EntryBody::None
        } else {
            match payload {
                Payload::None => {
                    return Err(CodecError::invalid_usage(format!(
                        "Attempt to add() a {payload_type} entry without a payload."
                    )))
                }
                Payload::Scalar(s) => EntryBody::Scalar(s),
                Payload::Encoded(enc) => {
                    if !enc.is_complete() {
                        return Err(CodecError::invalid_usage(
                            "Attempt to add() a container while complete() was not called on it.",
                        ));
                    }
                    match enc.encoded_bytes() {
                        Some(bytes) => EntryBody::Bytes(bytes),
                        None => {
                            return Err(CodecError::invalid_usage(
                                "Attempt to add() a container that does not own its encoded bytes.",
                            ))
                        }
                    }
                }
                Payload::Decoded(DecodedPayload { bytes, .. }) => EntryBody::Bytes(bytes),
            }
        };
        if let EntryBody::Bytes(bytes) = &body {
            if bytes.len() > u16::MAX as usize {
                return Err(CodecError::invalid_usage(
                    "Entry payload exceeds the 65535-byte framing limit.",
                ));
            }
        }

        if !self.initialized {
            self.init_container(payload_type, None)?;
        }
        let iter = self.own_iter("add()")?;
        let anchor = iter.position();
        loop {
            match try_write_entry(iter, &body) {
                Ok(()) => break,
                Err(WireRet::BufferTooSmall) => {
                    iter.rollback(anchor);
                    iter.grow();
                }
                Err(ret) => {
                    iter.rollback(anchor);
                    return Err(CodecError::invalid_usage(format!(
                        "Failed to add() while encoding Series. Reason='{}'.",
                        ret.as_str()
                    )));
                }
            }
        }
        if let Some(level) = iter.level_mut() {
            level.count += 1;
        }
        trace!(container_type = %payload_type, "encoded Series entry");
        Ok(())
    }

    /// Opens an entry for in-place child encoding and lends the cursor.
    pub fn begin_entry(&mut self, payload_type: WireType) -> Result<EntryHandle> {
        self.check_mutable("begin_entry()")?;
        if payload_type == WireType::NoData || payload_type == WireType::Msg {
            return Err(CodecError::invalid_usage(
                "Attempt to encode an empty or message-typed entry while it is not supported.",
            ));
        }
        if payload_type.is_scalar() {
            return Err(CodecError::invalid_usage(
                "begin_entry() requires a container payload type; scalars go through add().",
            ));
        }
        self.check_payload_type(payload_type, "begin_entry()")?;
        if !self.initialized {
            self.init_container(payload_type, None)?;
        }

        let iter = self.own_iter("begin_entry()")?;
        let anchor = iter.position();
        let entry_len_pos = loop {
            let len_pos = iter.position();
            match wcheck(iter.write_u16_le(0)) {
                Ok(()) => break len_pos,
                Err(WireRet::BufferTooSmall) => {
                    iter.rollback(anchor);
                    iter.grow();
                }
                Err(ret) => {
                    iter.rollback(anchor);
                    return Err(CodecError::invalid_usage(format!(
                        "Failed to start encoding entry in Series::begin_entry(). Reason='{}'.",
                        ret.as_str()
                    )));
                }
            }
        };
        if let Some(level) = iter.level_mut() {
            level.state = LevelState::EntryOpen;
            level.entry_len_pos = entry_len_pos;
        }
        let depth = iter.depth();
        self.pending = Some(PendingEntry {
            depth,
            entry_len_pos,
        });
        let iter = match self.iter.take() {
            Some(it) => it,
            None => {
                return Err(CodecError::invalid_usage(
                    "Encode iterator is not available for begin_entry().",
                ))
            }
        };
        Ok(EntryHandle::new(iter, depth, entry_len_pos))
    }

    /// Takes the cursor back from a completed child and closes the entry.
    pub fn end_entry(&mut self, done: DoneEntry) -> Result<()> {
        if self.complete {
            return Err(CodecError::invalid_usage(
                "Attempt to end an entry after complete() was called.",
            ));
        }
        let pending = match self.pending {
            Some(p) => p,
            None => {
                return Err(CodecError::invalid_usage(
                    "Attempt to end an entry while none is being encoded.",
                ))
            }
        };
        if done.parent_depth() != pending.depth || done.entry_len_pos() != pending.entry_len_pos {
            return Err(CodecError::invalid_usage(
                "Attempt to end an entry with a token that belongs to a different encoder.",
            ));
        }
        let mut iter = done.into_inner();
        let level_ok = matches!(
            iter.level(),
            Some(level)
                if level.container == WireType::Series
                    && level.state == LevelState::EntryOpen
                    && level.entry_len_pos == pending.entry_len_pos
        );
        if !level_ok {
            return Err(CodecError::invalid_usage(
                "Attempt to end an entry while the child encoding was not completed.",
            ));
        }

        let payload_len = iter.position() - (pending.entry_len_pos + 2);
        if payload_len > u16::MAX as usize {
            return Err(CodecError::invalid_usage(
                "Entry payload exceeds the 65535-byte framing limit.",
            ));
        }
        iter.patch_u16_le(pending.entry_len_pos, payload_len as u16);
        if let Some(level) = iter.level_mut() {
            level.state = LevelState::Entries;
            level.count += 1;
        }
        self.pending = None;
        self.iter = Some(iter);
        Ok(())
    }

    /// Finalizes the container. Idempotent after success.
    pub fn complete(&mut self) -> Result<()> {
        if self.complete {
            return Ok(());
        }
        if self.origin.is_some() {
            return Err(CodecError::invalid_usage(
                "Attempt to complete() a nested encoder; use complete_nested().",
            ));
        }
        self.finish_container()?;
        if let Some(iter) = self.iter.as_mut() {
            let len = iter.position();
            iter.set_encoded_len(len);
        }
        Ok(())
    }

    /// Finalizes a child built over a borrowed cursor and hands the cursor
    /// back toward the lending parent's `end_entry`.
    pub fn complete_nested(mut self) -> Result<DoneEntry> {
        let (parent_depth, entry_len_pos) = match self.origin {
            Some(origin) => origin,
            None => {
                return Err(CodecError::invalid_usage(
                    "Attempt to complete_nested() a root encoder; use complete().",
                ))
            }
        };
        if !self.complete {
            self.finish_container()?;
        }
        let iter = match self.iter.take() {
            Some(it) => it,
            None => {
                return Err(CodecError::invalid_usage(
                    "Encode iterator is not available for complete_nested().",
                ))
            }
        };
        Ok(DoneEntry::new(iter, parent_depth, entry_len_pos))
    }

    fn finish_container(&mut self) -> Result<()> {
        if !self.initialized {
            let tag = self.container_type.unwrap_or(WireType::NoData);
            self.init_container(tag, None)?;
        }
        let iter = self.own_iter("complete()")?;
        match iter.level() {
            Some(level)
                if level.container == WireType::Series && level.state == LevelState::Entries => {}
            Some(level) if level.state == LevelState::EntryOpen => {
                return Err(CodecError::invalid_usage(
                    "Attempt to complete Series while an entry is still being encoded.",
                ));
            }
            _ => {
                return Err(CodecError::invalid_usage(
                    "Attempt to complete Series while its encoding level is not current.",
                ));
            }
        }
        let level = match iter.pop_level() {
            Some(level) => level,
            None => {
                return Err(CodecError::invalid_usage(
                    "Attempt to complete Series while its encoding level is not current.",
                ))
            }
        };
        iter.patch_u16_le(level.count_pos, level.count);
        debug!(entries = level.count, "completed Series encoding");
        self.complete = true;
        Ok(())
    }

    fn check_mutable(&self, method: &str) -> Result<()> {
        if self.complete {
            return Err(CodecError::invalid_usage(format!(
                "Attempt to {method} after complete() was called."
            )));
        }
        if self.pending.is_some() {
            return Err(CodecError::invalid_usage(format!(
                "Attempt to {method} while the encode iterator is lent to a child encoder."
            )));
        }
        Ok(())
    }

    fn check_payload_type(&self, tag: WireType, method: &str) -> Result<()> {
        if let Some(established) = self.container_type {
            if established != tag {
                return Err(CodecError::invalid_usage(format!(
                    "Attempt to {method} an entry with a different payload type. Passed in type is {tag} while the expected type is {established}."
                )));
            }
        }
        Ok(())
    }

    /// Writes the container header, including summary data when present,
    /// re-attempting from the header start after each grow.
    fn init_container(&mut self, tag: WireType, summary: Option<&[u8]>) -> Result<()> {
        if self.iter.is_none() && self.origin.is_none() {
            self.iter = Some(EncodeIterator::with_capacity(self.capacity));
        }
        let count_hint = self.count_hint;
        let iter = self.own_iter("initialize")?;
        let anchor = iter.position();
        let count_pos = loop {
            match try_write_header(iter, tag, count_hint, summary) {
                Ok(count_pos) => break count_pos,
                Err(WireRet::BufferTooSmall) => {
                    iter.rollback(anchor);
                    iter.grow();
                }
                Err(ret) => {
                    iter.rollback(anchor);
                    return Err(CodecError::invalid_usage(format!(
                        "Failed to initialize Series encoding. Reason='{}'.",
                        ret.as_str()
                    )));
                }
            }
        };
        iter.push_level(EncodeLevel {
            container: WireType::Series,
            state: LevelState::Entries,
            count_pos,
            count: 0,
            entry_len_pos: 0,
        });
        self.container_type = Some(tag);
        self.initialized = true;
        Ok(())
    }

    fn own_iter(&mut self, method: &str) -> Result<&mut EncodeIterator> {
        match self.iter.as_mut() {
            Some(iter) => Ok(iter),
            None => Err(CodecError::invalid_usage(format!(
                "Attempt to {method} while the encode iterator is lent to a child encoder."
            ))),
        }
    }

    /// True once `complete()` has succeeded.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The finalized byte range, available after a root-owned `complete()`.
    pub fn encoded_bytes(&self) -> Option<&[u8]> {
        self.iter.as_ref().and_then(|iter| iter.encoded_bytes())
    }
}

impl Default for SeriesEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerEncoder for SeriesEncoder {
    fn wire_type(&self) -> WireType {
        WireType::Series
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn encoded_bytes(&self) -> Option<&[u8]> {
        self.iter.as_ref().and_then(|iter| iter.encoded_bytes())
    }
}

fn try_write_header(
    iter: &mut EncodeIterator,
    tag: WireType,
    count_hint: Option<u16>,
    summary: Option<&[u8]>,
) -> std::result::Result<usize, WireRet> {
    let mut flags = 0u8;
    if count_hint.is_some() {
        flags |= HDR_HAS_COUNT_HINT;
    }
    if summary.is_some() {
        flags |= HDR_HAS_SUMMARY;
    }
    wcheck(iter.write_u8(flags))?;
    wcheck(iter.write_u8(tag as u8))?;
    if let Some(hint) = count_hint {
        wcheck(iter.write_u16_le(hint))?;
    }
    if let Some(summary) = summary {
        wcheck(iter.write_u16_le(summary.len() as u16))?;
        wcheck(iter.write_bytes(summary))?;
    }
    let count_pos = iter.position();
    wcheck(iter.write_u16_le(0))?;
    Ok(count_pos)
}

/// Entry layout: a length-delimited payload, or nothing at all for `NoData`
/// containers, whose entries exist only in the count.
fn try_write_entry(
    iter: &mut EncodeIterator,
    body: &EntryBody<'_>,
) -> std::result::Result<(), WireRet> {
    match body {
        EntryBody::None => Ok(()),
        EntryBody::Bytes(bytes) => {
            wcheck(iter.write_u16_le(bytes.len() as u16))?;
            wcheck(iter.write_bytes(bytes))?;
            Ok(())
        }
        EntryBody::Scalar(scalar) => {
            let len_pos = iter.position();
            wcheck(iter.write_u16_le(0))?;
            wcheck(primitive::encode_scalar(iter, scalar))?;
            let written = iter.position() - (len_pos + 2);
            if written > u16::MAX as usize {
                return Err(WireRet::InvalidData);
            }
            iter.patch_u16_le(len_pos, written as u16);
            Ok(())
        }
    }
}

fn wcheck(ret: WireRet) -> std::result::Result<(), WireRet> {
    match ret {
        WireRet::Success => Ok(()),
        other => Err(other),
    }
}

/// One decoded Series entry.
#[derive(Debug, Clone, Copy)]
pub struct SeriesEntry<'a> {
    payload: &'a [u8],
    payload_type: WireType,
}

impl<'a> SeriesEntry<'a> {
    /// Raw payload bytes; empty for `NoData` containers.
    pub fn payload_bytes(&self) -> &'a [u8] {
        self.payload
    }

    /// The payload as a range ready to re-encode into another container.
    pub fn payload(&self) -> DecodedPayload<'a> {
        DecodedPayload {
            wire_type: self.payload_type,
            bytes: self.payload,
        }
    }
}

/// Lazy decoder counterpart: parses the header and summary eagerly, then
/// produces one entry per `next_entry` call.
#[derive(Debug)]
pub struct SeriesDecoder<'a> {
    container_type: WireType,
    count_hint: Option<u16>,
    summary: Option<&'a [u8]>,
    count: u16,
    yielded: u16,
    iter: DecodeIterator<'a>,
}

impl<'a> SeriesDecoder<'a> {
    /// Positions a decoder over one encoded Series.
    pub fn new(data: &'a [u8], major: u8, minor: u8) -> Result<Self> {
        let mut iter = DecodeIterator::new(data, major, minor)?;
        let flags = read_or_incomplete(iter.read_u8(), &iter)?;
        if flags & !(HDR_HAS_COUNT_HINT | HDR_HAS_SUMMARY) != 0 {
            return Err(CodecError::UnknownData {
                offset: 0,
                detail: "unrecognized Series header flags",
            });
        }
        let tag = read_or_incomplete(iter.read_u8(), &iter)?;
        let container_type = WireType::try_from(tag).map_err(|_| CodecError::UnknownData {
            offset: 1,
            detail: "unrecognized payload type tag",
        })?;
        let count_hint = if flags & HDR_HAS_COUNT_HINT != 0 {
            Some(read_or_incomplete(iter.read_u16_le(), &iter)?)
        } else {
            None
        };
        let summary = if flags & HDR_HAS_SUMMARY != 0 {
            let len = read_or_incomplete(iter.read_u16_le(), &iter)?;
            let summary_start = iter.position();
            let bytes = read_or_incomplete(iter.read_slice(len as usize), &iter)?;
            if container_type.is_scalar() {
                // A scalar summary range must decode cleanly under its tag.
                let mut probe = DecodeIterator::new(bytes, major, minor)?;
                match primitive::probe_scalar(&mut probe, container_type) {
                    (_, ErrorCode::NoError) => {}
                    (_, ErrorCode::IncompleteData) => {
                        return Err(CodecError::IncompleteData {
                            offset: summary_start,
                        })
                    }
                    _ => {
                        return Err(CodecError::UnknownData {
                            offset: summary_start,
                            detail: "malformed summary data",
                        })
                    }
                }
            }
            Some(bytes)
        } else {
            None
        };
        let count = read_or_incomplete(iter.read_u16_le(), &iter)?;
        Ok(SeriesDecoder {
            container_type,
            count_hint,
            summary,
            count,
            yielded: 0,
            iter,
        })
    }

    pub fn container_type(&self) -> WireType {
        self.container_type
    }

    pub fn total_count_hint(&self) -> Option<u16> {
        self.count_hint
    }

    /// The summary range, typed like the entries, ready for re-encoding or
    /// a type-specific decode.
    pub fn summary(&self) -> Option<DecodedPayload<'a>> {
        self.summary.map(|bytes| DecodedPayload {
            wire_type: self.container_type,
            bytes,
        })
    }

    pub fn entry_count(&self) -> u16 {
        self.count
    }

    /// Produces the next entry, or `None` once the promised count has been
    /// yielded.
    pub fn next_entry(&mut self) -> Result<Option<SeriesEntry<'a>>> {
        if self.yielded == self.count {
            return Ok(None);
        }
        let payload = if self.container_type != WireType::NoData {
            let len = read_or_incomplete(self.iter.read_u16_le(), &self.iter)?;
            read_or_incomplete(self.iter.read_slice(len as usize), &self.iter)?
        } else {
            &[][..]
        };
        self.yielded += 1;
        Ok(Some(SeriesEntry {
            payload,
            payload_type: self.container_type,
        }))
    }
}

fn read_or_incomplete<T>(
    res: std::result::Result<T, WireRet>,
    iter: &DecodeIterator<'_>,
) -> Result<T> {
    res.map_err(|_| CodecError::IncompleteData {
        offset: iter.position(),
    })
}
