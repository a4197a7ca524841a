//! # FilterList - id/action container family
//!
//! ## Purpose
//!
//! Encodes an ordered sequence of identified, action-carrying entries over a
//! homogeneous payload type, single-pass into a growable buffer. The header
//! is emitted lazily: the payload type is learned from the first entry, not
//! declared up front. Space exhaustion never surfaces; every header and
//! entry write sits inside a grow-and-retry loop that re-attempts the write
//! from its recorded start after reallocation.
//!
//! ## State machine
//!
//! `Clear` on construction; `Initialized` once the first successful header
//! write lands (triggered by the first `add`/`begin_entry`); `Complete`
//! after `complete()`, which back-patches the entry count. `Complete` is
//! terminal: later mutation fails with `InvalidUsage` and leaves the
//! encoded bytes untouched. `complete()` itself is idempotent.
//!
//! ## Entry payloads
//!
//! An entry payload arrives one of four ways: absent (`Clear` actions and
//! `NoData` containers), a scalar encoded inline, a byte range from a
//! container completed by its own encoder, or a byte range lifted from a
//! decoded message. A fresh container that still needs encoding goes
//! through `begin_entry`, which lends the cursor to the child and leaves
//! the entry length to be back-patched by `end_entry`.

use tracing::{debug, trace};

use super::decode_iter::DecodeIterator;
use super::encode_iter::{DoneEntry, EncodeIterator, EncodeLevel, EntryHandle, LevelState};
use super::{
    check_declared_type, primitive, ContainerEncoder, DecodedPayload, EntryAction, Payload,
    ScalarValue, WireType, ENTRY_ACTION_MASK, ENTRY_HAS_PERMISSION, HDR_HAS_COUNT_HINT,
};
use crate::{CodecError, Result, WireRet, DEFAULT_ENCODE_CAPACITY};

/// Source of the bytes written inside one entry's payload field.
enum EntryBody<'a> {
    None,
    Bytes(&'a [u8]),
    Scalar(ScalarValue<'a>),
}

/// Anchors of the entry currently on loan to a child encoder.
#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    depth: usize,
    entry_len_pos: usize,
}

/// Streaming encoder for the FilterList container family.
pub struct FilterListEncoder {
    iter: Option<EncodeIterator>,
    /// Set while the cursor is on loan through an [`EntryHandle`].
    pending: Option<PendingEntry>,
    /// Parent depth and entry-length anchor when this encoder was built over
    /// a borrowed cursor.
    origin: Option<(usize, usize)>,
    container_type: Option<WireType>,
    count_hint: Option<u16>,
    capacity: usize,
    initialized: bool,
    complete: bool,
}

impl FilterListEncoder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ENCODE_CAPACITY)
    }

    /// Starts a root encoder whose buffer begins at `capacity` bytes. The
    /// final bytes are independent of the starting size.
    pub fn with_capacity(capacity: usize) -> Self {
        FilterListEncoder {
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
    /// The finished child must flow back through [`complete_nested`] and
    /// the parent's `end_entry`.
    ///
    /// [`complete_nested`]: FilterListEncoder::complete_nested
    pub fn nested(handle: EntryHandle) -> Self {
        let parent_depth = handle.parent_depth();
        let entry_len_pos = handle.entry_len_pos();
        FilterListEncoder {
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

    /// Sets the cardinality hint carried in the header. Allowed exactly
    /// once, and only before the header has been written.
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

    /// Adds one entry. `payload_type` is the declared tag; it must agree
    /// with the tag intrinsic to `payload` and with the container's
    /// established type. A failed add never advances the state machine and
    /// never changes the encoded length.
    pub fn add(
        &mut self,
        id: u8,
        action: EntryAction,
        payload_type: WireType,
        payload: Payload<'_>,
        permission: &[u8],
    ) -> Result<()> {
        self.check_mutable("add()")?;
        check_declared_type(payload_type, &payload)?;
        self.check_payload_type(payload_type, "add()")?;
        check_permission_len(permission)?;

        let body = if action == EntryAction::Clear || payload_type == WireType::NoData {
            // The action alone is recorded; any payload source only
            // contributed its type tag.
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
            check_payload_len(bytes.len())?;
        }

        self.ensure_initialized(payload_type)?;
        self.write_entry(id, action, permission, body, "add()")
    }

    /// Opens an entry whose payload a child encoder will produce in place,
    /// and lends the cursor to that child. Scalar, `NoData` and
    /// message-typed payloads have no child encoder and are rejected.
    pub fn begin_entry(
        &mut self,
        id: u8,
        action: EntryAction,
        payload_type: WireType,
        permission: &[u8],
    ) -> Result<EntryHandle> {
        self.check_mutable("begin_entry()")?;
        if action == EntryAction::Clear {
            return Err(CodecError::invalid_usage(
                "Clear entries carry no payload; record them with add().",
            ));
        }
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
        check_permission_len(permission)?;
        self.ensure_initialized(payload_type)?;

        let iter = self.own_iter("begin_entry()")?;
        let anchor = iter.position();
        let entry_len_pos = loop {
            match try_write_entry_prefix(iter, id, action, permission, true) {
                Ok(len_pos) => break len_pos,
                Err(WireRet::BufferTooSmall) => {
                    iter.rollback(anchor);
                    iter.grow();
                }
                Err(ret) => {
                    iter.rollback(anchor);
                    return Err(CodecError::invalid_usage(format!(
                        "Failed to start encoding entry in FilterList::begin_entry(). Reason='{}'.",
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

    /// Takes the cursor back from a completed child, back-patches the entry
    /// length and closes the entry. The token must be the one produced for
    /// this encoder's open entry.
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
                if level.container == WireType::FilterList
                    && level.state == LevelState::EntryOpen
                    && level.entry_len_pos == pending.entry_len_pos
        );
        if !level_ok {
            return Err(CodecError::invalid_usage(
                "Attempt to end an entry while the child encoding was not completed.",
            ));
        }

        let payload_len = iter.position() - (pending.entry_len_pos + 2);
        check_payload_len(payload_len)?;
        iter.patch_u16_le(pending.entry_len_pos, payload_len as u16);
        if let Some(level) = iter.level_mut() {
            level.state = LevelState::Entries;
            level.count += 1;
        }
        self.pending = None;
        self.iter = Some(iter);
        Ok(())
    }

    /// Finalizes the container: writes an empty header when nothing was
    /// added, back-patches the entry count and records the final encoded
    /// length. Idempotent after success.
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
            // Nothing was added: an empty container still gets its minimal
            // header before the count is patched.
            let tag = self.container_type.unwrap_or(WireType::NoData);
            self.ensure_initialized(tag)?;
        }
        let iter = self.own_iter("complete()")?;
        match iter.level() {
            Some(level)
                if level.container == WireType::FilterList
                    && level.state == LevelState::Entries => {}
            Some(level) if level.state == LevelState::EntryOpen => {
                return Err(CodecError::invalid_usage(
                    "Attempt to complete FilterList while an entry is still being encoded.",
                ));
            }
            _ => {
                return Err(CodecError::invalid_usage(
                    "Attempt to complete FilterList while its encoding level is not current.",
                ));
            }
        }
        let level = match iter.pop_level() {
            Some(level) => level,
            None => {
                return Err(CodecError::invalid_usage(
                    "Attempt to complete FilterList while its encoding level is not current.",
                ))
            }
        };
        iter.patch_u16_le(level.count_pos, level.count);
        debug!(entries = level.count, "completed FilterList encoding");
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

    /// Writes the container header on the first mutating call, re-attempting
    /// from the header start after each grow.
    fn ensure_initialized(&mut self, tag: WireType) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if self.iter.is_none() && self.origin.is_none() {
            self.iter = Some(EncodeIterator::with_capacity(self.capacity));
        }
        let count_hint = self.count_hint;
        let iter = self.own_iter("initialize")?;
        let anchor = iter.position();
        let count_pos = loop {
            match try_write_header(iter, tag, count_hint) {
                Ok(count_pos) => break count_pos,
                Err(WireRet::BufferTooSmall) => {
                    // Abort the partial header so the cursor is consistent,
                    // then grow and re-attempt from scratch.
                    iter.rollback(anchor);
                    iter.grow();
                }
                Err(ret) => {
                    iter.rollback(anchor);
                    return Err(CodecError::invalid_usage(format!(
                        "Failed to initialize FilterList encoding. Reason='{}'.",
                        ret.as_str()
                    )));
                }
            }
        };
        iter.push_level(EncodeLevel {
            container: WireType::FilterList,
            state: LevelState::Entries,
            count_pos,
            count: 0,
            entry_len_pos: 0,
        });
        self.container_type = Some(tag);
        self.initialized = true;
        Ok(())
    }

    fn write_entry(
        &mut self,
        id: u8,
        action: EntryAction,
        permission: &[u8],
        body: EntryBody<'_>,
        method: &str,
    ) -> Result<()> {
        let container_type = self.container_type.unwrap_or(WireType::NoData);
        let iter = self.own_iter(method)?;
        let anchor = iter.position();
        loop {
            match try_write_entry(iter, id, action, permission, &body) {
                Ok(()) => break,
                Err(WireRet::BufferTooSmall) => {
                    iter.rollback(anchor);
                    iter.grow();
                }
                Err(ret) => {
                    iter.rollback(anchor);
                    return Err(CodecError::invalid_usage(format!(
                        "Failed to {method} while encoding FilterList. Reason='{}'.",
                        ret.as_str()
                    )));
                }
            }
        }
        if let Some(level) = iter.level_mut() {
            level.count += 1;
        }
        trace!(id, container_type = %container_type, "encoded FilterList entry");
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

impl Default for FilterListEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerEncoder for FilterListEncoder {
    fn wire_type(&self) -> WireType {
        WireType::FilterList
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn encoded_bytes(&self) -> Option<&[u8]> {
        self.iter.as_ref().and_then(|iter| iter.encoded_bytes())
    }
}

/// Header layout: flags, payload type tag, optional count hint, then the
/// u16 entry count that `complete()` back-patches. Returns the count
/// position.
fn try_write_header(
    iter: &mut EncodeIterator,
    tag: WireType,
    count_hint: Option<u16>,
) -> std::result::Result<usize, WireRet> {
    let mut flags = 0u8;
    if count_hint.is_some() {
        flags |= HDR_HAS_COUNT_HINT;
    }
    wcheck(iter.write_u8(flags))?;
    wcheck(iter.write_u8(tag as u8))?;
    if let Some(hint) = count_hint {
        wcheck(iter.write_u16_le(hint))?;
    }
    let count_pos = iter.position();
    wcheck(iter.write_u16_le(0))?;
    Ok(count_pos)
}

fn try_write_entry(
    iter: &mut EncodeIterator,
    id: u8,
    action: EntryAction,
    permission: &[u8],
    body: &EntryBody<'_>,
) -> std::result::Result<(), WireRet> {
    match body {
        // Prefix only; the entry records the id/action/permission and the
        // payload length field is omitted entirely.
        EntryBody::None => {
            try_write_entry_prefix(iter, id, action, permission, false)?;
            Ok(())
        }
        EntryBody::Bytes(bytes) => {
            let len_pos = try_write_entry_prefix(iter, id, action, permission, true)?;
            wcheck(iter.write_bytes(bytes))?;
            iter.patch_u16_le(len_pos, bytes.len() as u16);
            Ok(())
        }
        EntryBody::Scalar(scalar) => {
            let len_pos = try_write_entry_prefix(iter, id, action, permission, true)?;
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

/// Entry prefix: id, flag byte, optional permission bytes, and the payload
/// length placeholder when a payload follows. Returns the placeholder
/// position (zero when no payload field was written).
fn try_write_entry_prefix(
    iter: &mut EncodeIterator,
    id: u8,
    action: EntryAction,
    permission: &[u8],
    with_payload: bool,
) -> std::result::Result<usize, WireRet> {
    let mut flags = action as u8;
    if !permission.is_empty() {
        flags |= ENTRY_HAS_PERMISSION;
    }
    wcheck(iter.write_u8(id))?;
    wcheck(iter.write_u8(flags))?;
    if !permission.is_empty() {
        wcheck(iter.write_u16_le(permission.len() as u16))?;
        wcheck(iter.write_bytes(permission))?;
    }
    if !with_payload {
        return Ok(0);
    }
    let len_pos = iter.position();
    wcheck(iter.write_u16_le(0))?;
    Ok(len_pos)
}

fn wcheck(ret: WireRet) -> std::result::Result<(), WireRet> {
    match ret {
        WireRet::Success => Ok(()),
        other => Err(other),
    }
}

fn check_permission_len(permission: &[u8]) -> Result<()> {
    if permission.len() > u16::MAX as usize {
        return Err(CodecError::invalid_usage(
            "Permission data exceeds the 65535-byte framing limit.",
        ));
    }
    Ok(())
}

fn check_payload_len(len: usize) -> Result<()> {
    if len > u16::MAX as usize {
        return Err(CodecError::invalid_usage(
            "Entry payload exceeds the 65535-byte framing limit.",
        ));
    }
    Ok(())
}

/// One decoded FilterList entry.
#[derive(Debug, Clone, Copy)]
pub struct FilterEntry<'a> {
    pub id: u8,
    pub action: EntryAction,
    pub permission: Option<&'a [u8]>,
    payload: &'a [u8],
    payload_type: WireType,
}

impl<'a> FilterEntry<'a> {
    /// Raw payload bytes; empty for `Clear` actions and `NoData` containers.
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

/// Lazy decoder counterpart: parses the header eagerly, then produces one
/// entry per `next_entry` call from the received buffer.
#[derive(Debug)]
pub struct FilterListDecoder<'a> {
    container_type: WireType,
    count_hint: Option<u16>,
    count: u16,
    yielded: u16,
    iter: DecodeIterator<'a>,
}

impl<'a> FilterListDecoder<'a> {
    /// Positions a decoder over one encoded FilterList.
    pub fn new(data: &'a [u8], major: u8, minor: u8) -> Result<Self> {
        let mut iter = DecodeIterator::new(data, major, minor)?;
        let flags = read_or_incomplete(iter.read_u8(), &iter)?;
        if flags & !HDR_HAS_COUNT_HINT != 0 {
            return Err(CodecError::UnknownData {
                offset: 0,
                detail: "unrecognized FilterList header flags",
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
        let count = read_or_incomplete(iter.read_u16_le(), &iter)?;
        Ok(FilterListDecoder {
            container_type,
            count_hint,
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

    /// Number of entries the header promises.
    pub fn entry_count(&self) -> u16 {
        self.count
    }

    /// Produces the next entry, or `None` once the promised count has been
    /// yielded. Truncation inside an entry reports `IncompleteData` with the
    /// failing offset.
    pub fn next_entry(&mut self) -> Result<Option<FilterEntry<'a>>> {
        if self.yielded == self.count {
            return Ok(None);
        }
        let id = read_or_incomplete(self.iter.read_u8(), &self.iter)?;
        let flags = read_or_incomplete(self.iter.read_u8(), &self.iter)?;
        if flags & !(ENTRY_ACTION_MASK | ENTRY_HAS_PERMISSION) != 0 {
            return Err(CodecError::UnknownData {
                offset: self.iter.position() - 1,
                detail: "unrecognized FilterList entry flags",
            });
        }
        let action = EntryAction::try_from(flags & ENTRY_ACTION_MASK).map_err(|_| {
            CodecError::UnknownData {
                offset: self.iter.position() - 1,
                detail: "unrecognized FilterList entry action",
            }
        })?;
        let permission = if flags & ENTRY_HAS_PERMISSION != 0 {
            let len = read_or_incomplete(self.iter.read_u16_le(), &self.iter)?;
            Some(read_or_incomplete(
                self.iter.read_slice(len as usize),
                &self.iter,
            )?)
        } else {
            None
        };
        let payload = if action != EntryAction::Clear && self.container_type != WireType::NoData {
            let len = read_or_incomplete(self.iter.read_u16_le(), &self.iter)?;
            read_or_incomplete(self.iter.read_slice(len as usize), &self.iter)?
        } else {
            &[][..]
        };
        self.yielded += 1;
        Ok(Some(FilterEntry {
            id,
            action,
            permission,
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
