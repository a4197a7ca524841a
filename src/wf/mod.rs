//! Wire-format vocabulary and module wiring.
//!
//! The submodules split along the data path: bytes land in
//! [`buffer::GrowBuffer`], every encode call goes through
//! [`encode_iter::EncodeIterator`], containers sit on top in
//! [`filter_list`] and [`series`], and the decode path mirrors it with
//! [`decode_iter::DecodeIterator`], [`primitive`] and [`value`].

use num_enum::TryFromPrimitive;

use crate::{CodecError, Result};

pub mod buffer;
pub mod decode_iter;
pub mod encode_iter;
pub mod filter_list;
pub mod primitive;
pub mod series;
pub mod value;

/// Container header flag: a total-count hint follows the type tag.
pub(crate) const HDR_HAS_COUNT_HINT: u8 = 0x01;
/// Container header flag: summary data follows the hint.
pub(crate) const HDR_HAS_SUMMARY: u8 = 0x02;

/// Entry flag byte: low two bits carry the [`EntryAction`].
pub(crate) const ENTRY_ACTION_MASK: u8 = 0x03;
/// Entry flag byte: permission bytes follow the flags.
pub(crate) const ENTRY_HAS_PERMISSION: u8 = 0x80;

/// Payload type tags used in container headers and entry framing.
///
/// Entries of one container are homogeneous: the tag is established once,
/// from the first entry added or from explicit summary data, and every later
/// entry must match it.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum WireType {
    /// Entries carry no payload bytes at all.
    NoData = 0,
    UInt = 1,
    Int = 2,
    Float = 3,
    Double = 4,
    Utf8 = 5,
    Json = 6,
    FilterList = 16,
    Series = 17,
    /// A full message envelope. Message-typed entries must arrive
    /// pre-encoded; a bare message value is rejected.
    Msg = 18,
}

impl WireType {
    /// True for the scalar leaf types.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            WireType::UInt
                | WireType::Int
                | WireType::Float
                | WireType::Double
                | WireType::Utf8
                | WireType::Json
        )
    }

    /// Display name used in failure messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            WireType::NoData => "NoData",
            WireType::UInt => "UInt",
            WireType::Int => "Int",
            WireType::Float => "Float",
            WireType::Double => "Double",
            WireType::Utf8 => "Utf8",
            WireType::Json => "Json",
            WireType::FilterList => "FilterList",
            WireType::Series => "Series",
            WireType::Msg => "Msg",
        }
    }
}

impl std::fmt::Display for WireType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action recorded on a filter-list entry.
///
/// `Clear` records the action alone; the entry carries no payload bytes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum EntryAction {
    Set = 1,
    Update = 2,
    Clear = 3,
}

/// A scalar value accepted inline as an entry payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue<'a> {
    UInt(u64),
    Int(i64),
    Float(f32),
    Double(f64),
    Utf8(&'a str),
    Json(&'a [u8]),
    /// The blank representation of the given scalar type: zero payload
    /// bytes on the wire.
    Blank(WireType),
}

impl ScalarValue<'_> {
    /// The wire tag this value encodes under.
    pub fn wire_type(&self) -> WireType {
        match self {
            ScalarValue::UInt(_) => WireType::UInt,
            ScalarValue::Int(_) => WireType::Int,
            ScalarValue::Float(_) => WireType::Float,
            ScalarValue::Double(_) => WireType::Double,
            ScalarValue::Utf8(_) => WireType::Utf8,
            ScalarValue::Json(_) => WireType::Json,
            ScalarValue::Blank(t) => *t,
        }
    }
}

/// A byte range lifted out of an already-decoded value, reusable as an entry
/// payload or summary without re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedPayload<'a> {
    pub wire_type: WireType,
    pub bytes: &'a [u8],
}

/// The source of one entry's payload bytes.
///
/// The three non-empty forms mirror the three states an encoding caller can
/// hand over: a value completed by its own encoder, a value lifted from a
/// decoded message, and a scalar encoded inline. Nested encoding of a fresh
/// container goes through `begin_entry` instead, which lends the cursor to
/// the child.
#[derive(Clone, Copy)]
pub enum Payload<'a> {
    /// No payload bytes. Used with `Clear` actions and `NoData` containers.
    None,
    /// A primitive scalar, encoded in place.
    Scalar(ScalarValue<'a>),
    /// A container fully encoded by its own owning encoder. Must have been
    /// completed; an incomplete encoder is rejected.
    Encoded(&'a dyn ContainerEncoder),
    /// A byte range taken from an already-decoded value; copied verbatim.
    Decoded(DecodedPayload<'a>),
}

impl Payload<'_> {
    /// The wire tag intrinsic to the payload source, if it carries one.
    pub(crate) fn intrinsic_type(&self) -> Option<WireType> {
        match self {
            Payload::None => None,
            Payload::Scalar(s) => Some(s.wire_type()),
            Payload::Encoded(e) => Some(e.wire_type()),
            Payload::Decoded(d) => Some(d.wire_type),
        }
    }
}

/// Surface shared by every container-encoder family.
///
/// The family-specific `add` operations stay inherent methods because their
/// signatures differ; this trait carries what parents and payload handling
/// need from any child container.
pub trait ContainerEncoder {
    /// The tag this container encodes under when used as an entry payload.
    fn wire_type(&self) -> WireType;

    /// True once `complete()` has succeeded.
    fn is_complete(&self) -> bool;

    /// The finalized byte range, available after a root-owned `complete()`.
    /// A child completed over a borrowed cursor has no range of its own.
    fn encoded_bytes(&self) -> Option<&[u8]>;
}

/// Checks the declared payload tag against the tag intrinsic to the payload
/// source. Shared by both container families.
pub(crate) fn check_declared_type(declared: WireType, payload: &Payload<'_>) -> Result<()> {
    if let Some(intrinsic) = payload.intrinsic_type() {
        if intrinsic != declared {
            return Err(CodecError::invalid_usage(format!(
                "Declared payload type {declared} does not match the passed in value's type {intrinsic}."
            )));
        }
    }
    Ok(())
}
