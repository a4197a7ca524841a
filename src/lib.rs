//! # WF Codec - Streaming Wire-Format Codec
//!
//! Single-pass binary codec for the wire format (WF) carrying market-data
//! payloads. Containers (filter lists, series) serialize into a compact
//! tag/length/value stream through a growable write buffer; primitive scalar
//! values (unsigned/signed integers, floats, doubles, UTF-8 and JSON ranges)
//! decode back out of a received byte range.
//!
//! ## API Surface
//!
//! - **Container encoding**: [`FilterListEncoder`], [`SeriesEncoder`] own the
//!   header/entry/complete state machine and absorb buffer growth internally.
//! - **Container decoding**: [`FilterListDecoder`], [`SeriesDecoder`] walk an
//!   already-received buffer lazily, one entry per call.
//! - **Primitives**: [`wf::primitive`] holds the stateless per-type
//!   encode/decode functions; [`WfUInt`], [`WfInt`], [`WfFloat`],
//!   [`WfDouble`], [`WfUtf8`], [`WfJson`] wrap one decoded field with its
//!   [`DataCode`], [`ErrorCode`], text rendering and hex dump.
//! - **Nested encoding**: a parent lends its cursor to a child through
//!   [`EntryHandle`] and gets it back through [`DoneEntry`]. Exactly one
//!   encoder owns the cursor at any instant.
//!
//! ## Quick Start
//!
//! ```rust
//! use wf_codec::{EntryAction, FilterListEncoder, Payload, ScalarValue, WireType};
//!
//! let mut list = FilterListEncoder::new();
//! list.total_count_hint(2)?;
//! list.add(1, EntryAction::Set, WireType::UInt, Payload::Scalar(ScalarValue::UInt(42)), &[])?;
//! list.add(2, EntryAction::Clear, WireType::UInt, Payload::None, &[])?;
//! list.complete()?;
//!
//! let bytes = list.encoded_bytes().expect("completed above");
//! assert!(!bytes.is_empty());
//! # Ok::<(), wf_codec::CodecError>(())
//! ```
//!
//! Decoding a primitive field:
//!
//! ```rust
//! use wf_codec::{DataCode, ErrorCode, WfDouble, WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION};
//!
//! // A wire-blank value is a zero-length range: a valid state, not an error.
//! let blank = WfDouble::decode(&[], WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
//! assert_eq!(blank.data_code(), DataCode::Blank);
//! assert_eq!(blank.error_code(), ErrorCode::NoError);
//! assert_eq!(blank.value(), 0.0);
//! ```
//!
//! ## Error Model
//!
//! Encode-side space exhaustion ([`WireRet::BufferTooSmall`]) is absorbed by
//! the grow-and-retry loop inside the container encoders and never crosses a
//! component boundary. Everything else fails fast: state-machine and type
//! violations are [`CodecError::InvalidUsage`], truncated decode input is
//! [`CodecError::IncompleteData`], malformed input is
//! [`CodecError::UnknownData`]. A failed operation never advances the
//! container state machine and never leaves partial bytes behind.

use thiserror::Error;

pub mod wf;

pub use wf::decode_iter::DecodeIterator;
pub use wf::encode_iter::{DoneEntry, EncodeIterator, EntryHandle};
pub use wf::filter_list::{FilterEntry, FilterListDecoder, FilterListEncoder};
pub use wf::series::{SeriesDecoder, SeriesEncoder, SeriesEntry};
pub use wf::value::{WfDouble, WfFloat, WfInt, WfJson, WfUInt, WfUtf8};
pub use wf::{ContainerEncoder, DecodedPayload, EntryAction, Payload, ScalarValue, WireType};

/// Wire-format major version understood by this codec.
pub const WIRE_MAJOR_VERSION: u8 = 1;

/// Wire-format minor version understood by this codec. Minor revisions are
/// additive, so decoders accept any minor under a matching major.
pub const WIRE_MINOR_VERSION: u8 = 0;

/// Initial capacity of an encoder-owned write buffer when the caller does not
/// size it explicitly.
pub const DEFAULT_ENCODE_CAPACITY: usize = 4096;

/// Wire-level return conditions shared by the encode and decode internals.
///
/// These are ordinary values, not errors: `BufferTooSmall` drives the
/// grow-and-retry loop, `BlankData` is a first-class decode outcome. They
/// surface to callers only as the underlying code carried inside a
/// [`CodecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireRet {
    Success,
    /// The write buffer has no room for the attempted write.
    BufferTooSmall,
    /// The byte range ended before the value did.
    IncompleteData,
    /// The range encodes a wire blank.
    BlankData,
    /// The range cannot hold a value of the requested type.
    InvalidData,
    /// The type tag is not one this codec knows how to handle.
    UnsupportedType,
}

impl WireRet {
    /// Stable text name of the return condition, used in failure messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            WireRet::Success => "SUCCESS",
            WireRet::BufferTooSmall => "BUFFER_TOO_SMALL",
            WireRet::IncompleteData => "INCOMPLETE_DATA",
            WireRet::BlankData => "BLANK_DATA",
            WireRet::InvalidData => "INVALID_DATA",
            WireRet::UnsupportedType => "UNSUPPORTED_TYPE",
        }
    }
}

impl std::fmt::Display for WireRet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distinguishes a real decoded value from a wire-level blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataCode {
    /// A value was present on the wire.
    #[default]
    NoCode,
    /// The wire carried the type's blank representation; the native value is
    /// zeroed.
    Blank,
}

/// Decode-side error classification attached to a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCode {
    #[default]
    NoError,
    /// The supplied range was truncated; the caller may retry once more bytes
    /// arrive.
    IncompleteData,
    /// The decode cursor could not be positioned or versioned over the
    /// supplied range at all.
    IteratorSetFailure,
    /// The range is complete but not a valid encoding of the requested type.
    UnknownError,
}

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// The caller violated the container state machine or the
    /// type-consistency rules. Always caller-fixable, never retried.
    #[error("invalid usage: {reason}")]
    InvalidUsage { reason: String },

    /// Decode input ended before the value or entry did.
    #[error("incomplete data at offset {offset}")]
    IncompleteData { offset: usize },

    /// Decode input is malformed or uses an encoding this codec does not
    /// support.
    #[error("malformed data at offset {offset}: {detail}")]
    UnknownData { offset: usize, detail: &'static str },

    /// Text rendering of a decoded value failed or did not fit the scratch
    /// region.
    #[error("conversion failed: {ret}")]
    ConversionFailed { ret: WireRet },

    /// A decode cursor could not be set over the supplied buffer.
    #[error("decode iterator could not be set: {reason}")]
    IteratorSetFailure { reason: &'static str },
}

impl CodecError {
    pub(crate) fn invalid_usage(reason: impl Into<String>) -> Self {
        CodecError::InvalidUsage {
            reason: reason.into(),
        }
    }
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
