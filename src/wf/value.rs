//! Decoded primitive value objects.
//!
//! Each type wraps one decoded field: the native value, the
//! [`DataCode`]/[`ErrorCode`] pair from the decode, and the undecoded source
//! range, which stays available for hex dumps and for re-encoding the value
//! into another container. Text rendering goes through a fixed 256-byte
//! scratch region and is cached after the first success; a rendering that
//! does not fit reports [`CodecError::ConversionFailed`] instead of
//! truncating.

use std::cell::OnceCell;
use std::fmt;

use super::decode_iter::DecodeIterator;
use super::{primitive, DecodedPayload, WireType};
use crate::{CodecError, DataCode, ErrorCode, Result, WireRet};

/// Capacity of the text-rendering scratch region.
pub const TEXT_SCRATCH_CAPACITY: usize = 256;

/// Rendering of a wire blank.
const BLANK_TEXT: &str = "(blank data)";

struct ScratchWriter {
    buf: [u8; TEXT_SCRATCH_CAPACITY],
    len: usize,
}

impl fmt::Write for ScratchWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.len + s.len() > TEXT_SCRATCH_CAPACITY {
            return Err(fmt::Error);
        }
        self.buf[self.len..self.len + s.len()].copy_from_slice(s.as_bytes());
        self.len += s.len();
        Ok(())
    }
}

/// Renders `args` into the scratch region, failing when it does not fit.
fn render_scratch(args: fmt::Arguments<'_>) -> Result<String> {
    let mut w = ScratchWriter {
        buf: [0; TEXT_SCRATCH_CAPACITY],
        len: 0,
    };
    fmt::write(&mut w, args).map_err(|_| CodecError::ConversionFailed {
        ret: WireRet::BufferTooSmall,
    })?;
    match std::str::from_utf8(&w.buf[..w.len]) {
        Ok(s) => Ok(s.to_owned()),
        Err(_) => Err(CodecError::ConversionFailed {
            ret: WireRet::InvalidData,
        }),
    }
}

/// The wire return code behind a decode-side error, reported by `text()`.
fn underlying_ret(err: ErrorCode) -> WireRet {
    match err {
        ErrorCode::NoError => WireRet::Success,
        ErrorCode::IncompleteData => WireRet::IncompleteData,
        ErrorCode::IteratorSetFailure => WireRet::UnsupportedType,
        ErrorCode::UnknownError => WireRet::InvalidData,
    }
}

/// A decoded unsigned integer field.
#[derive(Debug)]
pub struct WfUInt<'a> {
    value: u64,
    data_code: DataCode,
    error_code: ErrorCode,
    raw: &'a [u8],
    text: OnceCell<String>,
}

impl<'a> WfUInt<'a> {
    /// Decodes one UInt field from `raw` under the given wire version.
    /// Failures are recorded on the value, never panicked.
    pub fn decode(raw: &'a [u8], major: u8, minor: u8) -> Self {
        let (value, data_code, error_code) = match DecodeIterator::new(raw, major, minor) {
            Ok(mut iter) => {
                let (d, e, v) = primitive::decode_uint(&mut iter);
                (v, d, e)
            }
            Err(_) => (0, DataCode::NoCode, ErrorCode::IteratorSetFailure),
        };
        WfUInt {
            value,
            data_code,
            error_code,
            raw,
            text: OnceCell::new(),
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn data_code(&self) -> DataCode {
        self.data_code
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    /// The undecoded source range.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// The source range ready to re-encode into another container.
    pub fn as_payload(&self) -> DecodedPayload<'a> {
        DecodedPayload {
            wire_type: WireType::UInt,
            bytes: self.raw,
        }
    }

    /// Text rendering, computed once and cached.
    pub fn text(&self) -> Result<&str> {
        if let Some(t) = self.text.get() {
            return Ok(t.as_str());
        }
        if self.error_code != ErrorCode::NoError {
            return Err(CodecError::ConversionFailed {
                ret: underlying_ret(self.error_code),
            });
        }
        let rendered = if self.data_code == DataCode::Blank {
            BLANK_TEXT.to_owned()
        } else {
            render_scratch(format_args!("{}", self.value))?
        };
        Ok(self.text.get_or_init(|| rendered).as_str())
    }

    /// Hex rendering of the raw source range. Works regardless of whether
    /// the decode succeeded.
    pub fn hex_dump(&self) -> String {
        hex::encode(self.raw)
    }
}

/// A decoded signed integer field.
#[derive(Debug)]
pub struct WfInt<'a> {
    value: i64,
    data_code: DataCode,
    error_code: ErrorCode,
    raw: &'a [u8],
    text: OnceCell<String>,
}

impl<'a> WfInt<'a> {
    pub fn decode(raw: &'a [u8], major: u8, minor: u8) -> Self {
        let (value, data_code, error_code) = match DecodeIterator::new(raw, major, minor) {
            Ok(mut iter) => {
                let (d, e, v) = primitive::decode_int(&mut iter);
                (v, d, e)
            }
            Err(_) => (0, DataCode::NoCode, ErrorCode::IteratorSetFailure),
        };
        WfInt {
            value,
            data_code,
            error_code,
            raw,
            text: OnceCell::new(),
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn data_code(&self) -> DataCode {
        self.data_code
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn as_payload(&self) -> DecodedPayload<'a> {
        DecodedPayload {
            wire_type: WireType::Int,
            bytes: self.raw,
        }
    }

    pub fn text(&self) -> Result<&str> {
        if let Some(t) = self.text.get() {
            return Ok(t.as_str());
        }
        if self.error_code != ErrorCode::NoError {
            return Err(CodecError::ConversionFailed {
                ret: underlying_ret(self.error_code),
            });
        }
        let rendered = if self.data_code == DataCode::Blank {
            BLANK_TEXT.to_owned()
        } else {
            render_scratch(format_args!("{}", self.value))?
        };
        Ok(self.text.get_or_init(|| rendered).as_str())
    }

    pub fn hex_dump(&self) -> String {
        hex::encode(self.raw)
    }
}

/// A decoded 32-bit float field.
#[derive(Debug)]
pub struct WfFloat<'a> {
    value: f32,
    data_code: DataCode,
    error_code: ErrorCode,
    raw: &'a [u8],
    text: OnceCell<String>,
}

impl<'a> WfFloat<'a> {
    pub fn decode(raw: &'a [u8], major: u8, minor: u8) -> Self {
        let (value, data_code, error_code) = match DecodeIterator::new(raw, major, minor) {
            Ok(mut iter) => {
                let (d, e, v) = primitive::decode_float(&mut iter);
                (v, d, e)
            }
            Err(_) => (0.0, DataCode::NoCode, ErrorCode::IteratorSetFailure),
        };
        WfFloat {
            value,
            data_code,
            error_code,
            raw,
            text: OnceCell::new(),
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn data_code(&self) -> DataCode {
        self.data_code
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn as_payload(&self) -> DecodedPayload<'a> {
        DecodedPayload {
            wire_type: WireType::Float,
            bytes: self.raw,
        }
    }

    pub fn text(&self) -> Result<&str> {
        if let Some(t) = self.text.get() {
            return Ok(t.as_str());
        }
        if self.error_code != ErrorCode::NoError {
            return Err(CodecError::ConversionFailed {
                ret: underlying_ret(self.error_code),
            });
        }
        let rendered = if self.data_code == DataCode::Blank {
            BLANK_TEXT.to_owned()
        } else {
            render_scratch(format_args!("{}", self.value))?
        };
        Ok(self.text.get_or_init(|| rendered).as_str())
    }

    pub fn hex_dump(&self) -> String {
        hex::encode(self.raw)
    }
}

/// A decoded 64-bit double field.
#[derive(Debug)]
pub struct WfDouble<'a> {
    value: f64,
    data_code: DataCode,
    error_code: ErrorCode,
    raw: &'a [u8],
    text: OnceCell<String>,
}

impl<'a> WfDouble<'a> {
    pub fn decode(raw: &'a [u8], major: u8, minor: u8) -> Self {
        let (value, data_code, error_code) = match DecodeIterator::new(raw, major, minor) {
            Ok(mut iter) => {
                let (d, e, v) = primitive::decode_double(&mut iter);
                (v, d, e)
            }
            Err(_) => (0.0, DataCode::NoCode, ErrorCode::IteratorSetFailure),
        };
        WfDouble {
            value,
            data_code,
            error_code,
            raw,
            text: OnceCell::new(),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn data_code(&self) -> DataCode {
        self.data_code
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn as_payload(&self) -> DecodedPayload<'a> {
        DecodedPayload {
            wire_type: WireType::Double,
            bytes: self.raw,
        }
    }

    pub fn text(&self) -> Result<&str> {
        if let Some(t) = self.text.get() {
            return Ok(t.as_str());
        }
        if self.error_code != ErrorCode::NoError {
            return Err(CodecError::ConversionFailed {
                ret: underlying_ret(self.error_code),
            });
        }
        let rendered = if self.data_code == DataCode::Blank {
            BLANK_TEXT.to_owned()
        } else {
            render_scratch(format_args!("{}", self.value))?
        };
        Ok(self.text.get_or_init(|| rendered).as_str())
    }

    pub fn hex_dump(&self) -> String {
        hex::encode(self.raw)
    }
}

/// A decoded UTF-8 string field.
#[derive(Debug)]
pub struct WfUtf8<'a> {
    value: &'a str,
    data_code: DataCode,
    error_code: ErrorCode,
    raw: &'a [u8],
    text: OnceCell<String>,
}

impl<'a> WfUtf8<'a> {
    pub fn decode(raw: &'a [u8], major: u8, minor: u8) -> Self {
        let (value, data_code, error_code) = match DecodeIterator::new(raw, major, minor) {
            Ok(mut iter) => {
                let (d, e, v) = primitive::decode_utf8(&mut iter);
                (v, d, e)
            }
            Err(_) => ("", DataCode::NoCode, ErrorCode::IteratorSetFailure),
        };
        WfUtf8 {
            value,
            data_code,
            error_code,
            raw,
            text: OnceCell::new(),
        }
    }

    pub fn value(&self) -> &'a str {
        self.value
    }

    pub fn data_code(&self) -> DataCode {
        self.data_code
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn as_payload(&self) -> DecodedPayload<'a> {
        DecodedPayload {
            wire_type: WireType::Utf8,
            bytes: self.raw,
        }
    }

    /// Text rendering. A string longer than the scratch region reports
    /// failure rather than truncating.
    pub fn text(&self) -> Result<&str> {
        if let Some(t) = self.text.get() {
            return Ok(t.as_str());
        }
        if self.error_code != ErrorCode::NoError {
            return Err(CodecError::ConversionFailed {
                ret: underlying_ret(self.error_code),
            });
        }
        let rendered = if self.data_code == DataCode::Blank {
            BLANK_TEXT.to_owned()
        } else {
            render_scratch(format_args!("{}", self.value))?
        };
        Ok(self.text.get_or_init(|| rendered).as_str())
    }

    pub fn hex_dump(&self) -> String {
        hex::encode(self.raw)
    }
}

/// A decoded JSON payload field, held as the raw serialized document.
#[derive(Debug)]
pub struct WfJson<'a> {
    value: &'a [u8],
    data_code: DataCode,
    error_code: ErrorCode,
    raw: &'a [u8],
    text: OnceCell<String>,
}

impl<'a> WfJson<'a> {
    pub fn decode(raw: &'a [u8], major: u8, minor: u8) -> Self {
        let (value, data_code, error_code) = match DecodeIterator::new(raw, major, minor) {
            Ok(mut iter) => {
                let (d, e, v) = primitive::decode_json(&mut iter);
                (v, d, e)
            }
            Err(_) => (&[][..], DataCode::NoCode, ErrorCode::IteratorSetFailure),
        };
        WfJson {
            value,
            data_code,
            error_code,
            raw,
            text: OnceCell::new(),
        }
    }

    /// The serialized document bytes.
    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    pub fn data_code(&self) -> DataCode {
        self.data_code
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn as_payload(&self) -> DecodedPayload<'a> {
        DecodedPayload {
            wire_type: WireType::Json,
            bytes: self.raw,
        }
    }

    /// Text rendering of the document. The payload must be valid UTF-8 and
    /// fit the scratch region.
    pub fn text(&self) -> Result<&str> {
        if let Some(t) = self.text.get() {
            return Ok(t.as_str());
        }
        if self.error_code != ErrorCode::NoError {
            return Err(CodecError::ConversionFailed {
                ret: underlying_ret(self.error_code),
            });
        }
        let rendered = if self.data_code == DataCode::Blank {
            BLANK_TEXT.to_owned()
        } else {
            let doc = std::str::from_utf8(self.value).map_err(|_| CodecError::ConversionFailed {
                ret: WireRet::InvalidData,
            })?;
            render_scratch(format_args!("{doc}"))?
        };
        Ok(self.text.get_or_init(|| rendered).as_str())
    }

    /// Parses the payload into a JSON value. A payload that is not a valid
    /// document reports `ConversionFailed`.
    #[cfg(feature = "serialization")]
    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(self.value).map_err(|_| CodecError::ConversionFailed {
            ret: WireRet::InvalidData,
        })
    }

    pub fn hex_dump(&self) -> String {
        hex::encode(self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION};

    fn dec<'a>(raw: &'a [u8]) -> WfUInt<'a> {
        WfUInt::decode(raw, WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION)
    }

    #[test]
    fn test_uint_value_and_text() {
        let v = dec(&[0x01, 0x00]);
        assert_eq!(v.value(), 256);
        assert_eq!(v.data_code(), DataCode::NoCode);
        assert_eq!(v.text().unwrap(), "256");
        // Second call serves the cached rendering.
        assert_eq!(v.text().unwrap(), "256");
    }

    #[test]
    fn test_blank_text_and_zeroed_value() {
        let v = dec(&[]);
        assert_eq!(v.value(), 0);
        assert_eq!(v.data_code(), DataCode::Blank);
        assert_eq!(v.error_code(), ErrorCode::NoError);
        assert_eq!(v.text().unwrap(), "(blank data)");
    }

    #[test]
    fn test_failed_decode_text_reports_conversion_failed() {
        let v = dec(&[0; 9]);
        assert_eq!(v.error_code(), ErrorCode::UnknownError);
        let err = v.text().unwrap_err();
        assert!(matches!(
            err,
            CodecError::ConversionFailed {
                ret: WireRet::InvalidData
            }
        ));
    }

    #[test]
    fn test_hex_dump_independent_of_decode_outcome() {
        let bad = dec(&[0; 9]);
        assert_eq!(bad.hex_dump(), "000000000000000000");

        let good = WfDouble::decode(
            &[0x3F, 0xF0, 0, 0, 0, 0, 0, 0],
            WIRE_MAJOR_VERSION,
            WIRE_MINOR_VERSION,
        );
        assert_eq!(good.value(), 1.0);
        assert_eq!(good.hex_dump(), "3ff0000000000000");
    }

    #[test]
    fn test_version_mismatch_marks_iterator_set_failure() {
        let v = WfFloat::decode(&[0, 0, 0, 0], WIRE_MAJOR_VERSION + 1, 0);
        assert_eq!(v.error_code(), ErrorCode::IteratorSetFailure);
        // The source range was still set, so the hex dump works.
        assert_eq!(v.hex_dump(), "00000000");
        assert!(v.text().is_err());
    }

    #[test]
    fn test_utf8_oversized_rendering_fails() {
        let long = "x".repeat(TEXT_SCRATCH_CAPACITY + 1);
        let v = WfUtf8::decode(long.as_bytes(), WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
        assert_eq!(v.error_code(), ErrorCode::NoError);
        assert_eq!(v.value(), long);
        let err = v.text().unwrap_err();
        assert!(matches!(
            err,
            CodecError::ConversionFailed {
                ret: WireRet::BufferTooSmall
            }
        ));
    }

    #[test]
    fn test_utf8_exact_scratch_fit() {
        let exact = "y".repeat(TEXT_SCRATCH_CAPACITY);
        let v = WfUtf8::decode(exact.as_bytes(), WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
        assert_eq!(v.text().unwrap(), exact);
    }

    #[cfg(feature = "serialization")]
    #[test]
    fn test_json_typed_access() {
        let doc = br#"{"symbol":"EUR=","bid":1.0825}"#;
        let v = WfJson::decode(doc, WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
        let parsed = v.to_value().unwrap();
        assert_eq!(parsed["symbol"], "EUR=");

        let bad = WfJson::decode(b"{not json", WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
        assert_eq!(bad.error_code(), ErrorCode::NoError);
        assert!(bad.to_value().is_err());
        assert_eq!(bad.hex_dump(), hex::encode(b"{not json"));
    }
}
