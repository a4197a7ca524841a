//! Primitive scalar encoder/decoder pairs.
//!
//! Each function is pure with respect to the value: encoders mutate only the
//! cursor and its buffer, decoders only the read position. Values travel
//! without their own length field; the enclosing entry framing delimits the
//! range, so a decoder consumes whatever the cursor has left.
//!
//! Integers use trimmed big-endian forms: leading bytes that carry no
//! information are dropped, and a zero-length range is the blank
//! representation shared by every scalar type. Decoding a blank yields
//! [`DataCode::Blank`] with a zeroed native value and no error.

use super::decode_iter::DecodeIterator;
use super::encode_iter::EncodeIterator;
use super::{ScalarValue, WireType};
use crate::{DataCode, ErrorCode, WireRet};

/// Encodes an unsigned integer as 1 to 8 big-endian bytes with leading zero
/// bytes trimmed. Zero still occupies one byte; the zero-length form is
/// reserved for blank.
pub fn encode_uint(iter: &mut EncodeIterator, value: u64) -> WireRet {
    let raw = value.to_be_bytes();
    let start = (value.leading_zeros() as usize / 8).min(7);
    iter.write_bytes(&raw[start..])
}

/// Encodes a signed integer in its shortest sign-preserving two's-complement
/// big-endian form.
pub fn encode_int(iter: &mut EncodeIterator, value: i64) -> WireRet {
    let raw = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let sign_bit = raw[start + 1] & 0x80;
        if (raw[start] == 0x00 && sign_bit == 0) || (raw[start] == 0xFF && sign_bit != 0) {
            start += 1;
        } else {
            break;
        }
    }
    iter.write_bytes(&raw[start..])
}

/// Encodes a float as 4 big-endian IEEE-754 bytes.
pub fn encode_float(iter: &mut EncodeIterator, value: f32) -> WireRet {
    iter.write_bytes(&value.to_be_bytes())
}

/// Encodes a double as 8 big-endian IEEE-754 bytes.
pub fn encode_double(iter: &mut EncodeIterator, value: f64) -> WireRet {
    iter.write_bytes(&value.to_be_bytes())
}

/// Encodes a UTF-8 string as its raw bytes. The empty string and the blank
/// representation coincide on the wire; both decode as blank.
pub fn encode_utf8(iter: &mut EncodeIterator, value: &str) -> WireRet {
    iter.write_bytes(value.as_bytes())
}

/// Encodes an already-serialized JSON document as its raw bytes. An empty
/// range is not a JSON document; use [`encode_blank`] for blanks.
pub fn encode_json(iter: &mut EncodeIterator, value: &[u8]) -> WireRet {
    if value.is_empty() {
        return WireRet::InvalidData;
    }
    iter.write_bytes(value)
}

/// Encodes the blank representation: zero payload bytes.
pub fn encode_blank(_iter: &mut EncodeIterator) -> WireRet {
    WireRet::Success
}

/// Dispatches a [`ScalarValue`] to its encoder.
pub(crate) fn encode_scalar(iter: &mut EncodeIterator, value: &ScalarValue<'_>) -> WireRet {
    match value {
        ScalarValue::UInt(v) => encode_uint(iter, *v),
        ScalarValue::Int(v) => encode_int(iter, *v),
        ScalarValue::Float(v) => encode_float(iter, *v),
        ScalarValue::Double(v) => encode_double(iter, *v),
        ScalarValue::Utf8(v) => encode_utf8(iter, v),
        ScalarValue::Json(v) => encode_json(iter, v),
        ScalarValue::Blank(t) if t.is_scalar() => encode_blank(iter),
        ScalarValue::Blank(_) => WireRet::InvalidData,
    }
}

/// Decodes an unsigned integer from the cursor's remaining range.
pub fn decode_uint(iter: &mut DecodeIterator<'_>) -> (DataCode, ErrorCode, u64) {
    match iter.remaining() {
        0 => (DataCode::Blank, ErrorCode::NoError, 0),
        n if n <= 8 => {
            let mut value = 0u64;
            for &b in iter.take_remaining() {
                value = (value << 8) | u64::from(b);
            }
            (DataCode::NoCode, ErrorCode::NoError, value)
        }
        _ => (DataCode::NoCode, ErrorCode::UnknownError, 0),
    }
}

/// Decodes a signed integer, sign-extending from the range's first byte.
pub fn decode_int(iter: &mut DecodeIterator<'_>) -> (DataCode, ErrorCode, i64) {
    match iter.remaining() {
        0 => (DataCode::Blank, ErrorCode::NoError, 0),
        n if n <= 8 => {
            let raw = iter.take_remaining();
            let mut value: i64 = if raw[0] & 0x80 != 0 { -1 } else { 0 };
            for &b in raw {
                value = (value << 8) | i64::from(b);
            }
            (DataCode::NoCode, ErrorCode::NoError, value)
        }
        _ => (DataCode::NoCode, ErrorCode::UnknownError, 0),
    }
}

/// Decodes a float. The wire form is exactly 4 bytes; a shorter range is
/// truncated input, a longer one is malformed.
pub fn decode_float(iter: &mut DecodeIterator<'_>) -> (DataCode, ErrorCode, f32) {
    match iter.remaining() {
        0 => (DataCode::Blank, ErrorCode::NoError, 0.0),
        n if n < 4 => (DataCode::NoCode, ErrorCode::IncompleteData, 0.0),
        4 => match iter.read_f32_be() {
            Ok(v) => (DataCode::NoCode, ErrorCode::NoError, v),
            Err(_) => (DataCode::NoCode, ErrorCode::IncompleteData, 0.0),
        },
        _ => (DataCode::NoCode, ErrorCode::UnknownError, 0.0),
    }
}

/// Decodes a double. The wire form is exactly 8 bytes.
pub fn decode_double(iter: &mut DecodeIterator<'_>) -> (DataCode, ErrorCode, f64) {
    match iter.remaining() {
        0 => (DataCode::Blank, ErrorCode::NoError, 0.0),
        n if n < 8 => (DataCode::NoCode, ErrorCode::IncompleteData, 0.0),
        8 => match iter.read_f64_be() {
            Ok(v) => (DataCode::NoCode, ErrorCode::NoError, v),
            Err(_) => (DataCode::NoCode, ErrorCode::IncompleteData, 0.0),
        },
        _ => (DataCode::NoCode, ErrorCode::UnknownError, 0.0),
    }
}

/// Decodes a UTF-8 range. A sequence that is valid up to the end of the
/// range but cut mid-character is truncated input; an invalid sequence
/// anywhere earlier is malformed.
pub fn decode_utf8<'a>(iter: &mut DecodeIterator<'a>) -> (DataCode, ErrorCode, &'a str) {
    if iter.remaining() == 0 {
        return (DataCode::Blank, ErrorCode::NoError, "");
    }
    let raw = iter.remaining_slice();
    match std::str::from_utf8(raw) {
        Ok(s) => {
            iter.take_remaining();
            (DataCode::NoCode, ErrorCode::NoError, s)
        }
        Err(e) if e.error_len().is_none() => (DataCode::NoCode, ErrorCode::IncompleteData, ""),
        Err(_) => (DataCode::NoCode, ErrorCode::UnknownError, ""),
    }
}

/// Decodes a JSON payload as its raw serialized bytes. Document validity is
/// a rendering concern, checked when the value is converted to text.
pub fn decode_json<'a>(iter: &mut DecodeIterator<'a>) -> (DataCode, ErrorCode, &'a [u8]) {
    if iter.remaining() == 0 {
        return (DataCode::Blank, ErrorCode::NoError, &[]);
    }
    (DataCode::NoCode, ErrorCode::NoError, iter.take_remaining())
}

/// Decodes the scalar type `tag` announces, discarding the native value.
/// Used by container decoders to sanity-check summary ranges; an
/// unrecognized tag reports [`ErrorCode::UnknownError`].
pub(crate) fn probe_scalar(iter: &mut DecodeIterator<'_>, tag: WireType) -> (DataCode, ErrorCode) {
    match tag {
        WireType::UInt => {
            let (d, e, _) = decode_uint(iter);
            (d, e)
        }
        WireType::Int => {
            let (d, e, _) = decode_int(iter);
            (d, e)
        }
        WireType::Float => {
            let (d, e, _) = decode_float(iter);
            (d, e)
        }
        WireType::Double => {
            let (d, e, _) = decode_double(iter);
            (d, e)
        }
        WireType::Utf8 => {
            let (d, e, _) = decode_utf8(iter);
            (d, e)
        }
        WireType::Json => {
            let (d, e, _) = decode_json(iter);
            (d, e)
        }
        _ => (DataCode::NoCode, ErrorCode::UnknownError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION};

    fn encoded(f: impl FnOnce(&mut EncodeIterator) -> WireRet) -> Vec<u8> {
        let mut iter = EncodeIterator::with_capacity(64);
        assert_eq!(f(&mut iter), WireRet::Success);
        iter.written_bytes().to_vec()
    }

    fn reader(data: &[u8]) -> DecodeIterator<'_> {
        DecodeIterator::new(data, WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION).unwrap()
    }

    #[test]
    fn test_uint_trimming() {
        assert_eq!(encoded(|it| encode_uint(it, 0)), vec![0x00]);
        assert_eq!(encoded(|it| encode_uint(it, 0xFF)), vec![0xFF]);
        assert_eq!(encoded(|it| encode_uint(it, 0x100)), vec![0x01, 0x00]);
        assert_eq!(encoded(|it| encode_uint(it, u64::MAX)).len(), 8);
    }

    #[test]
    fn test_int_trimming_preserves_sign() {
        assert_eq!(encoded(|it| encode_int(it, 0)), vec![0x00]);
        assert_eq!(encoded(|it| encode_int(it, -1)), vec![0xFF]);
        assert_eq!(encoded(|it| encode_int(it, 127)), vec![0x7F]);
        // 128 needs a leading zero byte to stay positive.
        assert_eq!(encoded(|it| encode_int(it, 128)), vec![0x00, 0x80]);
        assert_eq!(encoded(|it| encode_int(it, -129)), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_uint_round_trip() {
        for v in [0u64, 1, 255, 256, 65535, 1 << 40, u64::MAX] {
            let bytes = encoded(|it| encode_uint(it, v));
            let (code, err, out) = decode_uint(&mut reader(&bytes));
            assert_eq!(code, DataCode::NoCode);
            assert_eq!(err, ErrorCode::NoError);
            assert_eq!(out, v);
        }
    }

    #[test]
    fn test_int_round_trip() {
        for v in [0i64, 1, -1, 127, 128, -128, -129, i64::MIN, i64::MAX] {
            let bytes = encoded(|it| encode_int(it, v));
            let (_, err, out) = decode_int(&mut reader(&bytes));
            assert_eq!(err, ErrorCode::NoError);
            assert_eq!(out, v);
        }
    }

    #[test]
    fn test_float_double_round_trip() {
        let bytes = encoded(|it| encode_float(it, 3.5));
        assert_eq!(bytes.len(), 4);
        let (_, err, out) = decode_float(&mut reader(&bytes));
        assert_eq!(err, ErrorCode::NoError);
        assert_eq!(out, 3.5);

        let bytes = encoded(|it| encode_double(it, -0.0625));
        assert_eq!(bytes.len(), 8);
        let (_, err, out) = decode_double(&mut reader(&bytes));
        assert_eq!(err, ErrorCode::NoError);
        assert_eq!(out, -0.0625);
    }

    #[test]
    fn test_blank_decodes_as_zeroed_value() {
        let (code, err, v) = decode_uint(&mut reader(&[]));
        assert_eq!((code, err, v), (DataCode::Blank, ErrorCode::NoError, 0));

        let (code, err, v) = decode_double(&mut reader(&[]));
        assert_eq!(code, DataCode::Blank);
        assert_eq!(err, ErrorCode::NoError);
        assert_eq!(v, 0.0);

        let (code, err, s) = decode_utf8(&mut reader(&[]));
        assert_eq!((code, err, s), (DataCode::Blank, ErrorCode::NoError, ""));
    }

    #[test]
    fn test_truncated_float_is_incomplete_not_blank() {
        let (code, err, _) = decode_float(&mut reader(&[0x40, 0x60]));
        assert_eq!(code, DataCode::NoCode);
        assert_eq!(err, ErrorCode::IncompleteData);

        let (_, err, _) = decode_double(&mut reader(&[0; 7]));
        assert_eq!(err, ErrorCode::IncompleteData);
    }

    #[test]
    fn test_overlong_scalar_is_malformed() {
        let (_, err, _) = decode_uint(&mut reader(&[0; 9]));
        assert_eq!(err, ErrorCode::UnknownError);

        let (_, err, _) = decode_float(&mut reader(&[0; 5]));
        assert_eq!(err, ErrorCode::UnknownError);

        let (_, err, _) = decode_double(&mut reader(&[0; 9]));
        assert_eq!(err, ErrorCode::UnknownError);
    }

    #[test]
    fn test_utf8_truncation_vs_corruption() {
        // 0xE2 0x82 is the start of a three-byte sequence cut short.
        let (_, err, s) = decode_utf8(&mut reader(&[0xE2, 0x82]));
        assert_eq!(err, ErrorCode::IncompleteData);
        assert_eq!(s, "");

        // 0xFF can never begin a UTF-8 sequence.
        let (_, err, _) = decode_utf8(&mut reader(&[0xFF, b'a']));
        assert_eq!(err, ErrorCode::UnknownError);

        let bytes = encoded(|it| encode_utf8(it, "käse"));
        let (_, err, s) = decode_utf8(&mut reader(&bytes));
        assert_eq!(err, ErrorCode::NoError);
        assert_eq!(s, "käse");
    }

    #[test]
    fn test_json_raw_round_trip() {
        let doc = br#"{"bid":101.25,"ask":101.75}"#;
        let bytes = encoded(|it| encode_json(it, doc));
        let (code, err, out) = decode_json(&mut reader(&bytes));
        assert_eq!(code, DataCode::NoCode);
        assert_eq!(err, ErrorCode::NoError);
        assert_eq!(out, doc.as_slice());
    }

    #[test]
    fn test_empty_json_rejected_at_encode() {
        let mut iter = EncodeIterator::with_capacity(16);
        assert_eq!(encode_json(&mut iter, &[]), WireRet::InvalidData);
        assert_eq!(iter.position(), 0);
    }

    #[test]
    fn test_encode_out_of_room_reports_without_writing() {
        let mut iter = EncodeIterator::with_capacity(2);
        assert_eq!(encode_double(&mut iter, 1.0), WireRet::BufferTooSmall);
        assert_eq!(iter.position(), 0);
        iter.grow();
        assert_eq!(encode_double(&mut iter, 1.0), WireRet::Success);
    }
}
