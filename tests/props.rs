//! Property round-trips for the primitive scalar codecs.

use proptest::prelude::*;

use wf_codec::wf::primitive::{
    decode_double, decode_float, decode_int, decode_json, decode_uint, decode_utf8, encode_double,
    encode_float, encode_int, encode_json, encode_uint, encode_utf8,
};
use wf_codec::{
    DataCode, DecodeIterator, EncodeIterator, ErrorCode, WireRet, WIRE_MAJOR_VERSION,
    WIRE_MINOR_VERSION,
};

fn encoded(f: impl FnOnce(&mut EncodeIterator) -> WireRet) -> Vec<u8> {
    // Large enough for any single scalar; growth is exercised elsewhere.
    let mut iter = EncodeIterator::with_capacity(1024);
    assert_eq!(f(&mut iter), WireRet::Success);
    iter.written_bytes().to_vec()
}

fn reader(data: &[u8]) -> DecodeIterator<'_> {
    DecodeIterator::new(data, WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION).unwrap()
}

proptest! {
    #[test]
    fn uint_round_trips(v in any::<u64>()) {
        let bytes = encoded(|it| encode_uint(it, v));
        prop_assert!(bytes.len() <= 8 && !bytes.is_empty());
        let (code, err, out) = decode_uint(&mut reader(&bytes));
        prop_assert_eq!(code, DataCode::NoCode);
        prop_assert_eq!(err, ErrorCode::NoError);
        prop_assert_eq!(out, v);
    }

    #[test]
    fn int_round_trips(v in any::<i64>()) {
        let bytes = encoded(|it| encode_int(it, v));
        prop_assert!(bytes.len() <= 8 && !bytes.is_empty());
        let (code, err, out) = decode_int(&mut reader(&bytes));
        prop_assert_eq!(code, DataCode::NoCode);
        prop_assert_eq!(err, ErrorCode::NoError);
        prop_assert_eq!(out, v);
    }

    #[test]
    fn float_round_trips_bit_exact(v in any::<f32>()) {
        let bytes = encoded(|it| encode_float(it, v));
        prop_assert_eq!(bytes.len(), 4);
        let (_, err, out) = decode_float(&mut reader(&bytes));
        prop_assert_eq!(err, ErrorCode::NoError);
        prop_assert_eq!(out.to_bits(), v.to_bits());
    }

    #[test]
    fn double_round_trips_bit_exact(v in any::<f64>()) {
        let bytes = encoded(|it| encode_double(it, v));
        prop_assert_eq!(bytes.len(), 8);
        let (_, err, out) = decode_double(&mut reader(&bytes));
        prop_assert_eq!(err, ErrorCode::NoError);
        prop_assert_eq!(out.to_bits(), v.to_bits());
    }

    #[test]
    fn utf8_round_trips(s in ".{0,128}") {
        let bytes = encoded(|it| encode_utf8(it, &s));
        let (code, err, out) = decode_utf8(&mut reader(&bytes));
        prop_assert_eq!(err, ErrorCode::NoError);
        // The empty string and the wire blank share a representation.
        if s.is_empty() {
            prop_assert_eq!(code, DataCode::Blank);
        } else {
            prop_assert_eq!(code, DataCode::NoCode);
        }
        prop_assert_eq!(out, s.as_str());
    }

    #[test]
    fn json_round_trips_raw(doc in proptest::collection::vec(any::<u8>(), 1..256)) {
        let bytes = encoded(|it| encode_json(it, &doc));
        let (code, err, out) = decode_json(&mut reader(&bytes));
        prop_assert_eq!(code, DataCode::NoCode);
        prop_assert_eq!(err, ErrorCode::NoError);
        prop_assert_eq!(out, doc.as_slice());
    }

    #[test]
    fn truncated_uint_prefix_never_panics(v in any::<u64>(), cut in 0usize..8) {
        let bytes = encoded(|it| encode_uint(it, v));
        let cut = cut.min(bytes.len());
        let (_, err, _) = decode_uint(&mut reader(&bytes[..cut]));
        // A shorter prefix is still a structurally valid integer range (or
        // blank when cut to nothing); it just decodes a different value.
        prop_assert_eq!(err, ErrorCode::NoError);
    }
}
