//! End-to-end container scenarios: encode, decode, re-serialize.

use wf_codec::{
    CodecError, DataCode, EntryAction, ErrorCode, FilterListDecoder, FilterListEncoder, Payload,
    ScalarValue, SeriesDecoder, SeriesEncoder, WfDouble, WfUInt, WfUtf8, WireType,
    WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION,
};

fn filter_decoder(bytes: &[u8]) -> FilterListDecoder<'_> {
    FilterListDecoder::new(bytes, WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION).unwrap()
}

fn series_decoder(bytes: &[u8]) -> SeriesDecoder<'_> {
    SeriesDecoder::new(bytes, WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION).unwrap()
}

#[test]
fn ten_thousand_entries_from_tiny_buffer_match_presized_buffer() {
    let build = |capacity: usize| {
        let mut series = SeriesEncoder::with_capacity(capacity);
        for i in 0..10_000u64 {
            series
                .add(WireType::UInt, Payload::Scalar(ScalarValue::UInt(i)))
                .unwrap();
        }
        series.complete().unwrap();
        series.encoded_bytes().unwrap().to_vec()
    };

    let from_small = build(64);
    let from_large = build(1 << 20);
    assert_eq!(from_small, from_large);

    let mut dec = series_decoder(&from_small);
    assert_eq!(dec.entry_count(), 10_000);
    let mut seen = 0u64;
    while let Some(entry) = dec.next_entry().unwrap() {
        let value = WfUInt::decode(entry.payload_bytes(), WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
        assert_eq!(value.value(), seen);
        seen += 1;
    }
    assert_eq!(seen, 10_000);
}

#[test]
fn empty_container_encodes_minimal_header_and_decodes_empty() {
    let mut list = FilterListEncoder::new();
    list.complete().unwrap();
    let bytes = list.encoded_bytes().unwrap();

    let mut dec = filter_decoder(bytes);
    assert_eq!(dec.entry_count(), 0);
    assert_eq!(dec.total_count_hint(), None);
    assert!(dec.next_entry().unwrap().is_none());

    let mut series = SeriesEncoder::new();
    series.complete().unwrap();
    let mut dec = series_decoder(series.encoded_bytes().unwrap());
    assert!(dec.summary().is_none());
    assert!(dec.next_entry().unwrap().is_none());
}

#[test]
fn count_hint_clear_entry_and_real_entry_survive_reserialization() {
    let mut original = FilterListEncoder::new();
    original.total_count_hint(3).unwrap();
    original
        .add(1, EntryAction::Clear, WireType::Utf8, Payload::None, &[])
        .unwrap();
    original
        .add(
            2,
            EntryAction::Set,
            WireType::Utf8,
            Payload::Scalar(ScalarValue::Utf8("EUR=")),
            b"acl",
        )
        .unwrap();
    original.complete().unwrap();
    let original_bytes = original.encoded_bytes().unwrap().to_vec();

    // Decode and rebuild from the decoded entries alone.
    let mut dec = filter_decoder(&original_bytes);
    let mut rebuilt = FilterListEncoder::new();
    if let Some(hint) = dec.total_count_hint() {
        rebuilt.total_count_hint(hint).unwrap();
    }
    while let Some(entry) = dec.next_entry().unwrap() {
        rebuilt
            .add(
                entry.id,
                entry.action,
                dec.container_type(),
                Payload::Decoded(entry.payload()),
                entry.permission.unwrap_or(&[]),
            )
            .unwrap();
    }
    rebuilt.complete().unwrap();

    assert_eq!(rebuilt.encoded_bytes().unwrap(), original_bytes.as_slice());
}

#[test]
fn nested_lending_across_families() {
    // A filter list whose entry is a series encoded in place over the lent
    // cursor, with a scalar leaf inside.
    let mut list = FilterListEncoder::with_capacity(16);
    let handle = list
        .begin_entry(5, EntryAction::Update, WireType::Series, &[])
        .unwrap();
    let mut series = SeriesEncoder::nested(handle);
    series
        .add(
            WireType::Double,
            Payload::Scalar(ScalarValue::Double(101.625)),
        )
        .unwrap();
    let done = series.complete_nested().unwrap();
    list.end_entry(done).unwrap();
    list.complete().unwrap();

    let mut dec = filter_decoder(list.encoded_bytes().unwrap());
    assert_eq!(dec.container_type(), WireType::Series);
    let entry = dec.next_entry().unwrap().unwrap();
    assert_eq!(entry.id, 5);
    assert_eq!(entry.action, EntryAction::Update);

    let mut inner = series_decoder(entry.payload_bytes());
    assert_eq!(inner.container_type(), WireType::Double);
    let leaf = inner.next_entry().unwrap().unwrap();
    let value = WfDouble::decode(leaf.payload_bytes(), WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
    assert_eq!(value.value(), 101.625);
    assert_eq!(value.text().unwrap(), "101.625");
}

#[test]
fn completed_root_series_reused_as_summary_and_entries() {
    let mut inner = SeriesEncoder::new();
    inner
        .add(WireType::Utf8, Payload::Scalar(ScalarValue::Utf8("tick")))
        .unwrap();
    inner.complete().unwrap();

    let mut outer = SeriesEncoder::new();
    outer.summary_data(Payload::Encoded(&inner)).unwrap();
    outer.add(WireType::Series, Payload::Encoded(&inner)).unwrap();
    outer.add(WireType::Series, Payload::Encoded(&inner)).unwrap();
    outer.complete().unwrap();

    let mut dec = series_decoder(outer.encoded_bytes().unwrap());
    let summary = dec.summary().unwrap();
    assert_eq!(summary.bytes, inner.encoded_bytes().unwrap());
    let mut entries = 0;
    while let Some(entry) = dec.next_entry().unwrap() {
        assert_eq!(entry.payload_bytes(), inner.encoded_bytes().unwrap());
        entries += 1;
    }
    assert_eq!(entries, 2);
}

#[test]
fn blank_and_error_outcomes_are_distinct() {
    // Wire blank: valid, zeroed, no error.
    let blank = WfUtf8::decode(&[], WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
    assert_eq!(blank.data_code(), DataCode::Blank);
    assert_eq!(blank.error_code(), ErrorCode::NoError);
    assert_eq!(blank.value(), "");

    // Truncated input: retriable error, no value.
    let truncated = WfDouble::decode(&[0x40, 0x59, 0x00], WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
    assert_eq!(truncated.data_code(), DataCode::NoCode);
    assert_eq!(truncated.error_code(), ErrorCode::IncompleteData);

    // Malformed input: a nine-byte integer range cannot be valid.
    let malformed = WfUInt::decode(&[1; 9], WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
    assert_eq!(malformed.error_code(), ErrorCode::UnknownError);
    // The hex dump still renders the undecoded range.
    assert_eq!(malformed.hex_dump(), "010101010101010101");
}

#[test]
fn blank_scalar_entries_travel_through_containers() {
    let mut series = SeriesEncoder::new();
    series
        .add(WireType::UInt, Payload::Scalar(ScalarValue::UInt(61)))
        .unwrap();
    series
        .add(
            WireType::UInt,
            Payload::Scalar(ScalarValue::Blank(WireType::UInt)),
        )
        .unwrap();
    series.complete().unwrap();

    let mut dec = series_decoder(series.encoded_bytes().unwrap());
    let real = dec.next_entry().unwrap().unwrap();
    let real = WfUInt::decode(real.payload_bytes(), WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
    assert_eq!(real.data_code(), DataCode::NoCode);
    assert_eq!(real.value(), 61);

    let blank = dec.next_entry().unwrap().unwrap();
    assert!(blank.payload_bytes().is_empty());
    let blank = WfUInt::decode(blank.payload_bytes(), WIRE_MAJOR_VERSION, WIRE_MINOR_VERSION);
    assert_eq!(blank.data_code(), DataCode::Blank);
    assert_eq!(blank.error_code(), ErrorCode::NoError);
    assert_eq!(blank.value(), 0);
}

#[test]
fn state_violations_leave_encoded_bytes_untouched() {
    let mut list = FilterListEncoder::new();
    list.add(
        1,
        EntryAction::Set,
        WireType::Int,
        Payload::Scalar(ScalarValue::Int(-40)),
        &[],
    )
    .unwrap();
    list.complete().unwrap();
    let bytes_after_complete = list.encoded_bytes().unwrap().to_vec();

    assert!(matches!(
        list.add(
            2,
            EntryAction::Set,
            WireType::Int,
            Payload::Scalar(ScalarValue::Int(7)),
            &[]
        ),
        Err(CodecError::InvalidUsage { .. })
    ));
    assert!(matches!(
        list.total_count_hint(1),
        Err(CodecError::InvalidUsage { .. })
    ));
    list.complete().unwrap();

    assert_eq!(
        list.encoded_bytes().unwrap(),
        bytes_after_complete.as_slice()
    );
}

#[test]
fn filter_entries_with_permission_data_round_trip() {
    let mut list = FilterListEncoder::new();
    for (id, perm) in [(1u8, &b"read"[..]), (2, &b""[..]), (3, &b"trade-desk-7"[..])] {
        list.add(
            id,
            EntryAction::Set,
            WireType::Json,
            Payload::Scalar(ScalarValue::Json(br#"{"level":2}"#)),
            perm,
        )
        .unwrap();
    }
    list.complete().unwrap();

    let mut dec = filter_decoder(list.encoded_bytes().unwrap());
    let e1 = dec.next_entry().unwrap().unwrap();
    assert_eq!(e1.permission, Some(&b"read"[..]));
    let e2 = dec.next_entry().unwrap().unwrap();
    // Empty permission bytes mean no permission data at all.
    assert_eq!(e2.permission, None);
    let e3 = dec.next_entry().unwrap().unwrap();
    assert_eq!(e3.permission, Some(&b"trade-desk-7"[..]));
}

#[test]
fn decoding_with_wrong_major_version_fails_to_position() {
    let mut list = FilterListEncoder::new();
    list.complete().unwrap();
    let bytes = list.encoded_bytes().unwrap();

    let err = FilterListDecoder::new(bytes, WIRE_MAJOR_VERSION + 1, WIRE_MINOR_VERSION).unwrap_err();
    assert!(matches!(err, CodecError::IteratorSetFailure { .. }));
}
