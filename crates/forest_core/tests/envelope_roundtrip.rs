mod common;

use forest_core::envelope::{
    DEFAULT_MAX_DEPTH, MARKER, NestedDecoder, decode_envelope, encode_base64, encode_envelope,
    is_pure_base64,
};
use forest_core::header::parse_header;

use common::{RESUME_PREFIX, resume_file, sample_payload};

#[test]
fn plain_resume_file_round_trips_byte_for_byte() {
    let inner = sample_payload();
    let file = resume_file(&inner, false);

    let envelope = decode_envelope(&file).expect("failed to decode envelope");
    assert!(!envelope.is_outer_base64);
    assert_eq!(envelope.inner_payload, inner);
    assert_eq!(&envelope.header_prefix[..RESUME_PREFIX.len()], RESUME_PREFIX);
    assert!(envelope.header_prefix.ends_with(MARKER));
    assert_eq!(encode_envelope(&envelope), file);
}

#[test]
fn outer_base64_resume_file_round_trips() {
    let inner = sample_payload();
    let file = resume_file(&inner, true);
    assert!(is_pure_base64(&file));

    let envelope = decode_envelope(&file).expect("failed to decode envelope");
    assert!(envelope.is_outer_base64);
    assert_eq!(envelope.inner_payload, inner);

    let encoded = encode_envelope(&envelope);
    assert!(is_pure_base64(&encoded));
    let again = decode_envelope(&encoded).expect("failed to decode re-encoded envelope");
    assert_eq!(again, envelope);
}

#[test]
fn decoded_payload_starts_with_a_parseable_header() {
    let file = resume_file(&sample_payload(), true);
    let envelope = decode_envelope(&file).expect("failed to decode envelope");

    let header = parse_header(&envelope.inner_payload).expect("failed to parse header");
    assert_eq!(header.version, "SerV10");
    assert_eq!(header.registered_types, vec!["UnityEngine.Transform"]);
    assert_eq!(header.registered_properties, vec!["position", "_hp"]);
}

#[test]
fn full_decode_of_a_wrapped_file_matches_the_inner_payload_in_place() {
    let inner = b"\x00\x01binary \xffpayload".to_vec();
    let file = resume_file(&inner, true);

    let decoded = NestedDecoder::default().decode(&file);
    let mut expected = RESUME_PREFIX.to_vec();
    expected.extend_from_slice(&inner);
    assert_eq!(decoded, expected);
}

#[test]
fn line_wrapped_outer_layer_is_accepted() {
    let inner = sample_payload();
    let file = resume_file(&inner, true);
    let wrapped: Vec<u8> = file
        .chunks(76)
        .flat_map(|line| line.iter().copied().chain(*b"\r\n"))
        .collect();

    let envelope = decode_envelope(&wrapped).expect("failed to decode wrapped envelope");
    assert_eq!(envelope.inner_payload, inner);
}

#[test]
fn every_layer_stays_pure_base64_up_to_the_depth_bound() {
    let mut layer = sample_payload();
    for _ in 0..DEFAULT_MAX_DEPTH {
        layer = encode_base64(&layer).into_bytes();
        assert!(is_pure_base64(&layer));
    }
    assert_eq!(NestedDecoder::default().decode(&layer), sample_payload());
}
