//! Unit tests for packet encoding, decoding and the stream codec.

use bytes::BytesMut;
use proptest::prelude::*;
use rstest::rstest;
use tokio_util::codec::{Decoder, Encoder};

use super::*;

/// Nonce response captured from firmware: 16-byte payload plus trailer.
const NONCE_RESPONSE: [i8; 25] = [
    0, 73, 16, 16, 0, 0, 0, 0, -65, 3, 27, 113, 14, 115, -25, -60, -47, 20, -53, 1, 2, 2, 0, -1, 0,
];

/// "File Write Complete" operation response captured from firmware.
const OPERATION_RESPONSE: [i8; 36] = [
    1, -111, 27, 27, 0, 0, 0, 0, -65, 4, 83, 70, 105, 108, 101, 32, 87, 114, 105, 116, 101, 32, 67,
    111, 109, 112, 108, 101, 116, 101, 1, 4, 2, 0, -1, -125,
];

fn unsigned(raw: &[i8]) -> Vec<u8> { raw.iter().map(|b| b.to_ne_bytes()[0]).collect() }

fn packet(fragment: u16, more: bool, payload: &[u8]) -> Packet {
    Packet::encode(
        SequenceNumber::new(7),
        fragment,
        more,
        u32::try_from(payload.len()).expect("small payload"),
        false,
        payload.to_vec(),
    )
    .expect("encode packet")
}

#[test]
fn header_layout_matches_firmware() {
    let packet = Packet::encode(SequenceNumber::new(0x2A), 2, true, 500, true, vec![9; 3])
        .expect("encode packet");
    let wire = packet.to_bytes();
    assert_eq!(
        wire.as_ref(),
        &[0x2A, 0b0001_0101, 3, 0xF4, 0x01, 1, 0, 0, 9, 9, 9]
    );
}

#[test]
fn payload_at_ceiling_is_accepted() {
    let packet = packet(1, false, &[0; MAX_PAYLOAD_LEN]);
    assert_eq!(usize::from(packet.packet_length()), MAX_PAYLOAD_LEN);
}

#[rstest]
#[case(MAX_PAYLOAD_LEN + 1)]
#[case(400)]
fn payload_over_ceiling_is_rejected(#[case] len: usize) {
    let err = Packet::encode(SequenceNumber::new(0), 1, false, 0, false, vec![0; len])
        .expect_err("payload too large");
    assert_eq!(err, PacketError::PayloadTooLarge { len });
}

#[test]
fn fragment_number_beyond_five_bits_is_rejected() {
    let err = Packet::encode(SequenceNumber::new(0), 32, false, 1, false, vec![0])
        .expect_err("fragment out of range");
    assert_eq!(err, PacketError::FragmentNumberOutOfRange(32));
}

#[test]
fn total_size_beyond_sixteen_bits_is_rejected() {
    let err = Packet::encode(SequenceNumber::new(0), 1, true, 65_536, false, vec![0])
        .expect_err("total out of range");
    assert_eq!(err, PacketError::TotalSizeOutOfRange(65_536));
}

#[test]
fn decode_ignores_firmware_trailer() {
    let raw = unsigned(&NONCE_RESPONSE);
    let packet = Packet::decode(&raw).expect("decode nonce response");
    assert_eq!(packet.sequence(), SequenceNumber::new(0));
    assert_eq!(packet.fragment_number().get(), 9);
    assert!(!packet.has_more_fragments());
    assert_eq!(packet.total_payload_size(), 16);
    assert_eq!(packet.payload().as_ref(), &raw[8..raw.len() - 1]);
}

#[test]
fn decode_agrees_with_legacy_slice_on_firmware_frames() {
    for raw in [unsigned(&NONCE_RESPONSE), unsigned(&OPERATION_RESPONSE)] {
        let bounded = Packet::decode(&raw).expect("bounded decode");
        let legacy = Packet::decode_legacy(&raw).expect("legacy decode");
        assert_eq!(bounded, legacy);
    }
}

#[test]
fn operation_response_carries_status_text() {
    let packet = Packet::decode(&unsigned(&OPERATION_RESPONSE)).expect("decode");
    assert_eq!(packet.fragment_number().get(), 18);
    let text = &packet.payload()[3..22];
    assert_eq!(text, b"File Write Complete");
}

#[test]
fn legacy_decode_drops_last_byte_of_trailerless_packet() {
    let wire = packet(1, false, b"abc").to_bytes();
    let legacy = Packet::decode_legacy(&wire).expect("legacy decode");
    assert_eq!(legacy.payload().as_ref(), b"ab");
}

#[rstest]
#[case(&[], 0)]
#[case(&[1, 2, 3, 4, 5, 6, 7], 7)]
fn decode_rejects_buffers_shorter_than_header(#[case] raw: &[u8], #[case] len: usize) {
    assert_eq!(Packet::decode(raw), Err(PacketError::TooShort { len }));
}

#[test]
fn decode_rejects_truncated_payload() {
    let raw = [0, 0b1001, 10, 10, 0, 0, 0, 0, 1, 2];
    assert_eq!(
        Packet::decode(&raw),
        Err(PacketError::Truncated {
            declared: 10,
            available: 2
        })
    );
}

#[test]
fn decode_rejects_oversized_length_field() {
    let mut raw = vec![0, 0b1001, 232, 0, 0, 0, 0, 0];
    raw.extend(std::iter::repeat_n(0, 232));
    assert_eq!(
        Packet::decode(&raw),
        Err(PacketError::PayloadTooLarge { len: 232 })
    );
}

#[test]
fn codec_waits_for_complete_packet() {
    let wire = packet(1, false, b"hello").to_bytes();
    let mut codec = PacketCodec;
    let mut buf = BytesMut::from(&wire[..10]);
    assert!(codec.decode(&mut buf).expect("partial decode").is_none());
    buf.extend_from_slice(&wire[10..]);
    let decoded = codec
        .decode(&mut buf)
        .expect("decode")
        .expect("complete packet");
    assert_eq!(decoded.payload().as_ref(), b"hello");
    assert!(buf.is_empty());
}

#[test]
fn codec_splits_back_to_back_packets() {
    let first = packet(1, true, b"abc");
    let second = packet(2, false, b"de");
    let mut codec = PacketCodec;
    let mut buf = BytesMut::new();
    codec.encode(&first, &mut buf).expect("encode first");
    codec.encode(second.clone(), &mut buf).expect("encode second");

    assert_eq!(codec.decode(&mut buf).expect("decode"), Some(first));
    assert_eq!(codec.decode(&mut buf).expect("decode"), Some(second));
    assert_eq!(codec.decode(&mut buf).expect("decode"), None);
}

#[test]
fn codec_reports_invalid_data_for_oversized_length() {
    let mut buf = BytesMut::from(&[0_u8, 1, 250, 0, 0, 0, 0, 0][..]);
    let err = PacketCodec
        .decode(&mut buf)
        .expect_err("oversized length");
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

proptest! {
    #[test]
    fn control_frame_carries_more_flag(fragment in 1u16..=31, more in any::<bool>()) {
        let packet = Packet::encode(SequenceNumber::new(1), fragment, more, 1, false, vec![0])
            .expect("encode");
        prop_assert_eq!(has_more_fragments(packet.control().get()), more);
        prop_assert_eq!(u16::from(packet.fragment_number().get()), fragment);
        prop_assert!(packet.control().has_format_marker());
        prop_assert!(!packet.control().reserved_bit());
    }

    #[test]
    fn decode_inverts_encode(
        seq in any::<u8>(),
        fragment in 0u16..=31,
        more in any::<bool>(),
        total in any::<u16>(),
        payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_LEN),
    ) {
        let packet = Packet::encode(
            SequenceNumber::new(seq),
            fragment,
            more,
            u32::from(total),
            false,
            payload,
        )
        .expect("encode");
        prop_assert_eq!(Packet::decode(&packet.to_bytes()).expect("decode"), packet);
    }
}
