//! Tests for inbound reassembly, limits and payload delimiting.

use std::num::NonZeroUsize;

use bytes::{BufMut, Bytes, BytesMut};
use log::Level;
use rstest::rstest;
use sdalink_testing::logger;

use crate::{
    fragment::{
        FragmentationConfig,
        Fragmenter,
        Mtu,
        PayloadBounds,
        Reassembler,
        ReassemblyError,
    },
    packet::{Packet, PacketError, SequenceNumber},
};

fn notification(sequence: u8, fragment: u16, more: bool, total: u32, payload: &[u8]) -> Bytes {
    let packet = Packet::encode(
        SequenceNumber::new(sequence),
        fragment,
        more,
        total,
        false,
        payload.to_vec(),
    )
    .expect("encode");
    let mut buf = BytesMut::from(packet.to_bytes().as_ref());
    // Firmware trailer.
    buf.put_u8(0x83);
    buf.freeze()
}

#[test]
fn single_notification_is_a_complete_response() {
    let mut reassembler = Reassembler::default();
    let response = reassembler
        .push(&notification(3, 9, false, 4, b"done"))
        .expect("push")
        .expect("complete");
    assert_eq!(response.payload().as_ref(), b"done");
    assert_eq!(response.fragments(), 1);
    assert_eq!(response.sequence(), SequenceNumber::new(3));
    assert!(!reassembler.is_pending());
}

#[test]
fn fragments_accumulate_until_more_flag_clears() {
    let mut reassembler = Reassembler::default();
    // Device fragment numbers are not contiguous.
    assert!(
        reassembler
            .push(&notification(1, 9, true, 9, b"file "))
            .expect("first")
            .is_none()
    );
    assert!(reassembler.is_pending());
    let response = reassembler
        .push(&notification(1, 18, false, 9, b"data"))
        .expect("second")
        .expect("complete");
    assert_eq!(response.payload().as_ref(), b"file data");
    assert_eq!(response.fragments(), 2);
    assert_eq!(response.declared_total(), 9);
}

#[test]
fn reassembles_fragmenter_output() {
    let message: Vec<u8> = (0..=u8::MAX).cycle().take(700).collect();
    let batch = Fragmenter::new()
        .fragment(message.clone(), Mtu::PREFERRED)
        .expect("fragment");
    let mut reassembler = Reassembler::default();
    let mut completed = None;
    for packet in batch.packets() {
        completed = reassembler.push(&packet.to_bytes()).expect("push");
    }
    let response = completed.expect("last packet completes");
    assert_eq!(response.payload().as_ref(), message.as_slice());
}

#[test]
fn sequence_mismatch_discards_partial_response() {
    let mut reassembler = Reassembler::default();
    reassembler
        .push(&notification(5, 1, true, 6, b"abc"))
        .expect("first");
    let err = reassembler
        .push(&notification(6, 2, false, 6, b"def"))
        .expect_err("mismatch");
    assert_eq!(
        err,
        ReassemblyError::SequenceMismatch {
            expected: SequenceNumber::new(5),
            found: SequenceNumber::new(6),
        }
    );
    assert!(!reassembler.is_pending());
}

#[test]
fn response_size_is_capped() {
    let limit = NonZeroUsize::new(8).expect("non-zero");
    let mut reassembler = Reassembler::new(FragmentationConfig {
        max_response_size: limit,
        ..FragmentationConfig::default()
    });
    reassembler
        .push(&notification(0, 1, true, 10, b"12345"))
        .expect("first");
    let err = reassembler
        .push(&notification(0, 2, false, 10, b"67890"))
        .expect_err("too large");
    assert_eq!(
        err,
        ReassemblyError::MessageTooLarge {
            attempted: 10,
            limit
        }
    );
    assert!(!reassembler.is_pending());
}

#[test]
fn malformed_notification_resets_state() {
    let mut reassembler = Reassembler::default();
    reassembler
        .push(&notification(0, 1, true, 10, b"12345"))
        .expect("first");
    let err = reassembler.push(&[1, 2, 3]).expect_err("too short");
    assert_eq!(err, ReassemblyError::Packet(PacketError::TooShort { len: 3 }));
    assert!(!reassembler.is_pending());
}

#[test]
fn reset_drops_partial_response() {
    let mut reassembler = Reassembler::default();
    reassembler
        .push(&notification(0, 1, true, 10, b"12345"))
        .expect("first");
    reassembler.reset();
    let response = reassembler
        .push(&notification(1, 1, false, 2, b"ok"))
        .expect("push")
        .expect("complete");
    assert_eq!(response.payload().as_ref(), b"ok");
}

#[rstest]
#[case::header_length(PayloadBounds::HeaderLength)]
#[case::drop_trailing_byte(PayloadBounds::DropTrailingByte)]
fn both_bounds_agree_on_firmware_frames(#[case] bounds: PayloadBounds) {
    let mut reassembler = Reassembler::new(FragmentationConfig {
        payload_bounds: bounds,
        ..FragmentationConfig::default()
    });
    let response = reassembler
        .push(&notification(2, 1, false, 5, b"hello"))
        .expect("push")
        .expect("complete");
    assert_eq!(response.payload().as_ref(), b"hello");
}

#[test]
fn total_size_mismatch_is_accepted_with_warning() {
    let mut log = logger();
    log.clear();
    let mut reassembler = Reassembler::default();
    let response = reassembler
        .push(&notification(4, 1, false, 99, b"short"))
        .expect("push")
        .expect("complete");
    assert_eq!(response.payload().len(), 5);

    let mut found = false;
    while let Some(record) = log.pop() {
        let message = record.args().to_string();
        if record.level() == Level::Warn
            && message.contains("received=5")
            && message.contains("declared=99")
        {
            found = true;
        }
    }
    assert!(found, "expected total size warning");
}
