//! Properties of the full outbound-to-inbound path without a transport.
//!
//! A message is framed, fragmented for an MTU, streamed through the packet
//! decoder one transport unit at a time, reassembled and unframed again.

use bytes::BytesMut;
use proptest::prelude::*;
use sdalink::{
    fragment::{Fragmenter, Mtu, Reassembler, SINGLE_UNIT_BUFFER_LEN},
    packet::PacketCodec,
    serial,
};
use tokio_util::codec::Decoder;

fn message_for_mtu() -> impl Strategy<Value = (u16, Vec<u8>)> {
    (
        Mtu::MIN.get()..=Mtu::MAX.get(),
        proptest::collection::vec(any::<u8>(), 1..=4096),
    )
}

fn carry(message: &[u8], mtu: Mtu, fragmenter: &mut Fragmenter) -> Vec<u8> {
    let framed = serial::frame(message).expect("frame");
    let batch = fragmenter.fragment(framed, mtu).expect("fragment");
    let mut inbound = BytesMut::new();
    let mut reassembler = Reassembler::default();
    let mut completed = None;
    for unit in batch.write_queue().iter() {
        assert!(unit.len() <= mtu.write_unit_len() || unit.len() == SINGLE_UNIT_BUFFER_LEN);
        inbound.extend_from_slice(unit);
        while let Some(packet) = PacketCodec.decode(&mut inbound).expect("decode") {
            if let Some(response) = reassembler.push_packet(packet).expect("reassemble") {
                assert!(completed.is_none(), "one response per message");
                completed = Some(response);
            }
        }
    }
    assert!(inbound.is_empty());
    let response = completed.expect("response completes");
    serial::unframe(response.payload()).expect("unframe").to_vec()
}

proptest! {
    #[test]
    fn messages_survive_the_round_trip((mtu, message) in message_for_mtu()) {
        let mut fragmenter = Fragmenter::new();
        let mtu = Mtu::clamped(mtu);
        prop_assert_eq!(carry(&message, mtu, &mut fragmenter), message);
    }

    #[test]
    fn consecutive_messages_use_fresh_sequences(
        first in proptest::collection::vec(any::<u8>(), 1..600),
        second in proptest::collection::vec(any::<u8>(), 1..600),
    ) {
        let mut fragmenter = Fragmenter::new();
        let before = fragmenter.peek_sequence();
        prop_assert_eq!(carry(&first, Mtu::PREFERRED, &mut fragmenter), first);
        prop_assert_eq!(carry(&second, Mtu::PREFERRED, &mut fragmenter), second);
        prop_assert_ne!(fragmenter.peek_sequence(), before);
    }
}
