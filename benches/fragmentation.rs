//! Criterion benchmarks for the packet codec and the outbound/inbound paths.
//!
//! Covers packet encode and decode at the largest payload, fragmentation of
//! framed messages at the minimum and preferred MTU, and reassembly of the
//! resulting packets.

use std::hint::black_box;

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput};
use sdalink::{
    fragment::{Fragmenter, Mtu, Reassembler},
    packet::{MAX_PAYLOAD_LEN, Packet, SequenceNumber},
    serial,
};

const MESSAGE_SIZES: [usize; 3] = [46, 512, 4096];

fn benchmark_packet_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet");
    let payload = Bytes::from(vec![0x5a; MAX_PAYLOAD_LEN]);
    group.throughput(Throughput::Bytes(MAX_PAYLOAD_LEN as u64));

    group.bench_function("encode", |b| {
        b.iter(|| {
            let packet = Packet::encode(SequenceNumber::new(1), 1, false, 0, false, payload.clone());
            match packet {
                Ok(packet) => black_box(packet.to_bytes()),
                Err(err) => panic!("encode failed: {err}"),
            }
        });
    });

    let raw = match Packet::encode(SequenceNumber::new(1), 1, false, 0, false, payload) {
        Ok(packet) => packet.to_bytes(),
        Err(err) => panic!("encode failed: {err}"),
    };
    group.bench_function("decode", |b| {
        b.iter(|| black_box(Packet::decode(black_box(&raw))));
    });

    group.finish();
}

fn benchmark_fragment(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragment");
    let mut fragmenter = Fragmenter::new();

    for mtu in [Mtu::MIN, Mtu::PREFERRED] {
        for size in MESSAGE_SIZES {
            let Ok(framed) = serial::frame(&vec![0xa5; size]) else {
                continue;
            };
            if fragmenter.fragment(framed.clone(), mtu).is_err() {
                continue;
            }
            group.throughput(Throughput::Bytes(framed.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("mtu_{}", mtu.get()), size),
                &framed,
                |b, framed| {
                    b.iter(|| black_box(fragmenter.fragment(framed.clone(), mtu)));
                },
            );
        }
    }

    group.finish();
}

fn benchmark_reassemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassemble");
    let mut fragmenter = Fragmenter::new();

    for size in MESSAGE_SIZES {
        let batch = match serial::frame(&vec![0x3c; size])
            .map_err(|err| err.to_string())
            .and_then(|framed| {
                fragmenter
                    .fragment(framed, Mtu::PREFERRED)
                    .map_err(|err| err.to_string())
            }) {
            Ok(batch) => batch,
            Err(err) => panic!("benchmark setup failed: {err}"),
        };
        let notifications: Vec<Bytes> = batch.packets().iter().map(Packet::to_bytes).collect();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &notifications,
            |b, notifications| {
                b.iter(|| {
                    let mut reassembler = Reassembler::default();
                    for raw in notifications {
                        if let Ok(Some(response)) = reassembler.push(raw) {
                            black_box(response);
                        }
                    }
                });
            },
        );
    }

    group.finish();
}

/// Entrypoint for packet, fragmentation and reassembly benchmarks.
fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    benchmark_packet_codec(&mut criterion);
    benchmark_fragment(&mut criterion);
    benchmark_reassemble(&mut criterion);
    criterion.final_summary();
}
