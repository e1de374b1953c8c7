//! General codec invariants (spec.md §8), exercised with `proptest` rather
//! than fixed seed scenarios: round-tripping, chunk-tolerance and the
//! agreement between the three validators and the encoder.

mod invariants;
mod roundtrip;

use crate::codec::{Decoder, EncodeStatus, Encoder};
use crate::packet::internal::Packet;
use crate::types::Version;

/// Drains a freshly-initialized [`Encoder`] into a single contiguous
/// buffer, the way a caller with an unbounded write buffer would.
pub(super) fn encode_full(packet: &Packet, version: Version) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.init_for_packet(packet, version).unwrap();
    let mut out = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        let (n, status) = encoder.service(&mut chunk);
        out.extend_from_slice(&chunk[..n]);
        if status == EncodeStatus::Done {
            break;
        }
    }
    out
}

pub(super) fn decode_all(bytes: &[u8], version: Version) -> Vec<Packet> {
    let mut decoder = Decoder::new(version);
    decoder.decode(bytes).unwrap()
}

pub(super) fn decode_in_chunks(bytes: &[u8], version: Version, chunk_sizes: &[usize]) -> Vec<Packet> {
    let mut decoder = Decoder::new(version);
    let mut packets = Vec::new();
    let mut pos = 0;
    for &size in chunk_sizes {
        if pos >= bytes.len() {
            break;
        }
        let end = (pos + size).min(bytes.len());
        packets.extend(decoder.decode(&bytes[pos..end]).unwrap());
        pos = end;
    }
    if pos < bytes.len() {
        packets.extend(decoder.decode(&bytes[pos..]).unwrap());
    }
    packets
}
