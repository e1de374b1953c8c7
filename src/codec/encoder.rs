//! The restartable binary-packet encoder (spec.md §4.C).
//!
//! `init_for_packet` performs the exactly-once internal→binary conversion
//! and serializes the whole packet into an internal buffer; `service`
//! copies as much of that buffer as fits into the caller-supplied output
//! view, the way the teacher's `GenericPollPacketState` services a caller
//! buffer in chunks rather than requiring one big contiguous write.

use crate::error::Error;
use crate::packet::binary::{
    BinaryConnack, BinaryConnect, BinaryDisconnect, BinaryPacket, BinaryPuback, BinaryPublish,
    BinarySuback, BinarySubscribe, BinaryUnsuback, BinaryUnsubscribe,
};
use crate::packet::internal::Packet;
use crate::types::Version;
use crate::vli::{write_bytes, write_u16, write_u8, write_var_int};

const CONNECT: u8 = 1;
const CONNACK: u8 = 2;
const PUBLISH: u8 = 3;
const PUBACK: u8 = 4;
const SUBSCRIBE: u8 = 8;
const SUBACK: u8 = 9;
const UNSUBSCRIBE: u8 = 10;
const UNSUBACK: u8 = 11;
const PINGREQ: u8 = 12;
const PINGRESP: u8 = 13;
const DISCONNECT: u8 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    Done,
    InProgress,
}

/// Restartable encoder: one instance serializes one packet at a time, and
/// is reset when the connection is (re)opened (spec.md §4.C).
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
    pos: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Encoder::default()
    }

    /// Reset the encoder for a fresh connection; drops any partially
    /// written packet.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }

    /// Perform the one-time internal→binary conversion for `packet` and
    /// begin encoding it. Must not be called again until the previous
    /// packet has reached [`EncodeStatus::Done`].
    pub fn init_for_packet(&mut self, packet: &Packet, version: Version) -> Result<(), Error> {
        let binary = crate::packet::binary::to_binary(packet, version)?;
        self.buf.clear();
        self.pos = 0;
        write_packet(&mut self.buf, &binary, version);
        Ok(())
    }

    /// Copy as many pending bytes as fit into `out`, returning the number
    /// of bytes written and whether the packet is fully flushed.
    pub fn service(&mut self, out: &mut [u8]) -> (usize, EncodeStatus) {
        let remaining = &self.buf[self.pos..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        let status = if self.pos >= self.buf.len() {
            EncodeStatus::Done
        } else {
            EncodeStatus::InProgress
        };
        (n, status)
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

fn write_packet(out: &mut Vec<u8>, packet: &BinaryPacket, version: Version) {
    let remaining_len = packet.remaining_len(version);
    let (type_code, flags) = header_byte(packet);
    write_u8(out, (type_code << 4) | flags);
    write_var_int(out, remaining_len);
    write_body(out, packet, version);
}

fn header_byte(packet: &BinaryPacket) -> (u8, u8) {
    match packet {
        BinaryPacket::Connect(_) => (CONNECT, 0),
        BinaryPacket::Connack(_) => (CONNACK, 0),
        BinaryPacket::Publish(p) => (PUBLISH, p.flags()),
        BinaryPacket::Puback(_) => (PUBACK, 0),
        BinaryPacket::Subscribe(_) => (SUBSCRIBE, 0x02),
        BinaryPacket::Suback(_) => (SUBACK, 0),
        BinaryPacket::Unsubscribe(_) => (UNSUBSCRIBE, 0x02),
        BinaryPacket::Unsuback(_) => (UNSUBACK, 0),
        BinaryPacket::Disconnect(_) => (DISCONNECT, 0),
        BinaryPacket::Pingreq => (PINGREQ, 0),
        BinaryPacket::Pingresp => (PINGRESP, 0),
    }
}

fn write_body(out: &mut Vec<u8>, packet: &BinaryPacket, version: Version) {
    match packet {
        BinaryPacket::Connect(p) => write_connect(out, p),
        BinaryPacket::Connack(p) => write_connack(out, p),
        BinaryPacket::Publish(p) => write_publish(out, p),
        BinaryPacket::Puback(p) => write_puback(out, p, version),
        BinaryPacket::Subscribe(p) => write_subscribe(out, p),
        BinaryPacket::Suback(p) => write_suback(out, p),
        BinaryPacket::Unsubscribe(p) => write_unsubscribe(out, p),
        BinaryPacket::Unsuback(p) => write_unsuback(out, p, version),
        BinaryPacket::Disconnect(p) => write_disconnect(out, p, version),
        BinaryPacket::Pingreq | BinaryPacket::Pingresp => {}
    }
}

fn write_connect(out: &mut Vec<u8>, p: &BinaryConnect) {
    write_bytes(out, b"MQTT");
    write_u8(out, p.version.level());
    write_u8(out, p.connect_flags());
    write_u16(out, p.keep_alive);
    out.extend_from_slice(&p.properties);
    write_bytes(out, &p.client_id);
    if let Some(topic) = &p.will_topic {
        out.extend_from_slice(&p.will_properties);
        write_bytes(out, topic);
        write_bytes(out, p.will_payload.as_deref().unwrap_or(&[]));
    }
    if let Some(u) = &p.username {
        write_bytes(out, u);
    }
    if let Some(pw) = &p.password {
        write_bytes(out, pw);
    }
}

fn write_connack(out: &mut Vec<u8>, p: &BinaryConnack) {
    write_u8(out, p.session_present as u8);
    write_u8(out, p.reason_code);
    out.extend_from_slice(&p.properties);
}

fn write_publish(out: &mut Vec<u8>, p: &BinaryPublish) {
    write_bytes(out, &p.topic_name);
    if let Some(pid) = p.pid {
        write_u16(out, pid.value());
    }
    out.extend_from_slice(&p.properties);
    out.extend_from_slice(&p.payload);
}

fn write_puback(out: &mut Vec<u8>, p: &BinaryPuback, version: Version) {
    write_u16(out, p.pid.value());
    if !version.is_v5() {
        return;
    }
    if p.reason_code == 0 && p.properties.is_empty() {
        return;
    }
    write_u8(out, p.reason_code);
    out.extend_from_slice(&p.properties);
}

fn write_subscribe(out: &mut Vec<u8>, p: &BinarySubscribe) {
    write_u16(out, p.pid.value());
    out.extend_from_slice(&p.properties);
    for f in &p.filters {
        write_bytes(out, &f.filter);
        write_u8(out, f.options_byte());
    }
}

fn write_suback(out: &mut Vec<u8>, p: &BinarySuback) {
    write_u16(out, p.pid.value());
    out.extend_from_slice(&p.properties);
    out.extend_from_slice(&p.reason_codes);
}

fn write_unsubscribe(out: &mut Vec<u8>, p: &BinaryUnsubscribe) {
    write_u16(out, p.pid.value());
    out.extend_from_slice(&p.properties);
    for f in &p.filters {
        write_bytes(out, f);
    }
}

fn write_unsuback(out: &mut Vec<u8>, p: &BinaryUnsuback, version: Version) {
    write_u16(out, p.pid.value());
    if !version.is_v5() {
        return;
    }
    out.extend_from_slice(&p.properties);
    out.extend_from_slice(&p.reason_codes);
}

fn write_disconnect(out: &mut Vec<u8>, p: &BinaryDisconnect, version: Version) {
    if !version.is_v5() {
        return;
    }
    if p.reason_code == 0 && p.properties.is_empty() {
        return;
    }
    write_u8(out, p.reason_code);
    out.extend_from_slice(&p.properties);
}
