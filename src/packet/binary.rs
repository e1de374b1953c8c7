//! The *binary* packet form (spec.md §3/§4.B): every variable-length field
//! is already a byte buffer with a known length, every numeric field is a
//! fixed-width integer, and nothing further needs encoding beyond writing
//! these pieces to the wire behind a fixed header and a Variable Length
//! Integer remaining-length. `to_binary` is the single place an internal
//! packet is reduced to this form — called exactly once per operation, the
//! way spec.md requires.

use bytes::Bytes;

use crate::codec::properties_codec::{
    encode_ack_properties, encode_connack_properties, encode_connect_properties,
    encode_disconnect_properties, encode_publish_properties, encode_subscribe_properties,
    encode_unsubscribe_properties, encode_will_properties, write_property_block,
};
use crate::error::Error;
use crate::types::{Pid, QoS, Version};

use super::internal::Packet;
use super::properties::RetainHandlingType;

fn str_bytes(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

/// 2-byte length prefix plus payload, the shape every MQTT string/byte
/// field takes on the wire.
fn framed_len(data: &[u8]) -> usize {
    2 + data.len()
}

/// Property block for a version that doesn't carry one (MQTT 3.1.1) is
/// simply absent rather than an empty VLI(0) — v3.1.1 packets never emit
/// a property byte at all.
fn properties_for(version: Version, body: Vec<u8>) -> Bytes {
    if !version.is_v5() {
        return Bytes::new();
    }
    let mut out = Vec::new();
    write_property_block(&mut out, &body);
    Bytes::from(out)
}

#[derive(Debug, Clone)]
pub struct BinaryConnect {
    pub version: Version,
    pub clean_start: bool,
    pub keep_alive: u16,
    pub properties: Bytes,
    pub client_id: Bytes,
    pub will_retain: bool,
    pub will_qos: QoS,
    pub will_properties: Bytes,
    pub will_topic: Option<Bytes>,
    pub will_payload: Option<Bytes>,
    pub username: Option<Bytes>,
    pub password: Option<Bytes>,
}

impl BinaryConnect {
    pub fn connect_flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.username.is_some() {
            flags |= 0x80;
        }
        if self.password.is_some() {
            flags |= 0x40;
        }
        if self.will_topic.is_some() {
            flags |= 0x04;
            flags |= (self.will_qos as u8) << 3;
            if self.will_retain {
                flags |= 0x20;
            }
        }
        if self.clean_start {
            flags |= 0x02;
        }
        flags
    }

    pub fn remaining_len(&self) -> usize {
        let mut len = framed_len(b"MQTT")
            + 1 // protocol level
            + 1 // connect flags
            + 2 // keep alive
            + self.properties.len()
            + framed_len(&self.client_id);
        if let Some(t) = &self.will_topic {
            len += self.will_properties.len() + framed_len(t);
            len += framed_len(self.will_payload.as_deref().unwrap_or(&[]));
        }
        if let Some(u) = &self.username {
            len += framed_len(u);
        }
        if let Some(p) = &self.password {
            len += framed_len(p);
        }
        len
    }
}

#[derive(Debug, Clone)]
pub struct BinaryConnack {
    pub session_present: bool,
    pub reason_code: u8,
    pub properties: Bytes,
}

impl BinaryConnack {
    pub fn remaining_len(&self) -> usize {
        2 + self.properties.len()
    }
}

#[derive(Debug, Clone)]
pub struct BinaryPublish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub pid: Option<Pid>,
    pub topic_name: Bytes,
    pub properties: Bytes,
    pub payload: Bytes,
    /// Carried alongside the already-framed `properties` blob so the
    /// pre-encode validator can check it without re-parsing properties.
    pub topic_alias: Option<u16>,
    pub has_subscription_identifiers: bool,
}

impl BinaryPublish {
    pub fn flags(&self) -> u8 {
        let mut flags = (self.qos as u8) << 1;
        if self.dup {
            flags |= 0x08;
        }
        if self.retain {
            flags |= 0x01;
        }
        flags
    }

    pub fn remaining_len(&self) -> usize {
        let mut len = framed_len(&self.topic_name);
        if self.pid.is_some() {
            len += 2;
        }
        len + self.properties.len() + self.payload.len()
    }
}

#[derive(Debug, Clone)]
pub struct BinaryPuback {
    pub pid: Pid,
    pub reason_code: u8,
    pub properties: Bytes,
}

impl BinaryPuback {
    /// `Some` only when a non-default body is needed: MQTT 3.1.1 and the
    /// all-success/no-properties MQTT 5 shorthand both collapse to the
    /// bare 2-byte packet-id form (spec.md's wire-format byte patterns).
    pub fn remaining_len(&self, version: Version) -> usize {
        if !version.is_v5() {
            return 2;
        }
        if self.reason_code == 0 && self.properties.is_empty() {
            return 2;
        }
        3 + self.properties.len()
    }
}

#[derive(Debug, Clone)]
pub struct BinarySubscribeFilter {
    pub filter: Bytes,
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandlingType,
}

impl BinarySubscribeFilter {
    pub fn options_byte(&self) -> u8 {
        let mut b = self.qos as u8;
        if self.no_local {
            b |= 0x04;
        }
        if self.retain_as_published {
            b |= 0x08;
        }
        b |= (self.retain_handling as u8) << 4;
        b
    }
}

#[derive(Debug, Clone)]
pub struct BinarySubscribe {
    pub pid: Pid,
    pub properties: Bytes,
    pub filters: Vec<BinarySubscribeFilter>,
}

impl BinarySubscribe {
    pub fn remaining_len(&self) -> usize {
        2 + self.properties.len()
            + self
                .filters
                .iter()
                .map(|f| framed_len(&f.filter) + 1)
                .sum::<usize>()
    }
}

#[derive(Debug, Clone)]
pub struct BinarySuback {
    pub pid: Pid,
    pub properties: Bytes,
    pub reason_codes: Vec<u8>,
}

impl BinarySuback {
    pub fn remaining_len(&self) -> usize {
        2 + self.properties.len() + self.reason_codes.len()
    }
}

#[derive(Debug, Clone)]
pub struct BinaryUnsubscribe {
    pub pid: Pid,
    pub properties: Bytes,
    pub filters: Vec<Bytes>,
}

impl BinaryUnsubscribe {
    pub fn remaining_len(&self) -> usize {
        2 + self.properties.len() + self.filters.iter().map(|f| framed_len(f)).sum::<usize>()
    }
}

#[derive(Debug, Clone)]
pub struct BinaryUnsuback {
    pub pid: Pid,
    pub properties: Bytes,
    pub reason_codes: Vec<u8>,
}

impl BinaryUnsuback {
    pub fn remaining_len(&self, version: Version) -> usize {
        if !version.is_v5() {
            return 2;
        }
        2 + self.properties.len() + self.reason_codes.len()
    }
}

#[derive(Debug, Clone)]
pub struct BinaryDisconnect {
    pub reason_code: u8,
    pub properties: Bytes,
    /// Carried alongside the already-framed `properties` blob so the
    /// pre-encode validator can check it without re-parsing properties.
    pub session_expiry_interval: Option<u32>,
}

impl BinaryDisconnect {
    pub fn remaining_len(&self, version: Version) -> usize {
        if !version.is_v5() {
            return 0;
        }
        if self.reason_code == 0 && self.properties.is_empty() {
            return 0;
        }
        1 + self.properties.len()
    }
}

#[derive(Debug, Clone)]
pub enum BinaryPacket {
    Connect(BinaryConnect),
    Connack(BinaryConnack),
    Publish(BinaryPublish),
    Puback(BinaryPuback),
    Subscribe(BinarySubscribe),
    Suback(BinarySuback),
    Unsubscribe(BinaryUnsubscribe),
    Unsuback(BinaryUnsuback),
    Disconnect(BinaryDisconnect),
    Pingreq,
    Pingresp,
}

impl BinaryPacket {
    pub fn remaining_len(&self, version: Version) -> usize {
        match self {
            BinaryPacket::Connect(p) => p.remaining_len(),
            BinaryPacket::Connack(p) => p.remaining_len(),
            BinaryPacket::Publish(p) => p.remaining_len(),
            BinaryPacket::Puback(p) => p.remaining_len(version),
            BinaryPacket::Subscribe(p) => p.remaining_len(),
            BinaryPacket::Suback(p) => p.remaining_len(),
            BinaryPacket::Unsubscribe(p) => p.remaining_len(),
            BinaryPacket::Unsuback(p) => p.remaining_len(version),
            BinaryPacket::Disconnect(p) => p.remaining_len(version),
            BinaryPacket::Pingreq | BinaryPacket::Pingresp => 0,
        }
    }

    pub fn total_len(&self, version: Version) -> Result<usize, Error> {
        crate::vli::total_len(self.remaining_len(version))
    }
}

/// Reduce an internal packet to its binary form. Called exactly once per
/// outbound operation (spec.md §3) — every text field is encoded to UTF-8
/// bytes and every property struct is flattened into its pre-framed
/// on-wire block here, never again downstream.
pub fn to_binary(packet: &Packet, version: Version) -> Result<BinaryPacket, Error> {
    Ok(match packet {
        Packet::Connect(c) => {
            let (will_retain, will_qos, will_properties, will_topic, will_payload) =
                match &c.last_will {
                    Some(w) => (
                        w.retain,
                        w.qos,
                        properties_for(version, encode_will_properties(&w.properties)),
                        Some(str_bytes(&w.topic_name)),
                        Some(w.payload.clone().into_bytes()?),
                    ),
                    None => (false, QoS::Level0, Bytes::new(), None, None),
                };
            BinaryPacket::Connect(BinaryConnect {
                version,
                clean_start: c.clean_start,
                keep_alive: c.keep_alive,
                properties: properties_for(version, encode_connect_properties(&c.properties)),
                client_id: str_bytes(&c.client_id),
                will_retain,
                will_qos,
                will_properties,
                will_topic,
                will_payload,
                username: c.username.as_deref().map(str_bytes),
                password: c.password.clone(),
            })
        }
        Packet::Connack(c) => BinaryPacket::Connack(BinaryConnack {
            session_present: c.session_present,
            reason_code: if version.is_v5() {
                c.reason_code as u8
            } else {
                crate::packet::internal::Connack::to_legacy_return_code(c.reason_code)
            },
            properties: properties_for(version, encode_connack_properties(&c.properties)),
        }),
        Packet::Publish(p) => BinaryPacket::Publish(BinaryPublish {
            dup: p.dup,
            qos: p.qos_pid.qos(),
            retain: p.retain,
            pid: p.qos_pid.pid(),
            topic_name: str_bytes(&p.topic_name),
            properties: properties_for(version, encode_publish_properties(&p.properties)),
            payload: p.payload.clone().into_bytes()?,
            topic_alias: p.properties.topic_alias,
            has_subscription_identifiers: !p.properties.subscription_identifiers.is_empty(),
        }),
        Packet::Puback(p) => BinaryPacket::Puback(BinaryPuback {
            pid: p.pid,
            reason_code: p.reason_code as u8,
            properties: properties_for(version, encode_ack_properties(&p.properties)),
        }),
        Packet::Subscribe(s) => BinaryPacket::Subscribe(BinarySubscribe {
            pid: s.pid,
            properties: properties_for(version, encode_subscribe_properties(&s.properties)),
            filters: s
                .filters
                .iter()
                .map(|(f, o)| BinarySubscribeFilter {
                    filter: str_bytes(f),
                    qos: o.qos,
                    no_local: o.no_local,
                    retain_as_published: o.retain_as_published,
                    retain_handling: o.retain_handling,
                })
                .collect(),
        }),
        Packet::Suback(s) => BinaryPacket::Suback(BinarySuback {
            pid: s.pid,
            properties: properties_for(version, encode_ack_properties(&s.properties)),
            reason_codes: s.reason_codes.iter().map(|r| *r as u8).collect(),
        }),
        Packet::Unsubscribe(u) => BinaryPacket::Unsubscribe(BinaryUnsubscribe {
            pid: u.pid,
            properties: properties_for(version, encode_unsubscribe_properties(&u.properties)),
            filters: u.filters.iter().map(|f| str_bytes(f)).collect(),
        }),
        Packet::Unsuback(u) => BinaryPacket::Unsuback(BinaryUnsuback {
            pid: u.pid,
            properties: properties_for(version, encode_ack_properties(&u.properties)),
            reason_codes: u.reason_codes.iter().map(|r| *r as u8).collect(),
        }),
        Packet::Disconnect(d) => BinaryPacket::Disconnect(BinaryDisconnect {
            reason_code: d.reason_code as u8,
            properties: properties_for(version, encode_disconnect_properties(&d.properties)),
            session_expiry_interval: d.properties.session_expiry_interval,
        }),
        Packet::Pingreq => BinaryPacket::Pingreq,
        Packet::Pingresp => BinaryPacket::Pingresp,
    })
}
