//! The *internal* packet form (spec.md §3/§4.B): strings are text,
//! payloads/correlation-data accept any of several source types. This is
//! the form exposed at the API boundary and produced by the decoder.

use bytes::Bytes;

use crate::error::Error;
use crate::types::{Pid, QoS, TopicFilter, TopicName, Version};

use super::properties::{
    AckProperties, ConnackProperties, ConnectProperties, ConnectReasonCode, DisconnectProperties,
    DisconnectReasonCode, PubackReasonCode, RetainHandlingType, SubscribeProperties,
    SubscribeReasonCode, UnsubackReasonCode, UnsubscribeProperties, WillProperties,
};

/// A payload or correlation-data source, accepted in any of these shapes at
/// the API boundary and reduced to a byte buffer exactly once when the
/// operation is converted to its binary form (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bytes(Bytes),
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    pub fn into_bytes(self) -> Result<Bytes, Error> {
        match self {
            Payload::Bytes(b) => Ok(b),
            Payload::Text(s) => Ok(Bytes::from(s.into_bytes())),
            Payload::Json(v) => serde_json::to_vec(&v)
                .map(Bytes::from)
                .map_err(|e| Error::InvalidJsonPayload(e.to_string())),
        }
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Payload::Bytes(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(value))
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// Combined QoS and packet-id, as carried on a Publish packet. QoS 2 is
/// representable (an inbound publish might arrive at QoS 2) but this
/// client never originates it and never completes the QoS-2 handshake
/// (spec.md §1 Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosPid {
    Level0,
    Level1(Pid),
    Level2(Pid),
}

impl QosPid {
    pub fn qos(self) -> QoS {
        match self {
            QosPid::Level0 => QoS::Level0,
            QosPid::Level1(_) => QoS::Level1,
            QosPid::Level2(_) => QoS::Level2,
        }
    }

    pub fn pid(self) -> Option<Pid> {
        match self {
            QosPid::Level0 => None,
            QosPid::Level1(p) | QosPid::Level2(p) => Some(p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionOptions {
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandlingType,
}

impl SubscriptionOptions {
    pub fn new(qos: QoS) -> Self {
        SubscriptionOptions {
            qos,
            no_local: false,
            retain_as_published: false,
            retain_handling: RetainHandlingType::SendAtSubscribe,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LastWill {
    pub qos: QoS,
    pub retain: bool,
    pub topic_name: TopicName,
    pub payload: Payload,
    pub properties: WillProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connect {
    pub version: Version,
    pub clean_start: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<Bytes>,
    pub last_will: Option<LastWill>,
    pub properties: ConnectProperties,
}

impl Connect {
    pub fn new(version: Version, client_id: impl Into<String>, keep_alive: u16) -> Self {
        Connect {
            version,
            clean_start: true,
            keep_alive,
            client_id: client_id.into(),
            username: None,
            password: None,
            last_will: None,
            properties: ConnectProperties::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connack {
    pub session_present: bool,
    pub reason_code: ConnectReasonCode,
    pub properties: ConnackProperties,
}

impl Connack {
    /// MQTT 3.1.1 connect return codes (0-5) reduced to the matching
    /// MQTT 5 reason code so the engine has one enum to reason about
    /// regardless of negotiated version.
    pub fn legacy_return_code(code: u8) -> Result<ConnectReasonCode, Error> {
        match code {
            0 => Ok(ConnectReasonCode::Success),
            1 => Ok(ConnectReasonCode::UnsupportedProtocolVersion),
            2 => Ok(ConnectReasonCode::ClientIdentifierNotValid),
            3 => Ok(ConnectReasonCode::ServerUnavailable),
            4 => Ok(ConnectReasonCode::BadUserNameOrPassword),
            5 => Ok(ConnectReasonCode::NotAuthorized),
            n => Err(Error::InvalidReasonCode(n)),
        }
    }

    /// Inverse of [`Connack::legacy_return_code`], used when re-encoding
    /// (tests, loopback) a reason code onto the wire as MQTT 3.1.1.
    pub fn to_legacy_return_code(code: ConnectReasonCode) -> u8 {
        match code {
            ConnectReasonCode::Success => 0,
            ConnectReasonCode::UnsupportedProtocolVersion => 1,
            ConnectReasonCode::ClientIdentifierNotValid => 2,
            ConnectReasonCode::ServerUnavailable => 3,
            ConnectReasonCode::BadUserNameOrPassword => 4,
            ConnectReasonCode::NotAuthorized => 5,
            _ => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Publish {
    pub dup: bool,
    pub qos_pid: QosPid,
    pub retain: bool,
    pub topic_name: TopicName,
    pub payload: Payload,
    pub properties: super::properties::PublishProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Puback {
    pub pid: Pid,
    pub reason_code: PubackReasonCode,
    pub properties: AckProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscribe {
    pub pid: Pid,
    pub filters: Vec<(TopicFilter, SubscriptionOptions)>,
    pub properties: SubscribeProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suback {
    pub pid: Pid,
    pub reason_codes: Vec<SubscribeReasonCode>,
    pub properties: AckProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unsubscribe {
    pub pid: Pid,
    pub filters: Vec<TopicFilter>,
    pub properties: UnsubscribeProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unsuback {
    pub pid: Pid,
    /// Empty for MQTT 3.1.1, which carries no Unsuback payload at all.
    pub reason_codes: Vec<UnsubackReasonCode>,
    pub properties: AckProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect {
    pub reason_code: DisconnectReasonCode,
    pub properties: DisconnectProperties,
}

impl Default for Disconnect {
    fn default() -> Self {
        Disconnect {
            reason_code: DisconnectReasonCode::NormalDisconnection,
            properties: DisconnectProperties::default(),
        }
    }
}

/// One internal-form packet, covering every type the engine understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Connect(Connect),
    Connack(Connack),
    Publish(Publish),
    Puback(Puback),
    Subscribe(Subscribe),
    Suback(Suback),
    Unsubscribe(Unsubscribe),
    Unsuback(Unsuback),
    Disconnect(Disconnect),
    Pingreq,
    Pingresp,
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::Connack(_) => PacketType::Connack,
            Packet::Publish(_) => PacketType::Publish,
            Packet::Puback(_) => PacketType::Puback,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::Suback(_) => PacketType::Suback,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::Unsuback(_) => PacketType::Unsuback,
            Packet::Disconnect(_) => PacketType::Disconnect,
            Packet::Pingreq => PacketType::Pingreq,
            Packet::Pingresp => PacketType::Pingresp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Connect,
    Connack,
    Publish,
    Puback,
    Subscribe,
    Suback,
    Unsubscribe,
    Unsuback,
    Disconnect,
    Pingreq,
    Pingresp,
}

impl PacketType {
    /// Whether submitting this operation requires the engine to allocate a
    /// fresh packet-id (spec.md §4.E: "Publishes with QoS 0 and internal
    /// packets (pingreq/puback/connect/disconnect) do not bind ids"). QoS
    /// 1/2 publishes bind ids too, but that's QoS-dependent and checked
    /// separately by the caller — this only covers the unconditional cases.
    pub fn binds_packet_id(self) -> bool {
        matches!(self, PacketType::Subscribe | PacketType::Unsubscribe)
    }
}
