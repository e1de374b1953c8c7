//! The packet model: internal (typed) and binary (byte-framed) forms, plus
//! the MQTT 5 property structs both forms share.

pub mod binary;
pub mod internal;
pub mod properties;

pub use binary::{to_binary, BinaryPacket};
pub use internal::{Packet, PacketType, Payload, QosPid};
