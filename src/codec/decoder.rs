//! The sans-I/O decoder (spec.md §4.C): fed arbitrary byte chunks — however
//! fragmented or coalesced — it returns every internal packet it can fully
//! parse, buffering the remainder internally until more bytes arrive.
//! Adapted from the teacher's `Header`/`Body` poll-state split in
//! `common/poll.rs`, but driven by repeatedly handing it a `&[u8]` slice
//! instead of polling an `AsyncRead`.

use bytes::Bytes;

use crate::codec::properties_codec::{
    decode_ack_properties, decode_connack_properties, decode_connect_properties,
    decode_disconnect_properties, decode_publish_properties, decode_subscribe_properties,
    decode_unsubscribe_properties, decode_will_properties,
};
use crate::error::Error;
use crate::packet::internal::{
    Connack, Connect, Disconnect, LastWill, Packet, Puback, Publish, QosPid, Suback, Subscribe,
    SubscriptionOptions, Unsuback, Unsubscribe,
};
use crate::packet::properties::{
    ConnectReasonCode, PubackReasonCode, RetainHandlingType, SubscribeReasonCode,
    UnsubackReasonCode,
};
use crate::types::{Pid, QoS, TopicFilter, TopicName, Version};
use crate::vli::{decode_var_int, read_bytes, read_string, read_u16, read_u8};

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

/// Buffers partially received packets across calls and yields complete
/// ones as they become available.
#[derive(Debug)]
pub struct Decoder {
    version: Version,
    buf: Vec<u8>,
}

impl Decoder {
    pub fn new(version: Version) -> Self {
        Decoder {
            version,
            buf: Vec::new(),
        }
    }

    /// Drop any buffered partial packet and reset framing state. Called
    /// whenever the connection is (re)opened (spec.md §4.C).
    pub fn reset(&mut self, version: Version) {
        self.buf.clear();
        self.version = version;
    }

    pub fn decode(&mut self, input: &[u8]) -> Result<Vec<Packet>, Error> {
        self.buf.extend_from_slice(input);
        let mut packets = Vec::new();
        while let Some((packet, consumed)) = decode_one(&self.buf, self.version)? {
            packets.push(packet);
            self.buf.drain(..consumed);
        }
        Ok(packets)
    }
}

fn decode_one(buf: &[u8], version: Version) -> Result<Option<(Packet, usize)>, Error> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    let type_code = first >> 4;
    let flags = first & 0x0F;
    let Some((remaining_len, vli_len)) = decode_var_int(&buf[1..])? else {
        return Ok(None);
    };
    let header_len = 1 + vli_len;
    let total = header_len + remaining_len as usize;
    if buf.len() < total {
        return Ok(None);
    }
    let body = &buf[header_len..total];
    let packet = decode_body(type_code, flags, body, version)?;
    Ok(Some((packet, total)))
}

fn decode_body(type_code: u8, flags: u8, body: &[u8], version: Version) -> Result<Packet, Error> {
    match type_code {
        CONNECT => decode_connect(body, version).map(Packet::Connect),
        CONNACK => decode_connack(body, version).map(Packet::Connack),
        PUBLISH => decode_publish(flags, body, version).map(Packet::Publish),
        PUBACK => decode_puback(body, version).map(Packet::Puback),
        SUBSCRIBE => decode_subscribe(body, version).map(Packet::Subscribe),
        SUBACK => decode_suback(body, version).map(Packet::Suback),
        UNSUBSCRIBE => decode_unsubscribe(body, version).map(Packet::Unsubscribe),
        UNSUBACK => decode_unsuback(body, version).map(Packet::Unsuback),
        DISCONNECT => decode_disconnect(body, version).map(Packet::Disconnect),
        PINGREQ => Ok(Packet::Pingreq),
        PINGRESP => Ok(Packet::Pingresp),
        _ => Err(Error::InvalidHeader),
    }
}

fn property_block<'a>(buf: &'a [u8], offset: &mut usize, version: Version) -> Result<&'a [u8], Error> {
    if !version.is_v5() {
        return Ok(&[]);
    }
    let (len, consumed) = decode_var_int(&buf[*offset..])?.ok_or(Error::UnexpectedEof)?;
    *offset += consumed;
    let block = buf
        .get(*offset..*offset + len as usize)
        .ok_or(Error::UnexpectedEof)?;
    *offset += len as usize;
    Ok(block)
}

fn decode_connect(buf: &[u8], _version: Version) -> Result<Connect, Error> {
    let offset = &mut 0usize;
    let protocol_name = read_string(buf, offset)?;
    if protocol_name != "MQTT" {
        return Err(Error::InvalidProtocolName);
    }
    let level = read_u8(buf, offset)?;
    let version = Version::from_level(level)?;
    let connect_flags = read_u8(buf, offset)?;
    if connect_flags & 0x01 != 0 {
        return Err(Error::InvalidConnectFlags(connect_flags));
    }
    let clean_start = connect_flags & 0x02 != 0;
    let has_will = connect_flags & 0x04 != 0;
    let will_qos = QoS::from_u8((connect_flags >> 3) & 0x03)?;
    let will_retain = connect_flags & 0x20 != 0;
    let has_password = connect_flags & 0x40 != 0;
    let has_username = connect_flags & 0x80 != 0;
    let keep_alive = read_u16(buf, offset)?;
    let properties = if version.is_v5() {
        let block = property_block(buf, offset, version)?;
        decode_connect_properties(block)?
    } else {
        Default::default()
    };
    let client_id = read_string(buf, offset)?.to_string();
    let last_will = if has_will {
        let will_properties = if version.is_v5() {
            let block = property_block(buf, offset, version)?;
            decode_will_properties(block)?
        } else {
            Default::default()
        };
        let topic_name = TopicName::try_from(read_string(buf, offset)?)?;
        let payload = read_bytes(buf, offset)?.to_vec();
        Some(LastWill {
            qos: will_qos,
            retain: will_retain,
            topic_name,
            payload: payload.into(),
            properties: will_properties,
        })
    } else {
        None
    };
    let username = has_username
        .then(|| read_string(buf, offset).map(|s| s.to_string()))
        .transpose()?;
    let password = has_password
        .then(|| read_bytes(buf, offset).map(Bytes::copy_from_slice))
        .transpose()?;
    Ok(Connect {
        version,
        clean_start,
        keep_alive,
        client_id,
        username,
        password,
        last_will,
        properties,
    })
}

fn decode_connack(buf: &[u8], version: Version) -> Result<Connack, Error> {
    let offset = &mut 0usize;
    let ack_flags = read_u8(buf, offset)?;
    let session_present = ack_flags & 0x01 != 0;
    let code = read_u8(buf, offset)?;
    let reason_code = if version.is_v5() {
        ConnectReasonCode::from_u8(code)?
    } else {
        Connack::legacy_return_code(code)?
    };
    let properties = if version.is_v5() {
        let block = property_block(buf, offset, version)?;
        decode_connack_properties(block)?
    } else {
        Default::default()
    };
    Ok(Connack {
        session_present,
        reason_code,
        properties,
    })
}

fn decode_publish(flags: u8, buf: &[u8], version: Version) -> Result<Publish, Error> {
    let dup = flags & 0x08 != 0;
    let qos = QoS::from_u8((flags >> 1) & 0x03)?;
    let retain = flags & 0x01 != 0;
    let offset = &mut 0usize;
    let topic_name = TopicName::try_from(read_string(buf, offset)?)?;
    let qos_pid = match qos {
        QoS::Level0 => QosPid::Level0,
        QoS::Level1 => QosPid::Level1(Pid::try_from(read_u16(buf, offset)?)?),
        QoS::Level2 => QosPid::Level2(Pid::try_from(read_u16(buf, offset)?)?),
    };
    let properties = if version.is_v5() {
        let block = property_block(buf, offset, version)?;
        decode_publish_properties(block)?
    } else {
        Default::default()
    };
    let payload = buf.get(*offset..).ok_or(Error::UnexpectedEof)?.to_vec();
    Ok(Publish {
        dup,
        qos_pid,
        retain,
        topic_name,
        payload: payload.into(),
        properties,
    })
}

fn decode_puback(buf: &[u8], version: Version) -> Result<Puback, Error> {
    let offset = &mut 0usize;
    let pid = Pid::try_from(read_u16(buf, offset)?)?;
    if *offset >= buf.len() {
        return Ok(Puback {
            pid,
            reason_code: PubackReasonCode::Success,
            properties: Default::default(),
        });
    }
    let reason_code = PubackReasonCode::from_u8(read_u8(buf, offset)?)?;
    let properties = if version.is_v5() && *offset < buf.len() {
        let block = property_block(buf, offset, version)?;
        decode_ack_properties(block)?
    } else {
        Default::default()
    };
    Ok(Puback {
        pid,
        reason_code,
        properties,
    })
}

fn decode_subscribe(buf: &[u8], version: Version) -> Result<Subscribe, Error> {
    let offset = &mut 0usize;
    let pid = Pid::try_from(read_u16(buf, offset)?)?;
    let properties = if version.is_v5() {
        let block = property_block(buf, offset, version)?;
        decode_subscribe_properties(block)?
    } else {
        Default::default()
    };
    let mut filters = Vec::new();
    while *offset < buf.len() {
        let filter = TopicFilter::try_from(read_string(buf, offset)?)?;
        let options_byte = read_u8(buf, offset)?;
        let qos = QoS::from_u8(options_byte & 0x03)?;
        let options = SubscriptionOptions {
            qos,
            no_local: options_byte & 0x04 != 0,
            retain_as_published: options_byte & 0x08 != 0,
            retain_handling: RetainHandlingType::from_u8((options_byte >> 4) & 0x03)?,
        };
        filters.push((filter, options));
    }
    Ok(Subscribe {
        pid,
        filters,
        properties,
    })
}

fn decode_suback(buf: &[u8], version: Version) -> Result<Suback, Error> {
    let offset = &mut 0usize;
    let pid = Pid::try_from(read_u16(buf, offset)?)?;
    let properties = if version.is_v5() {
        let block = property_block(buf, offset, version)?;
        decode_ack_properties(block)?
    } else {
        Default::default()
    };
    let mut reason_codes = Vec::new();
    while *offset < buf.len() {
        reason_codes.push(SubscribeReasonCode::from_u8(read_u8(buf, offset)?)?);
    }
    Ok(Suback {
        pid,
        reason_codes,
        properties,
    })
}

fn decode_unsubscribe(buf: &[u8], version: Version) -> Result<Unsubscribe, Error> {
    let offset = &mut 0usize;
    let pid = Pid::try_from(read_u16(buf, offset)?)?;
    let properties = if version.is_v5() {
        let block = property_block(buf, offset, version)?;
        decode_unsubscribe_properties(block)?
    } else {
        Default::default()
    };
    let mut filters = Vec::new();
    while *offset < buf.len() {
        filters.push(TopicFilter::try_from(read_string(buf, offset)?)?);
    }
    Ok(Unsubscribe {
        pid,
        filters,
        properties,
    })
}

fn decode_unsuback(buf: &[u8], version: Version) -> Result<Unsuback, Error> {
    let offset = &mut 0usize;
    let pid = Pid::try_from(read_u16(buf, offset)?)?;
    if !version.is_v5() {
        return Ok(Unsuback {
            pid,
            reason_codes: Vec::new(),
            properties: Default::default(),
        });
    }
    let block = property_block(buf, offset, version)?;
    let properties = decode_ack_properties(block)?;
    let mut reason_codes = Vec::new();
    while *offset < buf.len() {
        reason_codes.push(UnsubackReasonCode::from_u8(read_u8(buf, offset)?)?);
    }
    Ok(Unsuback {
        pid,
        reason_codes,
        properties,
    })
}

fn decode_disconnect(buf: &[u8], version: Version) -> Result<Disconnect, Error> {
    if !version.is_v5() || buf.is_empty() {
        return Ok(Disconnect::default());
    }
    let offset = &mut 0usize;
    let reason_code = crate::packet::properties::DisconnectReasonCode::from_u8(read_u8(
        buf, offset,
    )?)?;
    let properties = if *offset < buf.len() {
        let block = property_block(buf, offset, version)?;
        decode_disconnect_properties(block)?
    } else {
        Default::default()
    };
    Ok(Disconnect {
        reason_code,
        properties,
    })
}
