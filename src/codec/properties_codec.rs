//! Encode/decode of MQTT 5 property blocks.
//!
//! Property identifiers are grounded on the table documented in the
//! teacher's `v5/types.rs`. Each packet's property struct gets its own
//! encode/decode pair rather than a single generic "any property for any
//! packet" decoder, matching how the teacher splits `ConnectProperties`,
//! `PublishProperties`, etc. A caller hands us the already length-delimited
//! property-block slice (the VLI length prefix has already been consumed)
//! and we parse until it's exhausted.

use crate::error::Error;
use crate::packet::properties::*;
use crate::vli::{
    decode_var_int, read_bytes, read_string, read_u16, read_u32, read_u8, write_bytes,
    write_u16, write_u32, write_u8, write_var_int,
};

const PAYLOAD_FORMAT_INDICATOR: u8 = 0x01;
const MESSAGE_EXPIRY_INTERVAL: u8 = 0x02;
const CONTENT_TYPE: u8 = 0x03;
const RESPONSE_TOPIC: u8 = 0x08;
const CORRELATION_DATA: u8 = 0x09;
const SUBSCRIPTION_IDENTIFIER: u8 = 0x0B;
const SESSION_EXPIRY_INTERVAL: u8 = 0x11;
const ASSIGNED_CLIENT_IDENTIFIER: u8 = 0x12;
const SERVER_KEEP_ALIVE: u8 = 0x13;
const AUTHENTICATION_METHOD: u8 = 0x15;
const AUTHENTICATION_DATA: u8 = 0x16;
const REQUEST_PROBLEM_INFORMATION: u8 = 0x17;
const WILL_DELAY_INTERVAL: u8 = 0x18;
const REQUEST_RESPONSE_INFORMATION: u8 = 0x19;
const RESPONSE_INFORMATION: u8 = 0x1A;
const SERVER_REFERENCE: u8 = 0x1C;
const REASON_STRING: u8 = 0x1F;
const RECEIVE_MAXIMUM: u8 = 0x21;
const TOPIC_ALIAS_MAXIMUM: u8 = 0x22;
const TOPIC_ALIAS: u8 = 0x23;
const MAXIMUM_QOS: u8 = 0x24;
const RETAIN_AVAILABLE: u8 = 0x25;
const USER_PROPERTY: u8 = 0x26;
const MAXIMUM_PACKET_SIZE: u8 = 0x27;
const WILDCARD_SUBSCRIPTION_AVAILABLE: u8 = 0x28;
const SUBSCRIPTION_IDENTIFIER_AVAILABLE: u8 = 0x29;
const SHARED_SUBSCRIPTION_AVAILABLE: u8 = 0x2A;

fn write_u8_prop(out: &mut Vec<u8>, id: u8, value: u8) {
    write_u8(out, id);
    write_u8(out, value);
}
fn write_bool_prop(out: &mut Vec<u8>, id: u8, value: bool) {
    write_u8_prop(out, id, value as u8);
}
fn write_u16_prop(out: &mut Vec<u8>, id: u8, value: u16) {
    write_u8(out, id);
    write_u16(out, value);
}
fn write_u32_prop(out: &mut Vec<u8>, id: u8, value: u32) {
    write_u8(out, id);
    write_u32(out, value);
}
fn write_string_prop(out: &mut Vec<u8>, id: u8, value: &str) {
    write_u8(out, id);
    write_bytes(out, value.as_bytes());
}
fn write_bytes_prop(out: &mut Vec<u8>, id: u8, value: &[u8]) {
    write_u8(out, id);
    write_bytes(out, value);
}
fn write_var_int_prop(out: &mut Vec<u8>, id: u8, value: u32) {
    write_u8(out, id);
    write_var_int(out, value as usize);
}
fn write_user_properties(out: &mut Vec<u8>, props: &[UserProperty]) {
    for p in props {
        write_u8(out, USER_PROPERTY);
        write_bytes(out, p.name.as_bytes());
        write_bytes(out, p.value.as_bytes());
    }
}

macro_rules! decode_loop {
    ($buf:expr, $offset:expr, $id:ident, $body:block) => {
        while *$offset < $buf.len() {
            let $id = read_u8($buf, $offset)?;
            $body
        }
    };
}

pub fn encode_connect_properties(props: &ConnectProperties) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(v) = props.session_expiry_interval {
        write_u32_prop(&mut out, SESSION_EXPIRY_INTERVAL, v);
    }
    if let Some(v) = props.receive_maximum {
        write_u16_prop(&mut out, RECEIVE_MAXIMUM, v);
    }
    if let Some(v) = props.maximum_packet_size {
        write_u32_prop(&mut out, MAXIMUM_PACKET_SIZE, v);
    }
    if let Some(v) = props.topic_alias_maximum {
        write_u16_prop(&mut out, TOPIC_ALIAS_MAXIMUM, v);
    }
    if let Some(v) = props.request_response_information {
        write_bool_prop(&mut out, REQUEST_RESPONSE_INFORMATION, v);
    }
    if let Some(v) = props.request_problem_information {
        write_bool_prop(&mut out, REQUEST_PROBLEM_INFORMATION, v);
    }
    if let Some(v) = props.authentication_method.as_deref() {
        write_string_prop(&mut out, AUTHENTICATION_METHOD, v);
    }
    if let Some(v) = props.authentication_data.as_deref() {
        write_bytes_prop(&mut out, AUTHENTICATION_DATA, v);
    }
    write_user_properties(&mut out, &props.user_properties);
    out
}

pub fn decode_connect_properties(buf: &[u8]) -> Result<ConnectProperties, Error> {
    let mut props = ConnectProperties::default();
    let offset = &mut 0usize;
    decode_loop!(buf, offset, id, {
        match id {
            SESSION_EXPIRY_INTERVAL => props.session_expiry_interval = Some(read_u32(buf, offset)?),
            RECEIVE_MAXIMUM => props.receive_maximum = Some(read_u16(buf, offset)?),
            MAXIMUM_PACKET_SIZE => props.maximum_packet_size = Some(read_u32(buf, offset)?),
            TOPIC_ALIAS_MAXIMUM => props.topic_alias_maximum = Some(read_u16(buf, offset)?),
            REQUEST_RESPONSE_INFORMATION => {
                props.request_response_information = Some(read_u8(buf, offset)? != 0)
            }
            REQUEST_PROBLEM_INFORMATION => {
                props.request_problem_information = Some(read_u8(buf, offset)? != 0)
            }
            AUTHENTICATION_METHOD => {
                props.authentication_method = Some(read_string(buf, offset)?.to_string())
            }
            AUTHENTICATION_DATA => {
                props.authentication_data = Some(read_bytes(buf, offset)?.to_vec())
            }
            USER_PROPERTY => props.user_properties.push(UserProperty {
                name: read_string(buf, offset)?.to_string(),
                value: read_string(buf, offset)?.to_string(),
            }),
            n => return Err(Error::InvalidPropertyId(n)),
        }
    });
    Ok(props)
}

pub fn encode_will_properties(props: &WillProperties) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(v) = props.will_delay_interval {
        write_u32_prop(&mut out, WILL_DELAY_INTERVAL, v);
    }
    if let Some(v) = props.payload_format_indicator {
        write_u8_prop(&mut out, PAYLOAD_FORMAT_INDICATOR, v as u8);
    }
    if let Some(v) = props.message_expiry_interval {
        write_u32_prop(&mut out, MESSAGE_EXPIRY_INTERVAL, v);
    }
    if let Some(v) = props.content_type.as_deref() {
        write_string_prop(&mut out, CONTENT_TYPE, v);
    }
    if let Some(v) = props.response_topic.as_deref() {
        write_string_prop(&mut out, RESPONSE_TOPIC, v);
    }
    if let Some(v) = props.correlation_data.as_deref() {
        write_bytes_prop(&mut out, CORRELATION_DATA, v);
    }
    write_user_properties(&mut out, &props.user_properties);
    out
}

pub fn decode_will_properties(buf: &[u8]) -> Result<WillProperties, Error> {
    let mut props = WillProperties::default();
    let offset = &mut 0usize;
    decode_loop!(buf, offset, id, {
        match id {
            WILL_DELAY_INTERVAL => props.will_delay_interval = Some(read_u32(buf, offset)?),
            PAYLOAD_FORMAT_INDICATOR => {
                props.payload_format_indicator =
                    Some(PayloadFormatIndicator::from_u8(read_u8(buf, offset)?)?)
            }
            MESSAGE_EXPIRY_INTERVAL => props.message_expiry_interval = Some(read_u32(buf, offset)?),
            CONTENT_TYPE => props.content_type = Some(read_string(buf, offset)?.to_string()),
            RESPONSE_TOPIC => props.response_topic = Some(read_string(buf, offset)?.to_string()),
            CORRELATION_DATA => props.correlation_data = Some(read_bytes(buf, offset)?.to_vec()),
            USER_PROPERTY => props.user_properties.push(UserProperty {
                name: read_string(buf, offset)?.to_string(),
                value: read_string(buf, offset)?.to_string(),
            }),
            n => return Err(Error::InvalidPropertyId(n)),
        }
    });
    Ok(props)
}

pub fn encode_connack_properties(props: &ConnackProperties) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(v) = props.session_expiry_interval {
        write_u32_prop(&mut out, SESSION_EXPIRY_INTERVAL, v);
    }
    if let Some(v) = props.receive_maximum {
        write_u16_prop(&mut out, RECEIVE_MAXIMUM, v);
    }
    if let Some(v) = props.maximum_qos {
        write_u8_prop(&mut out, MAXIMUM_QOS, v);
    }
    if let Some(v) = props.retain_available {
        write_bool_prop(&mut out, RETAIN_AVAILABLE, v);
    }
    if let Some(v) = props.maximum_packet_size {
        write_u32_prop(&mut out, MAXIMUM_PACKET_SIZE, v);
    }
    if let Some(v) = props.assigned_client_identifier.as_deref() {
        write_string_prop(&mut out, ASSIGNED_CLIENT_IDENTIFIER, v);
    }
    if let Some(v) = props.topic_alias_maximum {
        write_u16_prop(&mut out, TOPIC_ALIAS_MAXIMUM, v);
    }
    if let Some(v) = props.reason_string.as_deref() {
        write_string_prop(&mut out, REASON_STRING, v);
    }
    if let Some(v) = props.wildcard_subscription_available {
        write_bool_prop(&mut out, WILDCARD_SUBSCRIPTION_AVAILABLE, v);
    }
    if let Some(v) = props.subscription_identifiers_available {
        write_bool_prop(&mut out, SUBSCRIPTION_IDENTIFIER_AVAILABLE, v);
    }
    if let Some(v) = props.shared_subscription_available {
        write_bool_prop(&mut out, SHARED_SUBSCRIPTION_AVAILABLE, v);
    }
    if let Some(v) = props.server_keep_alive {
        write_u16_prop(&mut out, SERVER_KEEP_ALIVE, v);
    }
    if let Some(v) = props.response_information.as_deref() {
        write_string_prop(&mut out, RESPONSE_INFORMATION, v);
    }
    if let Some(v) = props.server_reference.as_deref() {
        write_string_prop(&mut out, SERVER_REFERENCE, v);
    }
    if let Some(v) = props.authentication_method.as_deref() {
        write_string_prop(&mut out, AUTHENTICATION_METHOD, v);
    }
    if let Some(v) = props.authentication_data.as_deref() {
        write_bytes_prop(&mut out, AUTHENTICATION_DATA, v);
    }
    write_user_properties(&mut out, &props.user_properties);
    out
}

pub fn decode_connack_properties(buf: &[u8]) -> Result<ConnackProperties, Error> {
    let mut props = ConnackProperties::default();
    let offset = &mut 0usize;
    decode_loop!(buf, offset, id, {
        match id {
            SESSION_EXPIRY_INTERVAL => props.session_expiry_interval = Some(read_u32(buf, offset)?),
            RECEIVE_MAXIMUM => props.receive_maximum = Some(read_u16(buf, offset)?),
            MAXIMUM_QOS => props.maximum_qos = Some(read_u8(buf, offset)?),
            RETAIN_AVAILABLE => props.retain_available = Some(read_u8(buf, offset)? != 0),
            MAXIMUM_PACKET_SIZE => props.maximum_packet_size = Some(read_u32(buf, offset)?),
            ASSIGNED_CLIENT_IDENTIFIER => {
                props.assigned_client_identifier = Some(read_string(buf, offset)?.to_string())
            }
            TOPIC_ALIAS_MAXIMUM => props.topic_alias_maximum = Some(read_u16(buf, offset)?),
            REASON_STRING => props.reason_string = Some(read_string(buf, offset)?.to_string()),
            WILDCARD_SUBSCRIPTION_AVAILABLE => {
                props.wildcard_subscription_available = Some(read_u8(buf, offset)? != 0)
            }
            SUBSCRIPTION_IDENTIFIER_AVAILABLE => {
                props.subscription_identifiers_available = Some(read_u8(buf, offset)? != 0)
            }
            SHARED_SUBSCRIPTION_AVAILABLE => {
                props.shared_subscription_available = Some(read_u8(buf, offset)? != 0)
            }
            SERVER_KEEP_ALIVE => props.server_keep_alive = Some(read_u16(buf, offset)?),
            RESPONSE_INFORMATION => {
                props.response_information = Some(read_string(buf, offset)?.to_string())
            }
            SERVER_REFERENCE => props.server_reference = Some(read_string(buf, offset)?.to_string()),
            AUTHENTICATION_METHOD => {
                props.authentication_method = Some(read_string(buf, offset)?.to_string())
            }
            AUTHENTICATION_DATA => {
                props.authentication_data = Some(read_bytes(buf, offset)?.to_vec())
            }
            USER_PROPERTY => props.user_properties.push(UserProperty {
                name: read_string(buf, offset)?.to_string(),
                value: read_string(buf, offset)?.to_string(),
            }),
            n => return Err(Error::InvalidPropertyId(n)),
        }
    });
    Ok(props)
}

pub fn encode_publish_properties(props: &PublishProperties) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(v) = props.payload_format_indicator {
        write_u8_prop(&mut out, PAYLOAD_FORMAT_INDICATOR, v as u8);
    }
    if let Some(v) = props.message_expiry_interval {
        write_u32_prop(&mut out, MESSAGE_EXPIRY_INTERVAL, v);
    }
    if let Some(v) = props.topic_alias {
        write_u16_prop(&mut out, TOPIC_ALIAS, v);
    }
    if let Some(v) = props.response_topic.as_deref() {
        write_string_prop(&mut out, RESPONSE_TOPIC, v);
    }
    if let Some(v) = props.correlation_data.as_deref() {
        write_bytes_prop(&mut out, CORRELATION_DATA, v);
    }
    for id in &props.subscription_identifiers {
        write_var_int_prop(&mut out, SUBSCRIPTION_IDENTIFIER, *id);
    }
    if let Some(v) = props.content_type.as_deref() {
        write_string_prop(&mut out, CONTENT_TYPE, v);
    }
    write_user_properties(&mut out, &props.user_properties);
    out
}

pub fn decode_publish_properties(buf: &[u8]) -> Result<PublishProperties, Error> {
    let mut props = PublishProperties::default();
    let offset = &mut 0usize;
    decode_loop!(buf, offset, id, {
        match id {
            PAYLOAD_FORMAT_INDICATOR => {
                props.payload_format_indicator =
                    Some(PayloadFormatIndicator::from_u8(read_u8(buf, offset)?)?)
            }
            MESSAGE_EXPIRY_INTERVAL => props.message_expiry_interval = Some(read_u32(buf, offset)?),
            TOPIC_ALIAS => props.topic_alias = Some(read_u16(buf, offset)?),
            RESPONSE_TOPIC => props.response_topic = Some(read_string(buf, offset)?.to_string()),
            CORRELATION_DATA => props.correlation_data = Some(read_bytes(buf, offset)?.to_vec()),
            SUBSCRIPTION_IDENTIFIER => {
                let (value, _) = decode_var_int(&buf[*offset..])?.ok_or(Error::UnexpectedEof)?;
                *offset += crate::vli::var_int_len(value as usize)?;
                props.subscription_identifiers.push(value);
            }
            CONTENT_TYPE => props.content_type = Some(read_string(buf, offset)?.to_string()),
            USER_PROPERTY => props.user_properties.push(UserProperty {
                name: read_string(buf, offset)?.to_string(),
                value: read_string(buf, offset)?.to_string(),
            }),
            n => return Err(Error::InvalidPropertyId(n)),
        }
    });
    Ok(props)
}

pub fn encode_ack_properties(props: &AckProperties) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(v) = props.reason_string.as_deref() {
        write_string_prop(&mut out, REASON_STRING, v);
    }
    write_user_properties(&mut out, &props.user_properties);
    out
}

pub fn decode_ack_properties(buf: &[u8]) -> Result<AckProperties, Error> {
    let mut props = AckProperties::default();
    let offset = &mut 0usize;
    decode_loop!(buf, offset, id, {
        match id {
            REASON_STRING => props.reason_string = Some(read_string(buf, offset)?.to_string()),
            USER_PROPERTY => props.user_properties.push(UserProperty {
                name: read_string(buf, offset)?.to_string(),
                value: read_string(buf, offset)?.to_string(),
            }),
            n => return Err(Error::InvalidPropertyId(n)),
        }
    });
    Ok(props)
}

pub fn encode_subscribe_properties(props: &SubscribeProperties) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(v) = props.subscription_identifier {
        write_var_int_prop(&mut out, SUBSCRIPTION_IDENTIFIER, v);
    }
    write_user_properties(&mut out, &props.user_properties);
    out
}

pub fn decode_subscribe_properties(buf: &[u8]) -> Result<SubscribeProperties, Error> {
    let mut props = SubscribeProperties::default();
    let offset = &mut 0usize;
    decode_loop!(buf, offset, id, {
        match id {
            SUBSCRIPTION_IDENTIFIER => {
                let (value, _) = decode_var_int(&buf[*offset..])?.ok_or(Error::UnexpectedEof)?;
                *offset += crate::vli::var_int_len(value as usize)?;
                props.subscription_identifier = Some(value);
            }
            USER_PROPERTY => props.user_properties.push(UserProperty {
                name: read_string(buf, offset)?.to_string(),
                value: read_string(buf, offset)?.to_string(),
            }),
            n => return Err(Error::InvalidPropertyId(n)),
        }
    });
    Ok(props)
}

pub fn encode_unsubscribe_properties(props: &UnsubscribeProperties) -> Vec<u8> {
    let mut out = Vec::new();
    write_user_properties(&mut out, &props.user_properties);
    out
}

pub fn decode_unsubscribe_properties(buf: &[u8]) -> Result<UnsubscribeProperties, Error> {
    let mut props = UnsubscribeProperties::default();
    let offset = &mut 0usize;
    decode_loop!(buf, offset, id, {
        match id {
            USER_PROPERTY => props.user_properties.push(UserProperty {
                name: read_string(buf, offset)?.to_string(),
                value: read_string(buf, offset)?.to_string(),
            }),
            n => return Err(Error::InvalidPropertyId(n)),
        }
    });
    Ok(props)
}

pub fn encode_disconnect_properties(props: &DisconnectProperties) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(v) = props.session_expiry_interval {
        write_u32_prop(&mut out, SESSION_EXPIRY_INTERVAL, v);
    }
    if let Some(v) = props.reason_string.as_deref() {
        write_string_prop(&mut out, REASON_STRING, v);
    }
    if let Some(v) = props.server_reference.as_deref() {
        write_string_prop(&mut out, SERVER_REFERENCE, v);
    }
    write_user_properties(&mut out, &props.user_properties);
    out
}

pub fn decode_disconnect_properties(buf: &[u8]) -> Result<DisconnectProperties, Error> {
    let mut props = DisconnectProperties::default();
    let offset = &mut 0usize;
    decode_loop!(buf, offset, id, {
        match id {
            SESSION_EXPIRY_INTERVAL => props.session_expiry_interval = Some(read_u32(buf, offset)?),
            REASON_STRING => props.reason_string = Some(read_string(buf, offset)?.to_string()),
            SERVER_REFERENCE => props.server_reference = Some(read_string(buf, offset)?.to_string()),
            USER_PROPERTY => props.user_properties.push(UserProperty {
                name: read_string(buf, offset)?.to_string(),
                value: read_string(buf, offset)?.to_string(),
            }),
            n => return Err(Error::InvalidPropertyId(n)),
        }
    });
    Ok(props)
}

/// Prefix `body` with its own Variable Length Integer length and append to
/// `out` — the shape every MQTT 5 property block takes on the wire.
pub fn write_property_block(out: &mut Vec<u8>, body: &[u8]) {
    write_var_int(out, body.len());
    out.extend_from_slice(body);
}
