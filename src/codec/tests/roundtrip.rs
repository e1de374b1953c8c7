//! `decode(encode(p)) == p` for every packet type, and decode's tolerance
//! to the bytes arriving split across arbitrary chunk boundaries
//! (spec.md §8).

use proptest::prelude::*;

use crate::packet::internal::{
    Connack, Connect, Disconnect, Packet, Payload, Puback, Publish, QosPid, Subscribe,
    SubscriptionOptions, Unsubscribe,
};
use crate::packet::properties::{ConnectReasonCode, PubackReasonCode};
use crate::types::{Pid, QoS, TopicFilter, TopicName, Version};

use super::{decode_all, decode_in_chunks, encode_full};

fn topic_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9/]{1,40}".prop_filter("not empty after trim", |s| !s.is_empty())
}

fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..200)
}

fn qos_pid_strategy() -> impl Strategy<Value = QosPid> {
    (0u8..3, 1u16..=u16::MAX).prop_map(|(level, pid)| match level {
        0 => QosPid::Level0,
        1 => QosPid::Level1(Pid::try_from(pid).unwrap()),
        _ => QosPid::Level2(Pid::try_from(pid).unwrap()),
    })
}

fn qos_pid_at_most_1_strategy() -> impl Strategy<Value = QosPid> {
    (any::<bool>(), 1u16..=u16::MAX).prop_map(|(has_qos, pid)| {
        if has_qos {
            QosPid::Level1(Pid::try_from(pid).unwrap())
        } else {
            QosPid::Level0
        }
    })
}

fn publish_with(qos_pid: impl Strategy<Value = QosPid>) -> impl Strategy<Value = Publish> {
    (
        any::<bool>(),
        qos_pid,
        any::<bool>(),
        topic_name_strategy(),
        payload_strategy(),
    )
        .prop_map(|(dup, qos_pid, retain, topic, payload)| Publish {
            dup: dup && !matches!(qos_pid, QosPid::Level0),
            qos_pid,
            retain,
            topic_name: TopicName::try_from(topic).unwrap(),
            payload: Payload::Bytes(payload.into()),
            properties: Default::default(),
        })
}

fn publish_strategy() -> impl Strategy<Value = Publish> {
    publish_with(qos_pid_strategy())
}

/// Restricted to QoS 0/1: this engine never originates QoS 2 publishes
/// (spec.md §4.D), so invariants phrased over "any outbound-valid publish"
/// need a generator that only produces what the user validator accepts.
pub(super) fn publish_strategy_qos_at_most_1() -> impl Strategy<Value = Publish> {
    publish_with(qos_pid_at_most_1_strategy())
}

proptest! {
    #[test]
    fn publish_roundtrips_v311(publish in publish_strategy()) {
        let packet = Packet::Publish(publish);
        let bytes = encode_full(&packet, Version::V311);
        let decoded = decode_all(&bytes, Version::V311);
        prop_assert_eq!(decoded, vec![packet]);
    }

    #[test]
    fn publish_roundtrips_v500(publish in publish_strategy()) {
        let packet = Packet::Publish(publish);
        let bytes = encode_full(&packet, Version::V500);
        let decoded = decode_all(&bytes, Version::V500);
        prop_assert_eq!(decoded, vec![packet]);
    }

    /// However the encoded bytes are split across `decode` calls, the
    /// packets that come out are the same as decoding them all at once.
    #[test]
    fn publish_decode_is_chunk_invariant(
        publish in publish_strategy(),
        chunk_sizes in proptest::collection::vec(1usize..7, 1..20),
    ) {
        let packet = Packet::Publish(publish);
        let bytes = encode_full(&packet, Version::V500);
        let whole = decode_all(&bytes, Version::V500);
        let chunked = decode_in_chunks(&bytes, Version::V500, &chunk_sizes);
        prop_assert_eq!(whole, chunked);
    }
}

fn roundtrip(packet: Packet, version: Version) {
    let bytes = encode_full(&packet, version);
    let decoded = decode_all(&bytes, version);
    assert_eq!(decoded, vec![packet]);
}

#[test]
fn connect_roundtrips() {
    for version in [Version::V311, Version::V500] {
        roundtrip(Packet::Connect(Connect::new(version, "client-a", 30)), version);
    }
}

#[test]
fn connack_roundtrips() {
    for version in [Version::V311, Version::V500] {
        roundtrip(
            Packet::Connack(Connack {
                session_present: true,
                reason_code: ConnectReasonCode::Success,
                properties: Default::default(),
            }),
            version,
        );
    }
}

#[test]
fn puback_roundtrips() {
    for version in [Version::V311, Version::V500] {
        roundtrip(
            Packet::Puback(Puback {
                pid: Pid::try_from(7u16).unwrap(),
                reason_code: PubackReasonCode::Success,
                properties: Default::default(),
            }),
            version,
        );
    }
}

#[test]
fn subscribe_roundtrips() {
    for version in [Version::V311, Version::V500] {
        roundtrip(
            Packet::Subscribe(Subscribe {
                pid: Pid::try_from(1u16).unwrap(),
                filters: vec![
                    (
                        TopicFilter::try_from("a/b").unwrap(),
                        SubscriptionOptions::new(QoS::Level1),
                    ),
                    (
                        TopicFilter::try_from("a/+/c").unwrap(),
                        SubscriptionOptions::new(QoS::Level0),
                    ),
                ],
                properties: Default::default(),
            }),
            version,
        );
    }
}

#[test]
fn unsubscribe_roundtrips() {
    for version in [Version::V311, Version::V500] {
        roundtrip(
            Packet::Unsubscribe(Unsubscribe {
                pid: Pid::try_from(3u16).unwrap(),
                filters: vec![TopicFilter::try_from("a/#").unwrap()],
                properties: Default::default(),
            }),
            version,
        );
    }
}

#[test]
fn disconnect_roundtrips_v500_only() {
    // MQTT 3.1.1 has no client-originated Disconnect body to round-trip
    // against beyond the fixed header, which `encode_full`/`decode_all`
    // already cover via the other packet types.
    roundtrip(Packet::Disconnect(Disconnect::default()), Version::V500);
}

#[test]
fn pingreq_and_pingresp_roundtrip() {
    for version in [Version::V311, Version::V500] {
        roundtrip(Packet::Pingreq, version);
        roundtrip(Packet::Pingresp, version);
    }
}
