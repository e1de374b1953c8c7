//! Two more general invariants from spec.md §8: the encoder is idempotent
//! once drained, and a packet accepted by the user-facing validator still
//! passes the binary-stage validator once it's been reduced to its wire
//! form, under whatever settings are currently negotiated.

use proptest::prelude::*;

use crate::codec::{EncodeStatus, Encoder};
use crate::packet::binary::to_binary;
use crate::packet::internal::{Packet, Payload, Publish, QosPid};
use crate::settings::NegotiatedSettings;
use crate::types::{Pid, QoS, TopicName, Version};
use crate::validate::binary::validate_binary;
use crate::validate::user::validate_outbound;

use super::roundtrip::publish_strategy_qos_at_most_1;

fn permissive_settings() -> NegotiatedSettings {
    NegotiatedSettings {
        maximum_qos: QoS::Level2,
        session_expiry_interval: 0,
        receive_maximum_from_server: 65535,
        maximum_packet_size_to_server: None,
        topic_alias_maximum_to_server: 0,
        topic_alias_maximum_to_client: 0,
        server_keep_alive: None,
        retain_available: true,
        wildcard_subscriptions_available: true,
        subscription_identifiers_available: true,
        shared_subscriptions_available: true,
        rejoined_session: false,
        client_id: "client".to_string(),
    }
}

proptest! {
    #[test]
    fn outbound_valid_publish_passes_binary_validator(publish in publish_strategy_qos_at_most_1()) {
        let packet = Packet::Publish(publish);
        for version in [Version::V311, Version::V500] {
            prop_assert!(validate_outbound(&packet, version).is_ok());
            let binary = to_binary(&packet, version).unwrap();
            prop_assert!(validate_binary(&binary, version, None).is_ok());
            prop_assert!(validate_binary(&binary, version, Some(&permissive_settings())).is_ok());
        }
    }

    #[test]
    fn encoder_is_done_and_silent_once_drained(publish in publish_strategy_qos_at_most_1()) {
        let packet = Packet::Publish(publish);
        for version in [Version::V311, Version::V500] {
            let mut encoder = Encoder::new();
            encoder.init_for_packet(&packet, version).unwrap();
            let mut buf = [0u8; 4096];
            loop {
                let (_, status) = encoder.service(&mut buf);
                if status == EncodeStatus::Done {
                    break;
                }
            }
            let (n, status) = encoder.service(&mut buf);
            prop_assert_eq!(n, 0);
            prop_assert_eq!(status, EncodeStatus::Done);
            prop_assert!(encoder.is_done());
        }
    }
}

#[test]
fn qos2_publish_rejected_by_user_validator_before_it_ever_reaches_the_wire() {
    let packet = Packet::Publish(Publish {
        dup: false,
        qos_pid: QosPid::Level2(Pid::try_from(1u16).unwrap()),
        retain: false,
        topic_name: TopicName::try_from("a").unwrap(),
        payload: Payload::Bytes(Default::default()),
        properties: Default::default(),
    });
    assert!(validate_outbound(&packet, Version::V500).is_err());
}
