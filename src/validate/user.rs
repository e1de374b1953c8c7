//! Validation of user-submitted outbound packets, before any packet-id is
//! bound or bytes are produced (spec.md §4.D). Type/range/semantic checks
//! only; MQTT5-only fields are silently ignored rather than rejected when
//! the negotiated version is 3.1.1, matching spec.md's own wording.

use crate::error::ValidationError;
use crate::packet::internal::{Packet, QosPid};
use crate::types::{QoS, Version};

pub fn validate_outbound(packet: &Packet, version: Version) -> Result<(), ValidationError> {
    match packet {
        Packet::Connect(c) => {
            if c.client_id.len() > u16::MAX as usize {
                return Err(ValidationError::user("client id too long"));
            }
            if let Some(will) = &c.last_will {
                if will.qos == QoS::Level2 && !version.is_v5() {
                    // allowed on the wire, no additional restriction in 3.1.1
                }
            }
            Ok(())
        }
        Packet::Publish(p) => {
            if p.topic_name.is_empty() {
                return Err(ValidationError::user("publish topic name must not be empty"));
            }
            if p.topic_name.contains(['+', '#']) {
                return Err(ValidationError::user(
                    "publish topic name must not contain wildcards",
                ));
            }
            match p.qos_pid {
                QosPid::Level0 => {}
                QosPid::Level1(_) | QosPid::Level2(_) => {}
            }
            if matches!(p.qos_pid, QosPid::Level2(_)) {
                return Err(ValidationError::user(
                    "this engine cannot originate QoS 2 publishes",
                ));
            }
            Ok(())
        }
        Packet::Subscribe(s) => {
            if s.filters.is_empty() {
                return Err(ValidationError::user("subscribe must name at least one filter"));
            }
            for (filter, _) in &s.filters {
                if filter.is_shared() && filter.shared_group_name().unwrap_or("").is_empty() {
                    return Err(ValidationError::user("shared subscription group name is empty"));
                }
            }
            Ok(())
        }
        Packet::Unsubscribe(u) => {
            if u.filters.is_empty() {
                return Err(ValidationError::user(
                    "unsubscribe must name at least one filter",
                ));
            }
            Ok(())
        }
        Packet::Disconnect(d) => {
            if !version.is_v5() && d.properties.session_expiry_interval.is_some() {
                return Err(ValidationError::user(
                    "session expiry interval requires MQTT 5",
                ));
            }
            Ok(())
        }
        Packet::Connack(_)
        | Packet::Puback(_)
        | Packet::Suback(_)
        | Packet::Unsuback(_)
        | Packet::Pingreq
        | Packet::Pingresp => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::internal::Publish;
    use crate::packet::properties::PublishProperties;
    use crate::packet::internal::Payload;
    use crate::types::TopicName;

    #[test]
    fn accepts_plain_publish_topic() {
        let packet = Packet::Publish(Publish {
            dup: false,
            qos_pid: QosPid::Level0,
            retain: false,
            topic_name: TopicName::try_from("a/b").unwrap(),
            payload: Payload::Bytes(bytes::Bytes::new()),
            properties: PublishProperties::default(),
        });
        assert!(validate_outbound(&packet, Version::V311).is_ok());
    }

    #[test]
    fn rejects_qos2_publish() {
        let packet = Packet::Publish(Publish {
            dup: false,
            qos_pid: QosPid::Level2(crate::types::Pid::try_from(1u16).unwrap()),
            retain: false,
            topic_name: TopicName::try_from("a/b").unwrap(),
            payload: Payload::Bytes(bytes::Bytes::new()),
            properties: PublishProperties::default(),
        });
        assert!(validate_outbound(&packet, Version::V311).is_err());
    }

    #[test]
    fn rejects_empty_subscribe() {
        use crate::packet::internal::Subscribe;
        use crate::packet::properties::SubscribeProperties;
        let packet = Packet::Subscribe(Subscribe {
            pid: crate::types::Pid::try_from(1u16).unwrap(),
            filters: vec![],
            properties: SubscribeProperties::default(),
        });
        assert!(validate_outbound(&packet, Version::V311).is_err());
    }
}
