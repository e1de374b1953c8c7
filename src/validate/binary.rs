//! Pre-encode validation of the binary packet form (spec.md §4.D): the
//! last gate before bytes reach the encoder. Checks that only apply once a
//! packet has been reduced to fixed-width fields and framed byte buffers
//! — length limits and checks against negotiated server capabilities
//! chief among them — live here rather than in [`crate::validate::user`].

use crate::error::ValidationError;
use crate::packet::binary::{BinaryDisconnect, BinaryPacket, BinarySubscribeFilter};
use crate::settings::NegotiatedSettings;
use crate::types::Version;

fn is_shared_subscription(filter: &[u8]) -> bool {
    filter.starts_with(b"$share/")
}

fn has_wildcard(filter: &[u8]) -> bool {
    filter.contains(&b'+') || filter.contains(&b'#')
}

fn validate_filter(
    f: &BinarySubscribeFilter,
    settings: Option<&NegotiatedSettings>,
) -> Result<(), ValidationError> {
    if is_shared_subscription(&f.filter) {
        if let Some(s) = settings {
            if !s.shared_subscriptions_available {
                return Err(ValidationError::binary(
                    "shared subscriptions are not supported by the server",
                ));
            }
        }
        if f.no_local {
            return Err(ValidationError::binary(
                "shared subscriptions must not set the no-local flag",
            ));
        }
    } else if has_wildcard(&f.filter) {
        if let Some(s) = settings {
            if !s.wildcard_subscriptions_available {
                return Err(ValidationError::binary(
                    "wildcard subscriptions are not supported by the server",
                ));
            }
        }
    }
    Ok(())
}

fn validate_disconnect(
    d: &BinaryDisconnect,
    settings: Option<&NegotiatedSettings>,
) -> Result<(), ValidationError> {
    if let Some(s) = settings {
        if s.session_expiry_interval == 0 && d.session_expiry_interval.unwrap_or(0) > 0 {
            return Err(ValidationError::binary(
                "disconnect session expiry interval must be 0 when the connection negotiated no session expiry",
            ));
        }
    }
    Ok(())
}

/// `settings` is the negotiated connection state (spec.md §3); `None`
/// means nothing has been negotiated yet (e.g. the Connect packet itself).
pub fn validate_binary(
    packet: &BinaryPacket,
    version: Version,
    settings: Option<&NegotiatedSettings>,
) -> Result<(), ValidationError> {
    let total = packet
        .total_len(version)
        .map_err(|e| ValidationError::binary(e.to_string()))?;
    if let Some(max) = settings.and_then(|s| s.maximum_packet_size_to_server) {
        if total > max as usize {
            return Err(ValidationError::binary(format!(
                "packet of {total} bytes exceeds established maximum packet size of {max} bytes"
            )));
        }
    }
    match packet {
        BinaryPacket::Publish(p) => {
            if p.topic_name.len() > u16::MAX as usize {
                return Err(ValidationError::binary("topic name exceeds 65535 bytes"));
            }
            if p.qos as u8 > 0 && p.pid.is_none() {
                return Err(ValidationError::binary("QoS 1/2 publish must carry a packet id"));
            }
            if p.qos as u8 == 0 && p.pid.is_some() {
                return Err(ValidationError::binary("QoS 0 publish must not carry a packet id"));
            }
            if p.qos as u8 == 0 && p.dup {
                return Err(ValidationError::binary("QoS 0 publish must not carry the duplicate flag"));
            }
            if let Some(s) = settings {
                if (p.qos as u8) > (s.maximum_qos as u8) {
                    return Err(ValidationError::binary(
                        "publish QoS exceeds the maximum QoS accepted by the server",
                    ));
                }
                if p.retain && !s.retain_available {
                    return Err(ValidationError::binary(
                        "retained publishes are not supported by the server",
                    ));
                }
                if let Some(alias) = p.topic_alias {
                    if alias == 0 || alias > s.topic_alias_maximum_to_server {
                        return Err(ValidationError::binary(
                            "topic alias is out of the range accepted by the server",
                        ));
                    }
                }
            }
            if p.has_subscription_identifiers {
                return Err(ValidationError::binary(
                    "outbound publish must not carry subscription identifiers",
                ));
            }
        }
        BinaryPacket::Subscribe(s) => {
            if s.filters.is_empty() {
                return Err(ValidationError::binary("subscribe has no filters"));
            }
            for f in &s.filters {
                validate_filter(f, settings)?;
            }
        }
        BinaryPacket::Unsubscribe(u) if u.filters.is_empty() => {
            return Err(ValidationError::binary("unsubscribe has no filters"));
        }
        BinaryPacket::Disconnect(d) => validate_disconnect(d, settings)?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::binary::{BinaryPublish, BinarySubscribe};
    use crate::packet::properties::RetainHandlingType;
    use bytes::Bytes;

    fn publish(qos: crate::types::QoS, payload_len: usize) -> BinaryPublish {
        BinaryPublish {
            dup: false,
            qos,
            retain: false,
            pid: if qos == crate::types::QoS::Level0 {
                None
            } else {
                Some(crate::types::Pid::try_from(1u16).unwrap())
            },
            topic_name: Bytes::from_static(b"a"),
            properties: Bytes::new(),
            payload: Bytes::from(vec![0u8; payload_len]),
            topic_alias: None,
            has_subscription_identifiers: false,
        }
    }

    #[test]
    fn rejects_qos0_publish_with_pid() {
        let mut p = publish(crate::types::QoS::Level0, 0);
        p.pid = Some(crate::types::Pid::try_from(1u16).unwrap());
        let packet = BinaryPacket::Publish(p);
        assert!(validate_binary(&packet, Version::V311, None).is_err());
    }

    #[test]
    fn rejects_oversized_packet() {
        let packet = BinaryPacket::Publish(publish(crate::types::QoS::Level0, 100));
        let small = NegotiatedSettings {
            maximum_packet_size_to_server: Some(10),
            ..default_settings()
        };
        let big = NegotiatedSettings {
            maximum_packet_size_to_server: Some(1000),
            ..default_settings()
        };
        assert!(validate_binary(&packet, Version::V311, Some(&small)).is_err());
        assert!(validate_binary(&packet, Version::V311, Some(&big)).is_ok());
    }

    /// One byte over the established maximum fails; exactly at it passes.
    #[test]
    fn exact_boundary_around_maximum_packet_size() {
        let packet = BinaryPacket::Publish(BinaryPublish {
            topic_name: Bytes::from_static(b"t"),
            ..publish(crate::types::QoS::Level0, 131073)
        });
        let total = packet.total_len(Version::V311).unwrap();
        let under = NegotiatedSettings {
            maximum_packet_size_to_server: Some((total - 1) as u32),
            ..default_settings()
        };
        let exact = NegotiatedSettings {
            maximum_packet_size_to_server: Some(total as u32),
            ..default_settings()
        };
        assert!(validate_binary(&packet, Version::V311, Some(&under)).is_err());
        assert!(validate_binary(&packet, Version::V311, Some(&exact)).is_ok());
    }

    #[test]
    fn rejects_qos_above_negotiated_maximum() {
        let packet = BinaryPacket::Publish(publish(crate::types::QoS::Level2, 0));
        let settings = NegotiatedSettings {
            maximum_qos: crate::types::QoS::Level1,
            ..default_settings()
        };
        assert!(validate_binary(&packet, Version::V500, Some(&settings)).is_err());
    }

    #[test]
    fn rejects_dup_on_qos0_publish() {
        let mut p = publish(crate::types::QoS::Level0, 0);
        p.dup = true;
        let packet = BinaryPacket::Publish(p);
        assert!(validate_binary(&packet, Version::V311, None).is_err());
    }

    #[test]
    fn rejects_disconnect_session_expiry_when_negotiated_zero() {
        let packet = BinaryPacket::Disconnect(BinaryDisconnect {
            reason_code: 0,
            properties: Bytes::new(),
            session_expiry_interval: Some(30),
        });
        assert!(validate_binary(&packet, Version::V500, Some(&default_settings())).is_err());

        let allows_expiry = NegotiatedSettings {
            session_expiry_interval: 30,
            ..default_settings()
        };
        assert!(validate_binary(&packet, Version::V500, Some(&allows_expiry)).is_ok());

        let no_expiry = BinaryPacket::Disconnect(BinaryDisconnect {
            reason_code: 0,
            properties: Bytes::new(),
            session_expiry_interval: None,
        });
        assert!(validate_binary(&no_expiry, Version::V500, Some(&default_settings())).is_ok());
    }

    #[test]
    fn rejects_shared_subscription_when_unavailable() {
        let packet = BinaryPacket::Subscribe(BinarySubscribe {
            pid: crate::types::Pid::try_from(1u16).unwrap(),
            properties: Bytes::new(),
            filters: vec![BinarySubscribeFilter {
                filter: Bytes::from_static(b"$share/g/a"),
                qos: crate::types::QoS::Level0,
                no_local: false,
                retain_as_published: false,
                retain_handling: RetainHandlingType::SendAtSubscribe,
            }],
        });
        let settings = NegotiatedSettings {
            shared_subscriptions_available: false,
            ..default_settings()
        };
        let err = validate_binary(&packet, Version::V311, Some(&settings)).unwrap_err();
        assert!(err.message.contains("not supported by the server"));
        assert!(validate_binary(&packet, Version::V500, Some(&settings)).is_err());
    }

    fn default_settings() -> NegotiatedSettings {
        NegotiatedSettings {
            maximum_qos: crate::types::QoS::Level2,
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
}
