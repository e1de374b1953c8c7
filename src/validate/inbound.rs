//! Validation of packets received from the server (spec.md §4.D): the
//! gate between the decoder and the engine's state transitions. Any
//! failure here is a protocol error and halts the connection.

use crate::error::ValidationError;
use crate::packet::internal::{Packet, QosPid};
use crate::types::Version;

pub fn validate_inbound(packet: &Packet, version: Version) -> Result<(), ValidationError> {
    match packet {
        Packet::Connack(c) => {
            if c.session_present && !c.reason_code.is_success() {
                return Err(ValidationError::inbound(
                    "connack sessionPresent=true with a non-Success reason code",
                ));
            }
            if let Some(rm) = c.properties.receive_maximum {
                if rm == 0 {
                    return Err(ValidationError::inbound("connack receiveMaximum must be positive"));
                }
            }
            if let Some(mps) = c.properties.maximum_packet_size {
                if mps == 0 {
                    return Err(ValidationError::inbound(
                        "connack maximumPacketSize must be positive",
                    ));
                }
            }
            if let Some(qos) = c.properties.maximum_qos {
                if qos > 1 {
                    return Err(ValidationError::inbound("connack maximumQoS must be 0 or 1"));
                }
            }
            Ok(())
        }
        Packet::Publish(p) => {
            if p.topic_name.is_empty() {
                return Err(ValidationError::inbound("publish topic name must not be empty"));
            }
            if let QosPid::Level0 = p.qos_pid {
            } else if p.qos_pid.pid().is_none() {
                return Err(ValidationError::inbound("QoS 1/2 publish missing packet id"));
            }
            Ok(())
        }
        Packet::Puback(p) => {
            if p.pid.value() == 0 {
                return Err(ValidationError::inbound("puback packet id must be nonzero"));
            }
            Ok(())
        }
        Packet::Suback(s) => {
            if s.pid.value() == 0 {
                return Err(ValidationError::inbound("suback packet id must be nonzero"));
            }
            Ok(())
        }
        Packet::Unsuback(u) => {
            if u.pid.value() == 0 {
                return Err(ValidationError::inbound("unsuback packet id must be nonzero"));
            }
            Ok(())
        }
        Packet::Disconnect(d) => {
            if !version.is_v5() && d.properties.session_expiry_interval.is_some() {
                return Err(ValidationError::inbound(
                    "inbound disconnect must not carry a session expiry interval",
                ));
            }
            Ok(())
        }
        Packet::Connect(_) | Packet::Subscribe(_) | Packet::Unsubscribe(_) => Err(
            ValidationError::inbound("client-only packet type received from server"),
        ),
        Packet::Pingreq | Packet::Pingresp => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::internal::Connack;
    use crate::packet::properties::{ConnackProperties, ConnectReasonCode};

    #[test]
    fn rejects_session_present_with_failure_code() {
        let packet = Packet::Connack(Connack {
            session_present: true,
            reason_code: ConnectReasonCode::NotAuthorized,
            properties: ConnackProperties::default(),
        });
        assert!(validate_inbound(&packet, Version::V500).is_err());
    }

    #[test]
    fn rejects_zero_receive_maximum() {
        let properties = ConnackProperties {
            receive_maximum: Some(0),
            ..Default::default()
        };
        let packet = Packet::Connack(Connack {
            session_present: false,
            reason_code: ConnectReasonCode::Success,
            properties,
        });
        assert!(validate_inbound(&packet, Version::V500).is_err());
    }
}
