//! Negotiated connection settings (spec.md §3): fixed once at Connack,
//! derived from the outbound Connect and inbound Connack, falling back to
//! the MQTT 5 spec defaults for anything the server left unset.

use crate::packet::internal::{Connack, Connect};
use crate::types::QoS;

#[derive(Debug, Clone)]
pub struct NegotiatedSettings {
    pub maximum_qos: QoS,
    pub session_expiry_interval: u32,
    pub receive_maximum_from_server: u16,
    pub maximum_packet_size_to_server: Option<u32>,
    pub topic_alias_maximum_to_server: u16,
    pub topic_alias_maximum_to_client: u16,
    pub server_keep_alive: Option<u16>,
    pub retain_available: bool,
    pub wildcard_subscriptions_available: bool,
    pub subscription_identifiers_available: bool,
    pub shared_subscriptions_available: bool,
    pub rejoined_session: bool,
    pub client_id: String,
}

impl NegotiatedSettings {
    pub fn from_connect_connack(connect: &Connect, connack: &Connack) -> Self {
        let p = &connack.properties;
        NegotiatedSettings {
            maximum_qos: match p.maximum_qos {
                Some(0) => QoS::Level0,
                Some(1) => QoS::Level1,
                _ => QoS::Level2,
            },
            session_expiry_interval: p
                .session_expiry_interval
                .unwrap_or(connect.properties.session_expiry_interval.unwrap_or(0)),
            receive_maximum_from_server: p.receive_maximum.unwrap_or(65535),
            maximum_packet_size_to_server: p.maximum_packet_size,
            topic_alias_maximum_to_server: p.topic_alias_maximum.unwrap_or(0),
            topic_alias_maximum_to_client: connect.properties.topic_alias_maximum.unwrap_or(0),
            server_keep_alive: p.server_keep_alive,
            retain_available: p.retain_available.unwrap_or(true),
            wildcard_subscriptions_available: p.wildcard_subscription_available.unwrap_or(true),
            subscription_identifiers_available: p
                .subscription_identifiers_available
                .unwrap_or(true),
            shared_subscriptions_available: p.shared_subscription_available.unwrap_or(true),
            rejoined_session: connack.session_present,
            client_id: p
                .assigned_client_identifier
                .clone()
                .unwrap_or_else(|| connect.client_id.clone()),
        }
    }

    /// The effective keep-alive, in seconds: the server's `serverKeepAlive`
    /// overrides the client-requested value when present (MQTT 5 §3.2.2.3.14).
    pub fn effective_keep_alive(&self, client_requested: u16) -> u16 {
        self.server_keep_alive.unwrap_or(client_requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::properties::{ConnackProperties, ConnectReasonCode};
    use crate::types::Version;

    #[test]
    fn defaults_when_server_omits_fields() {
        let connect = Connect::new(Version::V500, "client-a", 30);
        let connack = Connack {
            session_present: false,
            reason_code: ConnectReasonCode::Success,
            properties: ConnackProperties::default(),
        };
        let settings = NegotiatedSettings::from_connect_connack(&connect, &connack);
        assert_eq!(settings.receive_maximum_from_server, 65535);
        assert_eq!(settings.maximum_qos, QoS::Level2);
        assert!(settings.retain_available);
        assert_eq!(settings.client_id, "client-a");
    }

    #[test]
    fn server_overrides_take_effect() {
        let connect = Connect::new(Version::V500, "client-a", 30);
        let properties = ConnackProperties {
            receive_maximum: Some(2),
            maximum_qos: Some(1),
            server_keep_alive: Some(60),
            ..Default::default()
        };
        let connack = Connack {
            session_present: true,
            reason_code: ConnectReasonCode::Success,
            properties,
        };
        let settings = NegotiatedSettings::from_connect_connack(&connect, &connack);
        assert_eq!(settings.receive_maximum_from_server, 2);
        assert_eq!(settings.maximum_qos, QoS::Level1);
        assert_eq!(settings.effective_keep_alive(30), 60);
        assert!(settings.rejoined_session);
    }
}
