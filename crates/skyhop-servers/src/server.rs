//! Server and endpoint data model
//!
//! Field identifiers mirror the logicals wire format; the persisted
//! server list uses the same shape.

use serde::{Deserialize, Serialize};
use skyhop_common::{
    ProtocolSelection, ServerFeature, ServerFeatures, SmartProtocols, TransmissionProtocol,
    VpnProtocol,
};
use std::collections::HashMap;

/// 0/1 wire flags
pub(crate) mod int_bool {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}

/// A logical server: one named entry in the directory, backed by one or
/// more physical endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Server {
    #[serde(rename = "ID")]
    pub server_id: String,
    #[serde(rename = "Name")]
    pub server_name: String,
    /// 2-letter code, or empty when unknown
    #[serde(rename = "ExitCountry", default)]
    pub exit_country: String,
    #[serde(rename = "EntryCountry", default)]
    pub entry_country: String,
    #[serde(rename = "City", default)]
    pub city: Option<String>,
    #[serde(rename = "Region", default)]
    pub state: Option<String>,
    /// Set only for members of a private gateway
    #[serde(rename = "GatewayName", default)]
    pub gateway_name: Option<String>,
    #[serde(rename = "Features", default)]
    pub features: ServerFeatures,
    #[serde(rename = "Tier", default)]
    pub tier: u8,
    /// Pre-computed ranking score; lower is better
    #[serde(rename = "Score", default)]
    pub score: f64,
    #[serde(rename = "Load", default)]
    pub load: u8,
    #[serde(rename = "Status", with = "int_bool", default)]
    pub online: bool,
    #[serde(rename = "Servers", default)]
    pub connecting_domains: Vec<ConnectingDomain>,
}

impl Server {
    pub fn is_secure_core_server(&self) -> bool {
        self.features.contains(ServerFeature::SecureCore)
    }

    pub fn is_gateway_server(&self) -> bool {
        self.gateway_name.is_some() || self.features.contains(ServerFeature::Restricted)
    }

    pub fn is_free_server(&self) -> bool {
        self.tier == 0
    }

    /// Required features are satisfied by this server's feature set
    pub fn satisfies_features(&self, required: ServerFeatures) -> bool {
        self.features.satisfies(required)
    }

    /// Any endpoint offers key-based (WireGuard) transport
    pub fn has_wireguard_support(&self) -> bool {
        self.connecting_domains
            .iter()
            .any(|domain| domain.has_wireguard_key())
    }
}

/// A physical endpoint of a logical server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectingDomain {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "EntryIP", default)]
    pub entry_ip: Option<String>,
    #[serde(rename = "ExitIP", default)]
    pub exit_ip: Option<String>,
    #[serde(rename = "Status", with = "int_bool", default)]
    pub online: bool,
    #[serde(rename = "Label", default)]
    pub label: Option<String>,
    #[serde(rename = "X25519PublicKey", default)]
    pub public_key_x25519: Option<String>,
    /// When present, restricts which protocols this endpoint accepts
    #[serde(rename = "EntryPerProtocol", default)]
    pub entry_per_protocol: Option<HashMap<String, ProtocolEntry>>,
}

/// Per-protocol entry override; an entry without its own IPv4 uses the
/// endpoint's default entry IP
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtocolEntry {
    #[serde(rename = "IPv4", default)]
    pub ipv4: Option<String>,
    #[serde(rename = "Ports", default)]
    pub ports: Vec<u16>,
}

fn protocol_entry_key(protocol: ProtocolSelection) -> &'static str {
    match protocol.transmission {
        TransmissionProtocol::Udp => "WireGuardUDP",
        TransmissionProtocol::Tcp => "WireGuardTCP",
        TransmissionProtocol::Tls => "WireGuardTLS",
    }
}

impl ConnectingDomain {
    /// Entry IP to use for a concrete protocol, honoring overrides
    pub fn entry_ip_for(&self, protocol: ProtocolSelection) -> Option<&str> {
        match &self.entry_per_protocol {
            Some(overrides) => {
                let entry = overrides.get(protocol_entry_key(protocol))?;
                entry.ipv4.as_deref().or(self.entry_ip.as_deref())
            }
            None => self.entry_ip.as_deref(),
        }
    }

    pub fn has_wireguard_key(&self) -> bool {
        self.public_key_x25519
            .as_deref()
            .map_or(false, |key| !key.trim().is_empty())
    }

    fn supports_concrete_protocol(&self, protocol: ProtocolSelection) -> bool {
        self.entry_ip_for(protocol).is_some()
            && (protocol.vpn != VpnProtocol::WireGuard || self.has_wireguard_key())
    }
}

/// Endpoint-level protocol support; "smart" matches any configured protocol
pub fn domain_supports_protocol(
    domain: &ConnectingDomain,
    protocol: ProtocolSelection,
    smart_protocols: &SmartProtocols,
) -> bool {
    if protocol.is_smart() {
        smart_protocols
            .iter()
            .any(|candidate| domain.supports_concrete_protocol(*candidate))
    } else {
        domain.supports_concrete_protocol(protocol)
    }
}

/// Server-level protocol support: any endpoint qualifies
pub fn supports_protocol(
    server: &Server,
    protocol: ProtocolSelection,
    smart_protocols: &SmartProtocols,
) -> bool {
    server
        .connecting_domains
        .iter()
        .any(|domain| domain_supports_protocol(domain, protocol, smart_protocols))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wg_udp() -> ProtocolSelection {
        ProtocolSelection::new(VpnProtocol::WireGuard, TransmissionProtocol::Udp)
    }

    fn domain(entry_ip: Option<&str>, key: Option<&str>) -> ConnectingDomain {
        ConnectingDomain {
            id: "domain-1".to_string(),
            domain: "node1.example.test".to_string(),
            entry_ip: entry_ip.map(str::to_string),
            exit_ip: None,
            online: true,
            label: None,
            public_key_x25519: key.map(str::to_string),
            entry_per_protocol: None,
        }
    }

    #[test]
    fn test_protocol_needs_entry_ip_and_key() {
        let smart = vec![];
        assert!(domain_supports_protocol(
            &domain(Some("10.0.0.1"), Some("pubkey")),
            wg_udp(),
            &smart
        ));
        assert!(!domain_supports_protocol(
            &domain(None, Some("pubkey")),
            wg_udp(),
            &smart
        ));
        assert!(!domain_supports_protocol(
            &domain(Some("10.0.0.1"), None),
            wg_udp(),
            &smart
        ));
        assert!(!domain_supports_protocol(
            &domain(Some("10.0.0.1"), Some("  ")),
            wg_udp(),
            &smart
        ));
    }

    #[test]
    fn test_entry_per_protocol_restricts_support() {
        let mut d = domain(Some("10.0.0.1"), Some("pubkey"));
        d.entry_per_protocol = Some(HashMap::from([(
            "WireGuardTCP".to_string(),
            ProtocolEntry {
                ipv4: None,
                ports: vec![443],
            },
        )]));

        let tcp = ProtocolSelection::new(VpnProtocol::WireGuard, TransmissionProtocol::Tcp);
        // Listed protocol falls back to the default entry IP.
        assert_eq!(d.entry_ip_for(tcp), Some("10.0.0.1"));
        assert!(domain_supports_protocol(&d, tcp, &vec![]));
        // Unlisted protocol is not supported on this endpoint.
        assert!(!domain_supports_protocol(&d, wg_udp(), &vec![]));
    }

    #[test]
    fn test_smart_matches_any_configured_protocol() {
        let mut d = domain(Some("10.0.0.1"), Some("pubkey"));
        d.entry_per_protocol = Some(HashMap::from([(
            "WireGuardTLS".to_string(),
            ProtocolEntry {
                ipv4: Some("10.0.0.2".to_string()),
                ports: vec![],
            },
        )]));
        let tls = ProtocolSelection::new(VpnProtocol::WireGuard, TransmissionProtocol::Tls);

        assert!(domain_supports_protocol(
            &d,
            ProtocolSelection::SMART,
            &vec![tls]
        ));
        assert!(!domain_supports_protocol(
            &d,
            ProtocolSelection::SMART,
            &vec![wg_udp()]
        ));
    }

    #[test]
    fn test_wire_deserialization() {
        let json = r#"{
            "ID": "srv-1",
            "Name": "CH#1",
            "ExitCountry": "CH",
            "EntryCountry": "CH",
            "City": "Zurich",
            "Features": 12,
            "Tier": 2,
            "Score": 1.5,
            "Load": 45,
            "Status": 1,
            "Servers": [{
                "ID": "d1",
                "Domain": "node1.example.test",
                "EntryIP": "10.0.0.1",
                "Status": 1,
                "X25519PublicKey": "key"
            }]
        }"#;
        let server: Server = serde_json::from_str(json).unwrap();
        assert!(server.online);
        assert!(server.features.contains(ServerFeature::P2P));
        assert!(server.features.contains(ServerFeature::Streaming));
        assert!(!server.is_secure_core_server());
        assert!(!server.is_gateway_server());
        assert!(server.has_wireguard_support());
    }
}
