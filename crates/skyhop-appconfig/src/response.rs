//! Remote app configuration wire model
//!
//! Field identifiers are wire-stable: the backend and the persisted
//! snapshot both use these exact names, so renames here break interop.

use serde::{Deserialize, Serialize};
use skyhop_common::{ProtocolSelection, SmartProtocols, TransmissionProtocol, VpnProtocol};

pub const DEFAULT_MAINTENANCE_CHECK_MINUTES: u64 = 30;
pub const DEFAULT_SERVER_LIST_REFRESH_FOREGROUND_MINUTES: u64 = 3 * 60;
pub const DEFAULT_SERVER_LIST_REFRESH_BACKGROUND_MINUTES: u64 = 2 * 24 * 60;
pub const DEFAULT_ATTEMPT_COUNT: u32 = 4;
pub const DEFAULT_CHANGE_SHORT_DELAY_SECONDS: u32 = 90;
pub const DEFAULT_CHANGE_LONG_DELAY_SECONDS: u32 = 1200;
/// Large metrics are sampled with p = 1 / multiplier
pub const DEFAULT_LARGE_METRICS_SAMPLING_MULTIPLIER: u32 = 100;

/// Top-level remote configuration record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfigResponse {
    /// Delay in minutes before checking whether a server left maintenance
    #[serde(rename = "ServerRefreshInterval")]
    pub under_maintenance_detection_delay_minutes: u64,
    #[serde(rename = "LogicalsRefreshIntervalForegroundMinutes")]
    pub logicals_refresh_foreground_delay_minutes: u64,
    #[serde(rename = "LogicalsRefreshIntervalBackgroundMinutes")]
    pub logicals_refresh_background_delay_minutes: u64,
    #[serde(rename = "ChangeServerAttemptLimit")]
    pub change_server_attempt_limit: u32,
    #[serde(rename = "ChangeServerShortDelayInSeconds")]
    pub change_server_short_delay_seconds: u32,
    #[serde(rename = "ChangeServerLongDelayInSeconds")]
    pub change_server_long_delay_seconds: u32,
    #[serde(rename = "DefaultPorts")]
    pub default_ports_config: DefaultPortsConfig,
    #[serde(rename = "FeatureFlags")]
    pub feature_flags: FeatureFlags,
    #[serde(rename = "SmartProtocol")]
    pub smart_protocol_config: SmartProtocolConfig,
    #[serde(rename = "RatingSettings")]
    pub rating_config: RatingConfig,
    #[serde(rename = "LargeMetricsSamplingMultiplier")]
    pub large_metrics_sampling_multiplier: u32,
}

impl Default for AppConfigResponse {
    fn default() -> Self {
        Self {
            under_maintenance_detection_delay_minutes: DEFAULT_MAINTENANCE_CHECK_MINUTES,
            logicals_refresh_foreground_delay_minutes:
                DEFAULT_SERVER_LIST_REFRESH_FOREGROUND_MINUTES,
            logicals_refresh_background_delay_minutes:
                DEFAULT_SERVER_LIST_REFRESH_BACKGROUND_MINUTES,
            change_server_attempt_limit: DEFAULT_ATTEMPT_COUNT,
            change_server_short_delay_seconds: DEFAULT_CHANGE_SHORT_DELAY_SECONDS,
            change_server_long_delay_seconds: DEFAULT_CHANGE_LONG_DELAY_SECONDS,
            default_ports_config: DefaultPortsConfig::default(),
            feature_flags: FeatureFlags::default(),
            smart_protocol_config: SmartProtocolConfig::default(),
            rating_config: RatingConfig::default(),
            large_metrics_sampling_multiplier: DEFAULT_LARGE_METRICS_SAMPLING_MULTIPLIER,
        }
    }
}

/// Remotely toggled feature flags; unknown flags are ignored
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    #[serde(rename = "ServerRefresh")]
    pub maintenance_tracker_enabled: bool,
    #[serde(rename = "GuestHoles")]
    pub guest_hole_enabled: bool,
    #[serde(rename = "PollNotificationAPI")]
    pub poll_api_notifications: bool,
    #[serde(rename = "StreamingServicesLogos")]
    pub streaming_services_logos: bool,
    #[serde(rename = "WireGuardTls")]
    pub wireguard_tls_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            maintenance_tracker_enabled: true,
            guest_hole_enabled: false,
            poll_api_notifications: false,
            streaming_services_logos: false,
            wireguard_tls_enabled: true,
        }
    }
}

/// Which concrete protocols the "smart" selection may use
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartProtocolConfig {
    #[serde(rename = "WireGuard")]
    pub wireguard_enabled: bool,
    #[serde(rename = "WireGuardTCP")]
    pub wireguard_tcp_enabled: bool,
    #[serde(rename = "WireGuardTLS")]
    pub wireguard_tls_enabled: bool,
}

impl Default for SmartProtocolConfig {
    fn default() -> Self {
        Self {
            wireguard_enabled: true,
            wireguard_tcp_enabled: true,
            wireguard_tls_enabled: true,
        }
    }
}

impl SmartProtocolConfig {
    /// Ordered list of protocols enabled for smart selection
    pub fn smart_protocols(&self) -> SmartProtocols {
        let mut protocols = Vec::new();
        if self.wireguard_enabled {
            protocols.push(ProtocolSelection::new(
                VpnProtocol::WireGuard,
                TransmissionProtocol::Udp,
            ));
        }
        if self.wireguard_tcp_enabled {
            protocols.push(ProtocolSelection::new(
                VpnProtocol::WireGuard,
                TransmissionProtocol::Tcp,
            ));
        }
        if self.wireguard_tls_enabled {
            protocols.push(ProtocolSelection::new(
                VpnProtocol::WireGuard,
                TransmissionProtocol::Tls,
            ));
        }
        protocols
    }
}

/// Per-protocol default port lists
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultPortsConfig {
    #[serde(rename = "WireGuard")]
    pub wireguard_ports: DefaultPorts,
}

impl Default for DefaultPortsConfig {
    fn default() -> Self {
        Self {
            wireguard_ports: DefaultPorts::default(),
        }
    }
}

/// Port lists per transport; TLS falls back to the TCP list when absent
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DefaultPorts {
    #[serde(rename = "UDP")]
    pub udp_ports: Vec<u16>,
    #[serde(rename = "TCP")]
    pub tcp_ports: Vec<u16>,
    #[serde(rename = "TLS")]
    pub tls_ports: Vec<u16>,
}

impl Default for DefaultPorts {
    fn default() -> Self {
        Self {
            udp_ports: vec![443, 88, 1224, 51820, 500, 4500],
            tcp_ports: vec![443],
            tls_ports: vec![443],
        }
    }
}

// The TLS fallback depends on a sibling field, which serde defaults
// cannot express, hence the intermediate wire shape.
#[derive(Deserialize)]
struct DefaultPortsWire {
    #[serde(rename = "UDP")]
    udp_ports: Vec<u16>,
    #[serde(rename = "TCP", default)]
    tcp_ports: Vec<u16>,
    #[serde(rename = "TLS", default)]
    tls_ports: Option<Vec<u16>>,
}

impl<'de> Deserialize<'de> for DefaultPorts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = DefaultPortsWire::deserialize(deserializer)?;
        let tls_ports = wire.tls_ports.unwrap_or_else(|| wire.tcp_ports.clone());
        Ok(Self {
            udp_ports: wire.udp_ports,
            tcp_ports: wire.tcp_ports,
            tls_ports,
        })
    }
}

/// Conditions for showing the in-app rating prompt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    #[serde(rename = "EligiblePlans")]
    pub eligible_plans: Vec<String>,
    #[serde(rename = "SuccessConnections")]
    pub successful_connection_count: u32,
    #[serde(rename = "DaysLastReviewPassed")]
    pub days_since_last_rating_count: u32,
    #[serde(rename = "DaysConnected")]
    pub days_connected_count: u32,
    #[serde(rename = "DaysFromFirstConnection")]
    pub days_from_first_connection_count: u32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            eligible_plans: vec!["plus".to_string()],
            successful_connection_count: 3,
            days_since_last_rating_count: 3,
            days_connected_count: 3,
            days_from_first_connection_count: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG_JSON: &str = r#"
        {
          "Code": 1000,
          "DefaultPorts": {
            "WireGuard": {
              "UDP": [443, 88, 1224, 51820, 500, 4500],
              "TCP": [443],
              "TLS": [443]
            }
          },
          "ServerRefreshInterval": 40,
          "FeatureFlags": {
            "GuestHoles": true,
            "ServerRefresh": true,
            "StreamingServicesLogos": true,
            "PollNotificationAPI": true,
            "WireGuardTls": true,
            "Telemetry": true,
            "ShowNewFreePlan": false
          },
          "SmartProtocol": {
            "WireGuard": true,
            "WireGuardTCP": true,
            "WireGuardTLS": true
          },
          "RatingSettings": {
            "EligiblePlans": ["vpn2022", "bundle2022"],
            "SuccessConnections": 2,
            "DaysLastReviewPassed": 100,
            "DaysConnected": 3,
            "DaysFromFirstConnection": 0
          },
          "ChangeServerAttemptLimit": 4,
          "ChangeServerShortDelayInSeconds": 45,
          "ChangeServerLongDelayInSeconds": 600
        }
    "#;

    #[test]
    fn test_deserialize_with_defaults() {
        let config: AppConfigResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfigResponse::default());
        assert_eq!(config.change_server_short_delay_seconds, 90);
        assert_eq!(config.change_server_long_delay_seconds, 1200);
        assert_eq!(config.change_server_attempt_limit, 4);
    }

    #[test]
    fn test_deserialize_real_config() {
        let config: AppConfigResponse = serde_json::from_str(FULL_CONFIG_JSON).unwrap();
        assert_eq!(
            config.default_ports_config.wireguard_ports.tcp_ports,
            vec![443]
        );
        assert!(config.smart_protocol_config.wireguard_enabled);
        assert_eq!(config.change_server_attempt_limit, 4);
        assert_eq!(config.change_server_short_delay_seconds, 45);
        assert_eq!(config.under_maintenance_detection_delay_minutes, 40);
        assert_eq!(config.rating_config.days_since_last_rating_count, 100);
        assert!(config.feature_flags.guest_hole_enabled);
    }

    #[test]
    fn test_default_ports_tls_fallback() {
        let with_tcp: DefaultPorts =
            serde_json::from_str(r#"{ "UDP": [1, 2, 3], "TCP": [10, 11] }"#).unwrap();
        assert_eq!(with_tcp.tls_ports, vec![10, 11]);

        let without_tcp: DefaultPorts = serde_json::from_str(r#"{ "UDP": [1, 2, 3] }"#).unwrap();
        assert_eq!(without_tcp.tls_ports, Vec::<u16>::new());
    }

    #[test]
    fn test_smart_protocols_follow_flags() {
        let config = SmartProtocolConfig {
            wireguard_enabled: true,
            wireguard_tcp_enabled: false,
            wireguard_tls_enabled: true,
        };
        let protocols = config.smart_protocols();
        assert_eq!(protocols.len(), 2);
        assert_eq!(protocols[0].transmission, TransmissionProtocol::Udp);
        assert_eq!(protocols[1].transmission, TransmissionProtocol::Tls);
    }

    #[test]
    fn test_wire_names_roundtrip() {
        let json = serde_json::to_value(AppConfigResponse::default()).unwrap();
        assert!(json.get("ChangeServerAttemptLimit").is_some());
        assert!(json.get("ServerRefreshInterval").is_some());
        assert!(json["SmartProtocol"].get("WireGuardTLS").is_some());
    }
}
