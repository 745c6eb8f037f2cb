//! Obsolete on-disk configuration schema
//!
//! Kept only so an existing install can be migrated; live code never
//! constructs these types. The legacy blob used camelCase identifiers
//! and optional fields standing in for defaults.

use crate::response::{
    AppConfigResponse, DefaultPorts, DefaultPortsConfig, FeatureFlags, RatingConfig,
    SmartProtocolConfig, DEFAULT_ATTEMPT_COUNT, DEFAULT_CHANGE_LONG_DELAY_SECONDS,
    DEFAULT_CHANGE_SHORT_DELAY_SECONDS, DEFAULT_LARGE_METRICS_SAMPLING_MULTIPLIER,
    DEFAULT_MAINTENANCE_CHECK_MINUTES, DEFAULT_SERVER_LIST_REFRESH_BACKGROUND_MINUTES,
    DEFAULT_SERVER_LIST_REFRESH_FOREGROUND_MINUTES,
};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfigResponseLegacyStorage {
    under_maintenance_detection_delay: u64,
    logicals_refresh_foreground_delay_minutes: Option<u64>,
    logicals_refresh_background_delay_minutes: Option<u64>,
    change_server_attempt_limit: Option<u32>,
    change_server_short_delay_in_seconds: Option<u32>,
    change_server_long_delay_in_seconds: Option<u32>,
    default_ports_config: Option<DefaultPortsConfigLegacyStorage>,
    feature_flags: FeatureFlagsLegacyStorage,
    smart_protocol_config: Option<SmartProtocolConfigLegacyStorage>,
    rating_config: Option<RatingConfigLegacyStorage>,
    large_metrics_sampling_multiplier: Option<u32>,
}

impl Default for AppConfigResponseLegacyStorage {
    fn default() -> Self {
        Self {
            under_maintenance_detection_delay: DEFAULT_MAINTENANCE_CHECK_MINUTES,
            logicals_refresh_foreground_delay_minutes: None,
            logicals_refresh_background_delay_minutes: None,
            change_server_attempt_limit: None,
            change_server_short_delay_in_seconds: None,
            change_server_long_delay_in_seconds: None,
            default_ports_config: None,
            feature_flags: FeatureFlagsLegacyStorage::default(),
            smart_protocol_config: None,
            rating_config: None,
            large_metrics_sampling_multiplier: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlagsLegacyStorage {
    maintenance_tracker_enabled: bool,
    guest_hole_enabled: bool,
    poll_api_notifications: bool,
    streaming_services_logos: bool,
    wireguard_tls_enabled: bool,
}

impl Default for FeatureFlagsLegacyStorage {
    fn default() -> Self {
        Self {
            maintenance_tracker_enabled: true,
            guest_hole_enabled: false,
            poll_api_notifications: true,
            streaming_services_logos: false,
            wireguard_tls_enabled: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultPortsConfigLegacyStorage {
    wireguard_ports: DefaultPortsLegacyStorage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultPortsLegacyStorage {
    udp_ports: Vec<u16>,
    #[serde(default)]
    tcp_ports: Vec<u16>,
    #[serde(default)]
    tls_ports_internal: Option<Vec<u16>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartProtocolConfigLegacyStorage {
    wireguard_enabled: bool,
    #[serde(default = "enabled")]
    wireguard_tcp_enabled: bool,
    #[serde(default = "enabled")]
    wireguard_tls_enabled: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingConfigLegacyStorage {
    eligible_plans: Vec<String>,
    successful_connection_count: u32,
    days_since_last_rating_count: u32,
    days_connected_count: u32,
    days_from_first_connection_count: u32,
}

impl AppConfigResponseLegacyStorage {
    /// Pure field mapping from the legacy shape to the current schema
    pub fn migrate(self) -> AppConfigResponse {
        AppConfigResponse {
            under_maintenance_detection_delay_minutes: self.under_maintenance_detection_delay,
            logicals_refresh_foreground_delay_minutes: self
                .logicals_refresh_foreground_delay_minutes
                .unwrap_or(DEFAULT_SERVER_LIST_REFRESH_FOREGROUND_MINUTES),
            logicals_refresh_background_delay_minutes: self
                .logicals_refresh_background_delay_minutes
                .unwrap_or(DEFAULT_SERVER_LIST_REFRESH_BACKGROUND_MINUTES),
            change_server_attempt_limit: self
                .change_server_attempt_limit
                .unwrap_or(DEFAULT_ATTEMPT_COUNT),
            change_server_short_delay_seconds: self
                .change_server_short_delay_in_seconds
                .unwrap_or(DEFAULT_CHANGE_SHORT_DELAY_SECONDS),
            change_server_long_delay_seconds: self
                .change_server_long_delay_in_seconds
                .unwrap_or(DEFAULT_CHANGE_LONG_DELAY_SECONDS),
            default_ports_config: self
                .default_ports_config
                .map(DefaultPortsConfigLegacyStorage::migrate)
                .unwrap_or_default(),
            feature_flags: self.feature_flags.migrate(),
            smart_protocol_config: self
                .smart_protocol_config
                .map(SmartProtocolConfigLegacyStorage::migrate)
                .unwrap_or_default(),
            rating_config: self
                .rating_config
                .map(RatingConfigLegacyStorage::migrate)
                .unwrap_or_default(),
            large_metrics_sampling_multiplier: self
                .large_metrics_sampling_multiplier
                .unwrap_or(DEFAULT_LARGE_METRICS_SAMPLING_MULTIPLIER),
        }
    }
}

impl FeatureFlagsLegacyStorage {
    fn migrate(self) -> FeatureFlags {
        FeatureFlags {
            maintenance_tracker_enabled: self.maintenance_tracker_enabled,
            guest_hole_enabled: self.guest_hole_enabled,
            poll_api_notifications: self.poll_api_notifications,
            streaming_services_logos: self.streaming_services_logos,
            wireguard_tls_enabled: self.wireguard_tls_enabled,
        }
    }
}

impl DefaultPortsConfigLegacyStorage {
    fn migrate(self) -> DefaultPortsConfig {
        let ports = self.wireguard_ports;
        let tls_ports = ports
            .tls_ports_internal
            .unwrap_or_else(|| ports.tcp_ports.clone());
        DefaultPortsConfig {
            wireguard_ports: DefaultPorts {
                udp_ports: ports.udp_ports,
                tcp_ports: ports.tcp_ports,
                tls_ports,
            },
        }
    }
}

impl SmartProtocolConfigLegacyStorage {
    fn migrate(self) -> SmartProtocolConfig {
        SmartProtocolConfig {
            wireguard_enabled: self.wireguard_enabled,
            wireguard_tcp_enabled: self.wireguard_tcp_enabled,
            wireguard_tls_enabled: self.wireguard_tls_enabled,
        }
    }
}

impl RatingConfigLegacyStorage {
    fn migrate(self) -> RatingConfig {
        RatingConfig {
            eligible_plans: self.eligible_plans,
            successful_connection_count: self.successful_connection_count,
            days_since_last_rating_count: self.days_since_last_rating_count,
            days_connected_count: self.days_connected_count,
            days_from_first_connection_count: self.days_from_first_connection_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_STORAGE_JSON: &str = r#"{"changeServerAttemptLimit":4,"changeServerLongDelayInSeconds":600,"changeServerShortDelayInSeconds":45,"defaultPortsConfig":{"wireguardPorts":{"tcpPorts":[443],"tlsPortsInternal":[443],"udpPorts":[443,88,1224,51820,500,4500]}},"featureFlags":{"guestHoleEnabled":false,"maintenanceTrackerEnabled":true,"pollApiNotifications":true,"streamingServicesLogos":true,"wireguardTlsEnabled":true},"largeMetricsSamplingMultiplier":100,"logicalsRefreshBackgroundDelayMinutes":2880,"logicalsRefreshForegroundDelayMinutes":180,"ratingConfig":{"daysConnectedCount":3,"daysFromFirstConnectionCount":0,"daysSinceLastRatingCount":100,"eligiblePlans":["vpn2022","bundle2022"],"successfulConnectionCount":2},"smartProtocolConfig":{"wireguardEnabled":true,"wireguardTcpEnabled":true,"wireguardTlsEnabled":true},"underMaintenanceDetectionDelay":40}"#;

    #[test]
    fn test_migrate_from_legacy_storage() {
        let legacy: AppConfigResponseLegacyStorage =
            serde_json::from_str(LEGACY_STORAGE_JSON).unwrap();
        let config = legacy.migrate();
        assert_eq!(config.change_server_attempt_limit, 4);
        assert_eq!(config.change_server_short_delay_seconds, 45);
        assert_eq!(config.change_server_long_delay_seconds, 600);
        assert_eq!(config.under_maintenance_detection_delay_minutes, 40);
        assert_eq!(config.rating_config.successful_connection_count, 2);
        assert_eq!(
            config.default_ports_config.wireguard_ports.udp_ports,
            vec![443, 88, 1224, 51820, 500, 4500]
        );
        assert!(config.feature_flags.streaming_services_logos);
    }

    #[test]
    fn test_migrate_fills_missing_sections_with_defaults() {
        let legacy: AppConfigResponseLegacyStorage =
            serde_json::from_str(r#"{"featureFlags":{}}"#).unwrap();
        let config = legacy.migrate();
        assert_eq!(config.smart_protocol_config, SmartProtocolConfig::default());
        assert_eq!(config.default_ports_config, DefaultPortsConfig::default());
        assert_eq!(config.change_server_attempt_limit, 4);
        // The legacy default differed from the current schema's default.
        assert!(config.feature_flags.poll_api_notifications);
    }
}
