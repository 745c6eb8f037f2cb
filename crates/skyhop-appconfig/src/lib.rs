//! Remote app configuration for the Skyhop VPN client core
//!
//! [`AppConfig`] owns the persisted configuration record and the
//! bug-report policy, keeps both fresh through the periodic update
//! manager, and publishes changes on a watch channel.

pub mod api;
pub mod bugreport;
pub mod legacy;
pub mod response;
pub mod store;

pub use api::AppConfigApi;
pub use bugreport::{BugReportConfigStore, DynamicReportModel};
pub use response::{
    AppConfigResponse, DefaultPorts, DefaultPortsConfig, FeatureFlags, RatingConfig,
    SmartProtocolConfig,
};
pub use store::AppConfigStore;

use parking_lot::Mutex;
use skyhop_common::{ApiResult, SmartProtocols, Storage};
use skyhop_updates::{PeriodicUpdateManager, PeriodicUpdateSpec, UpdateHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

const CONFIG_UPDATE_DELAY_UI: Duration = Duration::from_secs(2 * 60 * 60);
const CONFIG_UPDATE_DELAY: Duration = Duration::from_secs(12 * 60 * 60);
const CONFIG_UPDATE_DELAY_FAIL: Duration = Duration::from_secs(2 * 60 * 60);
const BUG_REPORT_UPDATE_DELAY: Duration = Duration::from_secs(2 * 24 * 60 * 60);

const MINIMUM_MAINTENANCE_CHECK_MINUTES: u64 = 5;

/// Orchestrator for remote configuration and bug-report policy
pub struct AppConfig {
    updates: Arc<PeriodicUpdateManager>,
    config_tx: Arc<watch::Sender<AppConfigResponse>>,
    bug_report_store: BugReportConfigStore,
    /// Smart protocols are consulted on every server filter, keep them cached
    smart_protocols_cache: Arc<Mutex<Option<SmartProtocols>>>,
    app_config_update: UpdateHandle<ApiResult<AppConfigResponse>>,
    bug_report_update: UpdateHandle<ApiResult<DynamicReportModel>>,
}

impl AppConfig {
    pub fn new(
        api: Arc<dyn AppConfigApi>,
        storage: Storage,
        updates: Arc<PeriodicUpdateManager>,
        logged_in: watch::Receiver<bool>,
        in_foreground: watch::Receiver<bool>,
    ) -> Self {
        let store = AppConfigStore::new(storage.clone());
        let bug_report_store = BugReportConfigStore::new(storage);
        let config_tx = Arc::new(watch::channel(store.load()).0);
        let smart_protocols_cache = Arc::new(Mutex::new(None));

        let app_config_update = updates.register_api_call(
            "app_config",
            {
                let api = api.clone();
                let store = store.clone();
                let config_tx = config_tx.clone();
                let cache = smart_protocols_cache.clone();
                move || {
                    let api = api.clone();
                    let store = store.clone();
                    let config_tx = config_tx.clone();
                    let cache = cache.clone();
                    async move {
                        let result = api.get_app_config().await;
                        if let Ok(config) = &result {
                            info!("app config refreshed");
                            store.save(config);
                            *cache.lock() = None;
                            config_tx.send_replace(config.clone());
                        }
                        result
                    }
                }
            },
            vec![
                PeriodicUpdateSpec::new(
                    CONFIG_UPDATE_DELAY_UI,
                    vec![logged_in.clone(), in_foreground],
                ),
                PeriodicUpdateSpec::with_retry(
                    CONFIG_UPDATE_DELAY,
                    CONFIG_UPDATE_DELAY_FAIL,
                    vec![],
                ),
            ],
        );

        let bug_report_update = updates.register_api_call(
            "bug_report",
            {
                let api = api.clone();
                let bug_report_store = bug_report_store.clone();
                move || {
                    let api = api.clone();
                    let bug_report_store = bug_report_store.clone();
                    async move {
                        let result = api.get_bug_report_config().await;
                        if let Ok(model) = &result {
                            bug_report_store.save(model);
                        }
                        result
                    }
                }
            },
            vec![PeriodicUpdateSpec::new(BUG_REPORT_UPDATE_DELAY, vec![logged_in])],
        );

        Self {
            updates,
            config_tx,
            bug_report_store,
            smart_protocols_cache,
            app_config_update,
            bug_report_update,
        }
    }

    /// Refresh config and bug-report policy immediately, in parallel.
    /// Called on login and after an app upgrade.
    pub async fn force_update(&self) -> ApiResult<AppConfigResponse> {
        let (config_result, _bug_report_result) = tokio::join!(
            self.updates.execute_now(&self.app_config_update),
            self.updates.execute_now(&self.bug_report_update),
        );
        config_result
    }

    pub fn config(&self) -> AppConfigResponse {
        self.config_tx.borrow().clone()
    }

    /// Subscribe to configuration changes
    pub fn config_watch(&self) -> watch::Receiver<AppConfigResponse> {
        self.config_tx.subscribe()
    }

    pub fn smart_protocols(&self) -> SmartProtocols {
        let mut cache = self.smart_protocols_cache.lock();
        cache
            .get_or_insert_with(|| {
                self.config_tx
                    .borrow()
                    .smart_protocol_config
                    .smart_protocols()
            })
            .clone()
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        self.config_tx.borrow().feature_flags.clone()
    }

    pub fn rating_config(&self) -> RatingConfig {
        self.config_tx.borrow().rating_config.clone()
    }

    pub fn wireguard_ports(&self) -> DefaultPorts {
        self.config_tx
            .borrow()
            .default_ports_config
            .wireguard_ports
            .clone()
    }

    /// Maintenance-check delay, clamped to a 5-minute floor
    pub fn maintenance_check_delay(&self) -> Duration {
        let minutes = self
            .config_tx
            .borrow()
            .under_maintenance_detection_delay_minutes
            .max(MINIMUM_MAINTENANCE_CHECK_MINUTES);
        Duration::from_secs(minutes * 60)
    }

    pub fn bug_report_model(&self) -> DynamicReportModel {
        self.bug_report_store.load()
    }
}
