//! Persisted app configuration with legacy-schema migration

use crate::legacy::AppConfigResponseLegacyStorage;
use crate::response::AppConfigResponse;
use skyhop_common::Storage;
use tracing::{info, warn};

const STORE_KEY: &str = "app_config";
/// Key the pre-rewrite client stored its camelCase blob under
const LEGACY_STORE_KEY: &str = "AppConfigResponse";

/// Storage facade for the current-schema configuration record.
///
/// On first load after an upgrade the legacy blob, if any, is migrated
/// into the current schema, persisted under the new key and deleted.
#[derive(Clone)]
pub struct AppConfigStore {
    storage: Storage,
}

impl AppConfigStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn load(&self) -> AppConfigResponse {
        if let Some(config) = self.storage.load::<AppConfigResponse>(STORE_KEY) {
            return config;
        }
        if self.storage.contains_key(LEGACY_STORE_KEY) {
            let migrated = self
                .storage
                .load::<AppConfigResponseLegacyStorage>(LEGACY_STORE_KEY)
                .map(AppConfigResponseLegacyStorage::migrate);
            self.storage.delete(LEGACY_STORE_KEY);
            if let Some(config) = migrated {
                info!("migrated app config from legacy storage schema");
                self.save(&config);
                return config;
            }
            warn!("legacy app config blob was undecodable, using defaults");
        }
        AppConfigResponse::default()
    }

    pub fn save(&self, config: &AppConfigResponse) {
        if let Err(err) = self.storage.save(STORE_KEY, config) {
            warn!(%err, "failed to persist app config");
        }
    }

    pub fn clear(&self) {
        self.storage.delete(STORE_KEY);
    }
}
