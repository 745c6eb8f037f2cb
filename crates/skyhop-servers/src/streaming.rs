//! Streaming service catalog per exit country

use crate::api::ServersApi;
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use skyhop_common::{ApiResult, Storage};
use skyhop_updates::{PeriodicUpdateManager, PeriodicUpdateSpec, UpdateHandle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;

const STORE_KEY: &str = "streaming_services";
const STREAMING_SERVICES_UPDATE_DELAY: Duration = Duration::from_secs(2 * 24 * 60 * 60);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamingService {
    #[serde(rename = "Name")]
    pub name: String,
    /// Icon file name, relative to the catalog's resource base URL
    #[serde(rename = "Icon", default)]
    pub icon: Option<String>,
}

/// Catalog payload: country code to tier-keyed service lists
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamingServicesResponse {
    #[serde(rename = "ResourceBaseURL", default)]
    pub resource_base_url: Option<String>,
    #[serde(rename = "StreamingServices", default)]
    pub streaming_services: HashMap<String, HashMap<String, Vec<StreamingService>>>,
}

impl StreamingServicesResponse {
    /// All services available from a country, across tiers
    pub fn services_for_country(&self, country_code: &str) -> Vec<StreamingService> {
        let Some(tiers) = self.streaming_services.get(country_code) else {
            return Vec::new();
        };
        tiers.values().flatten().cloned().collect()
    }

    pub fn icon_url(&self, service: &StreamingService) -> Option<String> {
        let base = self.resource_base_url.as_deref()?;
        let icon = service.icon.as_deref()?;
        Some(format!("{}{}", base, icon))
    }
}

/// Persisted streaming catalog with an in-memory snapshot
#[derive(Clone)]
pub struct StreamingServicesStore {
    storage: Storage,
    current: Arc<ArcSwapOption<StreamingServicesResponse>>,
}

impl StreamingServicesStore {
    pub fn new(storage: Storage) -> Self {
        let current = Arc::new(ArcSwapOption::from_pointee(
            storage.load::<StreamingServicesResponse>(STORE_KEY),
        ));
        Self { storage, current }
    }

    pub fn get(&self) -> Option<Arc<StreamingServicesResponse>> {
        self.current.load_full()
    }

    pub fn save(&self, response: &StreamingServicesResponse) {
        if let Err(err) = self.storage.save(STORE_KEY, response) {
            warn!(%err, "failed to persist streaming catalog");
        }
        self.current.store(Some(Arc::new(response.clone())));
    }
}

/// Keeps the streaming catalog fresh while the app is in the foreground
pub struct StreamingServicesUpdater {
    store: StreamingServicesStore,
    updates: Arc<PeriodicUpdateManager>,
    update: UpdateHandle<ApiResult<StreamingServicesResponse>>,
}

impl StreamingServicesUpdater {
    pub fn new(
        api: Arc<dyn ServersApi>,
        storage: Storage,
        updates: Arc<PeriodicUpdateManager>,
        in_foreground: watch::Receiver<bool>,
    ) -> Self {
        let store = StreamingServicesStore::new(storage);
        let update = updates.register_api_call(
            "streaming_services",
            {
                let api = api.clone();
                let store = store.clone();
                move || {
                    let api = api.clone();
                    let store = store.clone();
                    async move {
                        let result = api.get_streaming_services().await;
                        if let Ok(catalog) = &result {
                            store.save(catalog);
                        }
                        result
                    }
                }
            },
            vec![PeriodicUpdateSpec::new(
                STREAMING_SERVICES_UPDATE_DELAY,
                vec![in_foreground],
            )],
        );
        Self {
            store,
            updates,
            update,
        }
    }

    pub fn catalog(&self) -> Option<Arc<StreamingServicesResponse>> {
        self.store.get()
    }

    pub async fn force_update(&self) -> ApiResult<StreamingServicesResponse> {
        self.updates.execute_now(&self.update).await
    }
}
