//! Localized city and state names
//!
//! The directory stores English place names; translations for the
//! device locale are fetched separately and consulted at display time.
//! English locales skip the fetch entirely.

use crate::api::ServersApi;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use skyhop_common::{ApiResult, Storage};
use skyhop_updates::{PeriodicUpdateManager, PeriodicUpdateSpec, UpdateHandle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

const STORE_KEY: &str = "server_translations";
const TRANSLATIONS_UPDATE_DELAY: Duration = Duration::from_secs(4 * 24 * 60 * 60);

/// Device locale abstraction; the host app provides the current BCP-47
/// language tag.
pub trait LocaleProvider: Send + Sync {
    fn language_tag(&self) -> String;
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerTranslationsResponse {
    #[serde(rename = "LanguageCode", default)]
    pub language_code: String,
    /// English name to localized name
    #[serde(rename = "Cities", default)]
    pub cities: HashMap<String, String>,
    #[serde(rename = "States", default)]
    pub states: HashMap<String, String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
struct TranslationState {
    language_tag: String,
    cities: HashMap<String, String>,
    states: HashMap<String, String>,
}

/// Lookup table for localized place names, falling back to the English
/// name when no translation is known.
#[derive(Clone)]
pub struct Translator {
    storage: Storage,
    state: Arc<RwLock<TranslationState>>,
}

impl Translator {
    pub fn new(storage: Storage) -> Self {
        let state = storage.load::<TranslationState>(STORE_KEY).unwrap_or_default();
        Self {
            storage,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn translate_city(&self, city_en: &str) -> String {
        self.state
            .read()
            .cities
            .get(city_en)
            .cloned()
            .unwrap_or_else(|| city_en.to_string())
    }

    pub fn translate_state(&self, state_en: &str) -> String {
        self.state
            .read()
            .states
            .get(state_en)
            .cloned()
            .unwrap_or_else(|| state_en.to_string())
    }

    pub fn language_tag(&self) -> String {
        self.state.read().language_tag.clone()
    }

    fn store(&self, language_tag: &str, response: ServerTranslationsResponse) {
        let next = TranslationState {
            language_tag: language_tag.to_string(),
            cities: response.cities,
            states: response.states,
        };
        if let Err(err) = self.storage.save(STORE_KEY, &next) {
            warn!(%err, "failed to persist server translations");
        }
        *self.state.write() = next;
    }

    fn clear(&self, language_tag: &str) {
        self.store(language_tag, ServerTranslationsResponse::default());
    }
}

/// Keeps the translation table in sync with the device locale
pub struct UpdateServerTranslations {
    translator: Translator,
    updates: Arc<PeriodicUpdateManager>,
    update: UpdateHandle<ApiResult<()>>,
}

impl UpdateServerTranslations {
    pub fn new(
        api: Arc<dyn ServersApi>,
        storage: Storage,
        locale: Arc<dyn LocaleProvider>,
        updates: Arc<PeriodicUpdateManager>,
        in_foreground: watch::Receiver<bool>,
    ) -> Self {
        let translator = Translator::new(storage);
        let update = updates.register_api_call(
            "server_translations",
            {
                let api = api.clone();
                let translator = translator.clone();
                let locale = locale.clone();
                move || {
                    let api = api.clone();
                    let translator = translator.clone();
                    let locale = locale.clone();
                    async move {
                        let tag = locale.language_tag();
                        if tag.starts_with("en") {
                            debug!(tag, "English locale, dropping translations");
                            translator.clear(&tag);
                            return Ok(());
                        }
                        let response = api.get_server_translations(&tag).await?;
                        translator.store(&tag, response);
                        Ok(())
                    }
                }
            },
            vec![PeriodicUpdateSpec::new(
                TRANSLATIONS_UPDATE_DELAY,
                vec![in_foreground],
            )],
        );
        Self {
            translator,
            updates,
            update,
        }
    }

    pub fn translator(&self) -> Translator {
        self.translator.clone()
    }

    /// Refresh immediately, e.g. after a device locale change
    pub async fn force_update(&self) -> ApiResult<()> {
        self.updates.execute_now(&self.update).await
    }
}
