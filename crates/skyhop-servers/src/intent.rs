//! Connect intents and location exclusions

use crate::server::Server;
use serde::{Deserialize, Serialize};
use skyhop_common::{CountryId, ServerFeatures};
use std::collections::HashSet;

/// What the user asked to connect to.
///
/// City and state names are the English wire names, not translations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConnectIntent {
    FastestInCountry {
        country: CountryId,
        features: ServerFeatures,
    },
    FastestInCity {
        country: CountryId,
        city_en: String,
        features: ServerFeatures,
    },
    FastestInState {
        country: CountryId,
        state_en: String,
        features: ServerFeatures,
    },
    SecureCore {
        entry: CountryId,
        exit: CountryId,
        features: ServerFeatures,
    },
    Gateway {
        gateway_name: String,
        /// Pin one server of the gateway instead of the fastest
        server_id: Option<String>,
        features: ServerFeatures,
    },
    Server {
        server_id: String,
    },
    GuestHole {
        server_id: String,
    },
}

impl ConnectIntent {
    /// Fastest overall with no feature requirements
    pub fn fastest() -> Self {
        ConnectIntent::FastestInCountry {
            country: CountryId::Fastest,
            features: ServerFeatures::default(),
        }
    }
}

/// User-configured locations to avoid when resolving wildcard intents.
/// Direct requests for an excluded location still resolve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludedLocations {
    countries: HashSet<String>,
    /// (country code, English city name) pairs
    cities: HashSet<(String, String)>,
}

impl ExcludedLocations {
    pub fn exclude_country(&mut self, code: impl Into<String>) {
        self.countries.insert(code.into());
    }

    pub fn exclude_city(&mut self, code: impl Into<String>, city_en: impl Into<String>) {
        self.cities.insert((code.into(), city_en.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty() && self.cities.is_empty()
    }

    pub fn is_excluded(&self, server: &Server) -> bool {
        if self.countries.contains(&server.exit_country) {
            return true;
        }
        match &server.city {
            Some(city) => self
                .cities
                .contains(&(server.exit_country.clone(), city.clone())),
            None => false,
        }
    }
}

/// Candidate servers for an intent, before ranking
#[derive(Clone, Debug, PartialEq)]
pub struct ServersResult {
    pub servers: Vec<Server>,
    /// True when exclusions removed at least one candidate; lets the
    /// caller distinguish "nothing there" from "everything excluded".
    pub has_applied_exclusions: bool,
}

impl ServersResult {
    pub fn new(servers: Vec<Server>) -> Self {
        Self {
            servers,
            has_applied_exclusions: false,
        }
    }
}
