//! Intent resolution: from a connect intent to candidate servers
//!
//! Resolution only finds the place and filters by required features;
//! tier, online and protocol constraints are the ranker's concern.
//! `None` means the place does not exist in the directory; an empty
//! `ServersResult` means it exists but every candidate was filtered.

use crate::directory::DirectoryStore;
use crate::intent::{ConnectIntent, ExcludedLocations, ServersResult};
use crate::server::Server;
use skyhop_common::{CountryId, ServerFeatures};

pub(crate) fn resolve_intent(
    intent: &ConnectIntent,
    directory: &DirectoryStore,
    guest_hole_servers: &[Server],
    physical_user_country: Option<&str>,
    excluded: &ExcludedLocations,
) -> Option<ServersResult> {
    match intent {
        ConnectIntent::FastestInCountry { country, features } => match country.country_code() {
            Some(code) => {
                let country = directory.country(code, false)?;
                Some(ServersResult::new(filter_features(
                    country.servers,
                    *features,
                )))
            }
            None => Some(fastest_overall(
                directory,
                false,
                *features,
                country,
                physical_user_country,
                excluded,
            )),
        },
        ConnectIntent::FastestInCity {
            country,
            city_en,
            features,
        } => {
            let country = directory.country(country.country_code()?, false)?;
            let servers: Vec<Server> = country
                .servers
                .into_iter()
                .filter(|server| server.city.as_deref() == Some(city_en.as_str()))
                .collect();
            Some(ServersResult::new(filter_features(servers, *features)))
        }
        ConnectIntent::FastestInState {
            country,
            state_en,
            features,
        } => {
            let country = directory.country(country.country_code()?, false)?;
            let servers: Vec<Server> = country
                .servers
                .into_iter()
                .filter(|server| server.state.as_deref() == Some(state_en.as_str()))
                .collect();
            Some(ServersResult::new(filter_features(servers, *features)))
        }
        ConnectIntent::SecureCore {
            entry,
            exit,
            features,
        } => match exit.country_code() {
            Some(exit_code) => {
                let country = directory.country(exit_code, true)?;
                match entry.country_code() {
                    // An explicit hop pair resolves to the first server
                    // matching both entry and features, or nothing.
                    Some(entry_code) => {
                        let server = country.servers.into_iter().find(|server| {
                            server.entry_country == entry_code
                                && server.satisfies_features(*features)
                        })?;
                        Some(ServersResult::new(vec![server]))
                    }
                    None => Some(ServersResult::new(filter_features(
                        country.servers,
                        *features,
                    ))),
                }
            }
            None => Some(fastest_overall(
                directory,
                true,
                *features,
                exit,
                physical_user_country,
                excluded,
            )),
        },
        ConnectIntent::Gateway {
            gateway_name,
            server_id,
            features,
        } => {
            if let Some(id) = server_id {
                let server = directory.server_by_id(id)?;
                return Some(ServersResult::new(vec![server]));
            }
            let gateway = directory
                .gateways()
                .into_iter()
                .find(|gateway| &gateway.name == gateway_name)?;
            Some(ServersResult::new(filter_features(
                gateway.servers,
                *features,
            )))
        }
        ConnectIntent::Server { server_id } | ConnectIntent::GuestHole { server_id } => {
            let server = directory.server_by_id(server_id).or_else(|| {
                guest_hole_servers
                    .iter()
                    .find(|server| &server.server_id == server_id)
                    .cloned()
            })?;
            Some(ServersResult::new(vec![server]))
        }
    }
}

/// Wildcard resolution over one topology, in score order. Exclusions
/// apply only here, never to requests naming a concrete place.
fn fastest_overall(
    directory: &DirectoryStore,
    secure_core: bool,
    features: ServerFeatures,
    country: &CountryId,
    physical_user_country: Option<&str>,
    excluded: &ExcludedLocations,
) -> ServersResult {
    let candidates: Vec<Server> = directory
        .all_servers_by_score()
        .into_iter()
        .filter(|server| {
            !server.is_gateway_server()
                && server.is_secure_core_server() == secure_core
                && server.satisfies_features(features)
        })
        .filter(|server| {
            !(country.is_fastest_excluding_my_country()
                && physical_user_country == Some(server.exit_country.as_str()))
        })
        .collect();

    let kept: Vec<Server> = candidates
        .iter()
        .filter(|server| !excluded.is_excluded(server))
        .cloned()
        .collect();
    let has_applied_exclusions = kept.len() < candidates.len();
    ServersResult {
        servers: kept,
        has_applied_exclusions,
    }
}

fn filter_features(servers: Vec<Server>, features: ServerFeatures) -> Vec<Server> {
    servers
        .into_iter()
        .filter(|server| server.satisfies_features(features))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{secure_core_server, server};
    use skyhop_common::{ServerFeature, Storage};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn directory_with(servers: Vec<Server>) -> DirectoryStore {
        let store = DirectoryStore::new(Storage::new(Arc::new(skyhop_common::MemoryStore::new())));
        store.replace_servers(servers, None, &HashSet::new());
        store
    }

    fn resolve(intent: &ConnectIntent, directory: &DirectoryStore) -> Option<ServersResult> {
        resolve_intent(intent, directory, &[], None, &ExcludedLocations::default())
    }

    #[test]
    fn test_fastest_skips_other_topologies() {
        let directory = directory_with(vec![
            server("ch-1", "CH", 2.0),
            secure_core_server("sc-1", "IS", "CH", 1.0),
        ]);
        let result = resolve(&ConnectIntent::fastest(), &directory).unwrap();
        assert_eq!(result.servers.len(), 1);
        assert_eq!(result.servers[0].server_id, "ch-1");
    }

    #[test]
    fn test_fastest_excluding_my_country() {
        let directory = directory_with(vec![server("ch-1", "CH", 1.0), server("de-1", "DE", 2.0)]);
        let intent = ConnectIntent::FastestInCountry {
            country: CountryId::FastestExcludingMyCountry,
            features: ServerFeatures::default(),
        };
        let result = resolve_intent(
            &intent,
            &directory,
            &[],
            Some("CH"),
            &ExcludedLocations::default(),
        )
        .unwrap();
        assert_eq!(result.servers.len(), 1);
        assert_eq!(result.servers[0].server_id, "de-1");
    }

    #[test]
    fn test_exclusions_apply_to_wildcard_only() {
        let directory = directory_with(vec![server("ch-1", "CH", 1.0), server("de-1", "DE", 2.0)]);
        let mut excluded = ExcludedLocations::default();
        excluded.exclude_country("CH");

        let wildcard =
            resolve_intent(&ConnectIntent::fastest(), &directory, &[], None, &excluded).unwrap();
        assert!(wildcard.has_applied_exclusions);
        assert_eq!(wildcard.servers[0].server_id, "de-1");

        let direct = ConnectIntent::FastestInCountry {
            country: CountryId::code("CH"),
            features: ServerFeatures::default(),
        };
        let result = resolve_intent(&direct, &directory, &[], None, &excluded).unwrap();
        assert!(!result.has_applied_exclusions);
        assert_eq!(result.servers[0].server_id, "ch-1");
    }

    #[test]
    fn test_unknown_place_is_none_but_filtered_is_empty() {
        let mut tor = server("ch-tor", "CH", 1.0);
        tor.features = ServerFeatures::of(&[ServerFeature::Tor]);
        let directory = directory_with(vec![server("ch-1", "CH", 2.0), tor]);

        assert!(resolve(
            &ConnectIntent::FastestInCountry {
                country: CountryId::code("JP"),
                features: ServerFeatures::default(),
            },
            &directory
        )
        .is_none());

        let p2p_in_ch = ConnectIntent::FastestInCountry {
            country: CountryId::code("CH"),
            features: ServerFeatures::of(&[ServerFeature::P2P]),
        };
        let result = resolve(&p2p_in_ch, &directory).unwrap();
        assert!(result.servers.is_empty());
    }

    #[test]
    fn test_city_miss_in_known_country_is_empty() {
        let mut zurich = server("ch-1", "CH", 1.0);
        zurich.city = Some("Zurich".to_string());
        let directory = directory_with(vec![zurich]);

        let intent = ConnectIntent::FastestInCity {
            country: CountryId::code("CH"),
            city_en: "Geneva".to_string(),
            features: ServerFeatures::default(),
        };
        // The country exists, so this is "empty", not "not found".
        let result = resolve(&intent, &directory).unwrap();
        assert!(result.servers.is_empty());

        let intent = ConnectIntent::FastestInCity {
            country: CountryId::code("JP"),
            city_en: "Tokyo".to_string(),
            features: ServerFeatures::default(),
        };
        assert!(resolve(&intent, &directory).is_none());
    }

    #[test]
    fn test_secure_core_entry_filter() {
        let directory = directory_with(vec![
            secure_core_server("sc-is", "IS", "CH", 1.0),
            secure_core_server("sc-se", "SE", "CH", 2.0),
        ]);
        let via_se = ConnectIntent::SecureCore {
            entry: CountryId::code("SE"),
            exit: CountryId::code("CH"),
            features: ServerFeatures::default(),
        };
        let result = resolve(&via_se, &directory).unwrap();
        assert_eq!(result.servers.len(), 1);
        assert_eq!(result.servers[0].server_id, "sc-se");

        let via_no = ConnectIntent::SecureCore {
            entry: CountryId::code("NO"),
            exit: CountryId::code("CH"),
            features: ServerFeatures::default(),
        };
        assert!(resolve(&via_no, &directory).is_none());

        // An entry match whose features fall short resolves to nothing.
        let tor_via_se = ConnectIntent::SecureCore {
            entry: CountryId::code("SE"),
            exit: CountryId::code("CH"),
            features: ServerFeatures::of(&[ServerFeature::Tor]),
        };
        assert!(resolve(&tor_via_se, &directory).is_none());
    }

    #[test]
    fn test_guest_hole_falls_back_to_side_list() {
        let directory = directory_with(vec![]);
        let guest = vec![server("gh-1", "US", 1.0)];
        let intent = ConnectIntent::GuestHole {
            server_id: "gh-1".to_string(),
        };
        let result = resolve_intent(
            &intent,
            &directory,
            &guest,
            None,
            &ExcludedLocations::default(),
        )
        .unwrap();
        assert_eq!(result.servers[0].server_id, "gh-1");
    }
}
