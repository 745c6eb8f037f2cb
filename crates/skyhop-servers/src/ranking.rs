//! Score-based server ranking

use crate::country::VpnCountry;
use crate::server::{supports_protocol, Server};
use rand::seq::SliceRandom;
use rand::Rng;
use skyhop_common::{has_access, ProtocolSelection, SmartProtocols, VpnUser};
use std::cmp::Ordering;

/// Pick the best server among candidates.
///
/// Candidates unreachable with the requested protocol are dropped, then
/// the best-scored accessible online server wins. When nothing is both
/// accessible and online the best accessible server is returned so the
/// caller can surface the offline or upgrade state, and failing that
/// the overall best.
pub fn best_score_server(
    candidates: Vec<Server>,
    user: Option<&VpnUser>,
    protocol: ProtocolSelection,
    smart_protocols: &SmartProtocols,
) -> Option<Server> {
    let mut reachable: Vec<Server> = candidates
        .into_iter()
        .filter(|server| supports_protocol(server, protocol, smart_protocols))
        .collect();
    reachable.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));

    reachable
        .iter()
        .find(|server| server.online && has_access(user, server.tier))
        .or_else(|| reachable.iter().find(|server| has_access(user, server.tier)))
        .or_else(|| reachable.first())
        .cloned()
}

/// Uniform random pick among a country's accessible online servers,
/// after picking a random country. Countries with nothing accessible
/// and online are only considered when no country qualifies, and a
/// country whose servers all fail the filter yields none rather than
/// an arbitrary server.
pub fn random_server(
    countries: &[VpnCountry],
    user: Option<&VpnUser>,
    protocol: ProtocolSelection,
    smart_protocols: &SmartProtocols,
) -> Option<Server> {
    let mut rng = rand::thread_rng();
    let qualifying: Vec<&VpnCountry> = countries
        .iter()
        .filter(|country| country.has_accessible_online_server(user))
        .collect();
    let country = if qualifying.is_empty() {
        countries.choose(&mut rng)?
    } else {
        qualifying[rng.gen_range(0..qualifying.len())]
    };

    let eligible = country.accessible_online_servers(user, protocol, smart_protocols);
    eligible.choose(&mut rng).map(|&server| server.clone())
}

/// Random sample of up to `count` items, preserving input order
pub(crate) fn take_random_stable<T: Clone>(items: &[T], count: usize) -> Vec<T> {
    if items.len() <= count {
        return items.to_vec();
    }
    let mut indices =
        rand::seq::index::sample(&mut rand::thread_rng(), items.len(), count).into_vec();
    indices.sort_unstable();
    indices.into_iter().map(|index| items[index].clone()).collect()
}
