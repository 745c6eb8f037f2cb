//! Server directory store
//!
//! Owns the raw server collection plus derived groupings. All mutation
//! goes through the swap/patch methods below under a single-writer
//! lock; readers take an immutable snapshot, so they always observe
//! either the pre- or post-mutation state, never a mix.

use crate::country::{GatewayGroup, VpnCountry};
use crate::loads::{parse_binary_loads, LoadUpdate, LoadsError};
use crate::server::{ConnectingDomain, Server};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use skyhop_common::Storage;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

const STORE_KEY: &str = "server_list";

#[derive(Serialize, Deserialize)]
struct PersistedDirectory {
    #[serde(rename = "Servers")]
    servers: Vec<Server>,
    #[serde(rename = "StatusID", default)]
    status_id: Option<String>,
}

#[derive(Clone)]
struct Group {
    key: String,
    indices: Vec<usize>,
}

#[derive(Clone, Default)]
struct DirectorySnapshot {
    servers: Vec<Server>,
    by_id: HashMap<String, usize>,
    /// All server indices ordered by score ascending (stable)
    by_score: Vec<usize>,
    countries: Vec<Group>,
    secure_core_countries: Vec<Group>,
    gateways: Vec<Group>,
    status_id: Option<String>,
}

impl DirectorySnapshot {
    fn build(servers: Vec<Server>, status_id: Option<String>) -> Self {
        let mut by_id = HashMap::with_capacity(servers.len());
        let mut countries: Vec<Group> = Vec::new();
        let mut secure_core_countries: Vec<Group> = Vec::new();
        let mut gateways: Vec<Group> = Vec::new();

        fn push_to(groups: &mut Vec<Group>, key: &str, index: usize) {
            match groups.iter_mut().find(|group| group.key == key) {
                Some(group) => group.indices.push(index),
                None => groups.push(Group {
                    key: key.to_string(),
                    indices: vec![index],
                }),
            }
        }

        for (index, server) in servers.iter().enumerate() {
            by_id.insert(server.server_id.clone(), index);
            // Exactly one topology classification per server: gateway
            // membership wins over the secure-core feature flag.
            if server.is_gateway_server() {
                let name = server.gateway_name.as_deref().unwrap_or("gateway");
                push_to(&mut gateways, name, index);
            } else if server.is_secure_core_server() {
                push_to(&mut secure_core_countries, &server.exit_country, index);
            } else {
                push_to(&mut countries, &server.exit_country, index);
            }
        }

        let sort_key = |group: &Group| group.key.to_lowercase();
        countries.sort_by_key(sort_key);
        secure_core_countries.sort_by_key(sort_key);
        gateways.sort_by_key(sort_key);

        let mut by_score: Vec<usize> = (0..servers.len()).collect();
        by_score.sort_by(|a, b| {
            servers[*a]
                .score
                .partial_cmp(&servers[*b].score)
                .unwrap_or(Ordering::Equal)
        });

        Self {
            servers,
            by_id,
            by_score,
            countries,
            secure_core_countries,
            gateways,
            status_id,
        }
    }

    fn rebuild_score_order(&mut self) {
        self.by_score.sort_by(|a, b| {
            self.servers[*a]
                .score
                .partial_cmp(&self.servers[*b].score)
                .unwrap_or(Ordering::Equal)
        });
    }

    fn materialize_countries(&self, groups: &[Group]) -> Vec<VpnCountry> {
        groups
            .iter()
            .map(|group| VpnCountry {
                flag: group.key.clone(),
                servers: group
                    .indices
                    .iter()
                    .map(|&index| self.servers[index].clone())
                    .collect(),
            })
            .collect()
    }
}

/// Single-writer store with copy-on-write snapshots
pub struct DirectoryStore {
    snapshot: ArcSwap<DirectorySnapshot>,
    write_lock: Mutex<()>,
    storage: Storage,
}

impl DirectoryStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(DirectorySnapshot::default()),
            write_lock: Mutex::new(()),
            storage,
        }
    }

    /// Load the persisted server list. Returns false when a persisted
    /// blob exists but cannot be decoded; the blob itself is left in
    /// place for a later full fetch to overwrite.
    pub fn load(&self) -> bool {
        if !self.storage.contains_key(STORE_KEY) {
            return true;
        }
        let _guard = self.write_lock.lock();
        match self.storage.load::<PersistedDirectory>(STORE_KEY) {
            Some(persisted) => {
                let count = persisted.servers.len();
                self.snapshot.store(Arc::new(DirectorySnapshot::build(
                    persisted.servers,
                    persisted.status_id,
                )));
                debug!(servers = count, "loaded persisted server list");
                true
            }
            None => {
                warn!("persisted server list was undecodable");
                false
            }
        }
    }

    /// Atomically swap the entire server collection. Entries whose id
    /// is in `retain_ids` survive even when absent from `list`.
    pub fn replace_servers(
        &self,
        mut list: Vec<Server>,
        status_id: Option<String>,
        retain_ids: &HashSet<String>,
    ) {
        let _guard = self.write_lock.lock();
        if !retain_ids.is_empty() {
            let new_ids: HashSet<&str> = list.iter().map(|s| s.server_id.as_str()).collect();
            let current = self.snapshot.load();
            let survivors: Vec<Server> = current
                .servers
                .iter()
                .filter(|server| {
                    retain_ids.contains(&server.server_id)
                        && !new_ids.contains(server.server_id.as_str())
                })
                .cloned()
                .collect();
            list.extend(survivors);
        }
        info!(servers = list.len(), "replacing server list");
        let next = DirectorySnapshot::build(list, status_id);
        self.persist(&next);
        self.snapshot.store(Arc::new(next));
    }

    /// Patch one endpoint's status in place. An unknown endpoint id is
    /// a no-op. A server whose endpoints are all offline afterwards is
    /// marked offline itself.
    pub fn update_server_domain_status(&self, domain: &ConnectingDomain) {
        let _guard = self.write_lock.lock();
        let mut next = (**self.snapshot.load()).clone();
        let Some(server) = next.servers.iter_mut().find(|server| {
            server
                .connecting_domains
                .iter()
                .any(|candidate| candidate.id == domain.id)
        }) else {
            return;
        };
        for candidate in server.connecting_domains.iter_mut() {
            if candidate.id == domain.id {
                *candidate = domain.clone();
            }
        }
        if server.connecting_domains.iter().all(|d| !d.online) {
            server.online = false;
        }
        self.persist(&next);
        self.snapshot.store(Arc::new(next));
    }

    /// Patch load/score/online for many servers; unknown ids are
    /// silently skipped since the feed may reference servers not yet
    /// known locally.
    pub fn update_loads(&self, updates: &[LoadUpdate]) {
        let _guard = self.write_lock.lock();
        self.apply_loads(updates);
    }

    /// Apply the packed binary loads feed, rejecting a feed produced
    /// for a different server-list generation. The generation check and
    /// the apply happen under the same write guard, so a concurrent
    /// replace cannot slip a new list in between.
    pub fn update_binary_loads(&self, status_id: &str, payload: &[u8]) -> Result<(), LoadsError> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot.load().status_id.clone();
        if current.as_deref() != Some(status_id) {
            return Err(LoadsError::StaleStatus {
                current,
                got: status_id.to_string(),
            });
        }
        let updates = parse_binary_loads(payload)?;
        self.apply_loads(&updates);
        Ok(())
    }

    /// Caller must hold `write_lock`
    fn apply_loads(&self, updates: &[LoadUpdate]) {
        let mut next = (**self.snapshot.load()).clone();
        let mut applied = 0usize;
        for update in updates {
            let Some(&index) = next.by_id.get(&update.id) else {
                continue;
            };
            let server = &mut next.servers[index];
            server.load = update.load;
            server.score = update.score;
            server.online = update.online;
            applied += 1;
        }
        next.rebuild_score_order();
        debug!(applied, total = updates.len(), "applied load updates");
        self.persist(&next);
        self.snapshot.store(Arc::new(next));
    }

    /// Upsert one server by id
    pub fn update_or_add_server(&self, server: Server) {
        let _guard = self.write_lock.lock();
        let current = self.snapshot.load();
        let mut servers = current.servers.clone();
        match current.by_id.get(&server.server_id) {
            Some(&index) => servers[index] = server,
            None => servers.push(server),
        }
        let next = DirectorySnapshot::build(servers, current.status_id.clone());
        self.persist(&next);
        self.snapshot.store(Arc::new(next));
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().servers.is_empty()
    }

    pub fn server_count(&self) -> usize {
        self.snapshot.load().servers.len()
    }

    pub fn status_id(&self) -> Option<String> {
        self.snapshot.load().status_id.clone()
    }

    pub fn all_servers(&self) -> Vec<Server> {
        self.snapshot.load().servers.clone()
    }

    /// All servers ordered by score ascending
    pub fn all_servers_by_score(&self) -> Vec<Server> {
        let snapshot = self.snapshot.load();
        snapshot
            .by_score
            .iter()
            .map(|&index| snapshot.servers[index].clone())
            .collect()
    }

    pub fn server_by_id(&self, id: &str) -> Option<Server> {
        let snapshot = self.snapshot.load();
        snapshot
            .by_id
            .get(id)
            .map(|&index| snapshot.servers[index].clone())
    }

    pub fn vpn_countries(&self) -> Vec<VpnCountry> {
        let snapshot = self.snapshot.load();
        snapshot.materialize_countries(&snapshot.countries)
    }

    pub fn secure_core_exit_countries(&self) -> Vec<VpnCountry> {
        let snapshot = self.snapshot.load();
        snapshot.materialize_countries(&snapshot.secure_core_countries)
    }

    pub fn country(&self, code: &str, secure_core: bool) -> Option<VpnCountry> {
        let snapshot = self.snapshot.load();
        let groups = if secure_core {
            &snapshot.secure_core_countries
        } else {
            &snapshot.countries
        };
        groups
            .iter()
            .find(|group| group.key == code)
            .map(|group| VpnCountry {
                flag: group.key.clone(),
                servers: group
                    .indices
                    .iter()
                    .map(|&index| snapshot.servers[index].clone())
                    .collect(),
            })
    }

    pub fn gateways(&self) -> Vec<GatewayGroup> {
        let snapshot = self.snapshot.load();
        snapshot
            .gateways
            .iter()
            .map(|group| GatewayGroup {
                name: group.key.clone(),
                servers: group
                    .indices
                    .iter()
                    .map(|&index| snapshot.servers[index].clone())
                    .collect(),
            })
            .collect()
    }

    pub fn has_countries(&self) -> bool {
        !self.snapshot.load().countries.is_empty()
    }

    pub fn has_gateways(&self) -> bool {
        !self.snapshot.load().gateways.is_empty()
    }

    /// Any server offers key-based (WireGuard) transport
    pub fn has_wireguard_support(&self) -> bool {
        self.snapshot
            .load()
            .servers
            .iter()
            .any(Server::has_wireguard_support)
    }

    fn persist(&self, snapshot: &DirectorySnapshot) {
        let persisted = PersistedDirectory {
            servers: snapshot.servers.clone(),
            status_id: snapshot.status_id.clone(),
        };
        if let Err(err) = self.storage.save(STORE_KEY, &persisted) {
            warn!(%err, "failed to persist server list");
        }
    }
}
