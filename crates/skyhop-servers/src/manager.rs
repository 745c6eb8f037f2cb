//! Server manager: the single entry point for directory state
//!
//! Owns the directory store plus the metadata that decides when a full
//! refetch is needed, and exposes the selection queries the connection
//! flow uses. All mutation bumps a version watch so UI layers can
//! re-derive their lists.

use crate::country::{GatewayGroup, VpnCountry};
use crate::directory::DirectoryStore;
use crate::intent::{ConnectIntent, ExcludedLocations, ServersResult};
use crate::loads::{LoadUpdate, LoadsError};
use crate::ranking::{best_score_server, random_server, take_random_stable};
use crate::resolver::resolve_intent;
use crate::server::{supports_protocol, ConnectingDomain, Server};
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use skyhop_common::{
    ProtocolSelection, SmartProtocols, Storage, VpnUser, WallClock,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

const STATE_KEY: &str = "server_manager";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ServerManagerError {
    /// Bootstrap servers are only meaningful before the first real
    /// directory download.
    #[error("guest hole servers cannot be set after a server list download")]
    GuestHoleAfterDownload,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct ServerManagerState {
    /// App version that produced the persisted list; older lists are
    /// refetched after an upgrade.
    #[serde(default)]
    server_list_app_version_code: u32,
    /// Unix millis of the last successful full list update, 0 if never
    #[serde(default)]
    last_update_timestamp: i64,
    #[serde(default)]
    has_gateways: bool,
    #[serde(default)]
    has_countries: bool,
}

pub struct ServerManager {
    directory: DirectoryStore,
    storage: Storage,
    clock: Arc<dyn WallClock>,
    app_version_code: u32,
    state: Mutex<ServerManagerState>,
    /// Bootstrap servers usable before any directory download
    guest_hole_servers: RwLock<Option<Vec<Server>>>,
    /// Country the device is physically in, for out-of-country intents
    physical_user_country: RwLock<Option<String>>,
    loaded: AtomicBool,
    load_lock: tokio::sync::Mutex<()>,
    version_tx: watch::Sender<u64>,
}

impl ServerManager {
    pub fn new(storage: Storage, clock: Arc<dyn WallClock>, app_version_code: u32) -> Self {
        Self {
            directory: DirectoryStore::new(storage.clone()),
            storage,
            clock,
            app_version_code,
            state: Mutex::new(ServerManagerState::default()),
            guest_hole_servers: RwLock::new(None),
            physical_user_country: RwLock::new(None),
            loaded: AtomicBool::new(false),
            load_lock: tokio::sync::Mutex::new(()),
            version_tx: watch::channel(0).0,
        }
    }

    /// Load persisted state once; concurrent callers resolve after the
    /// single load completes.
    pub async fn ensure_loaded(&self) {
        if self.loaded.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.load_lock.lock().await;
        if self.loaded.load(Ordering::Acquire) {
            return;
        }

        let state = self
            .storage
            .load::<ServerManagerState>(STATE_KEY)
            .unwrap_or_default();
        *self.state.lock() = state;

        if !self.directory.load() {
            // The persisted list could not be decoded; reset the
            // metadata so the next refresh does a full refetch.
            warn!("resetting server list metadata after decode failure");
            *self.state.lock() = ServerManagerState::default();
            self.save_state();
        }

        self.loaded.store(true, Ordering::Release);
        self.bump_version();
        info!(
            servers = self.directory.server_count(),
            "server manager loaded"
        );
    }

    /// A full list refetch is required before selections can be trusted
    pub async fn needs_update(&self) -> bool {
        self.ensure_loaded().await;
        let state = self.state.lock().clone();
        state.last_update_timestamp == 0
            || self.directory.is_empty()
            || state.server_list_app_version_code < self.app_version_code
            || !self.directory.has_wireguard_support()
    }

    pub fn is_downloaded_at_least_once(&self) -> bool {
        self.state.lock().last_update_timestamp > 0 && !self.directory.is_empty()
    }

    pub fn last_update_timestamp(&self) -> i64 {
        self.state.lock().last_update_timestamp
    }

    /// Observers are notified on every directory mutation
    pub fn version_watch(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    pub fn set_physical_user_country(&self, country_code: Option<String>) {
        *self.physical_user_country.write() = country_code;
    }

    /// Install a freshly fetched list. Entries in `retain_ids` survive
    /// even when the new list omits them.
    pub async fn set_servers(
        &self,
        list: Vec<Server>,
        status_id: Option<String>,
        retain_ids: &HashSet<String>,
    ) {
        self.ensure_loaded().await;
        self.directory.replace_servers(list, status_id, retain_ids);
        {
            let mut state = self.state.lock();
            state.last_update_timestamp = self.clock.now_ms();
            state.server_list_app_version_code = self.app_version_code;
            state.has_countries = self.directory.has_countries();
            state.has_gateways = self.directory.has_gateways();
        }
        self.save_state();
        self.bump_version();
    }

    /// Record that the backend confirmed the current list is fresh
    pub fn update_timestamp(&self) {
        self.state.lock().last_update_timestamp = self.clock.now_ms();
        self.save_state();
    }

    /// Forget refresh metadata while keeping the server list usable
    pub fn clear_cache(&self) {
        *self.state.lock() = ServerManagerState::default();
        self.storage.delete(STATE_KEY);
        self.bump_version();
    }

    pub async fn update_loads(&self, updates: &[LoadUpdate]) {
        self.ensure_loaded().await;
        self.directory.update_loads(updates);
        self.bump_version();
    }

    pub async fn update_binary_loads(
        &self,
        status_id: &str,
        payload: &[u8],
    ) -> Result<(), LoadsError> {
        self.ensure_loaded().await;
        self.directory.update_binary_loads(status_id, payload)?;
        self.bump_version();
        Ok(())
    }

    pub async fn update_server_domain_status(&self, domain: &ConnectingDomain) {
        self.ensure_loaded().await;
        self.directory.update_server_domain_status(domain);
        self.bump_version();
    }

    pub async fn update_or_add_server(&self, server: Server) {
        self.ensure_loaded().await;
        self.directory.update_or_add_server(server);
        self.bump_version();
    }

    /// Install bootstrap servers; rejected once a real list exists
    pub fn set_guest_hole_servers(&self, servers: Vec<Server>) -> Result<(), ServerManagerError> {
        if self.is_downloaded_at_least_once() {
            return Err(ServerManagerError::GuestHoleAfterDownload);
        }
        *self.guest_hole_servers.write() = Some(servers);
        Ok(())
    }

    pub fn guest_hole_servers(&self) -> Option<Vec<Server>> {
        self.guest_hole_servers.read().clone()
    }

    /// Sample the downloaded directory for future bootstrap use: the
    /// single best-scored online server plus a random sample over all
    /// online protocol-capable country servers, shuffled and
    /// deduplicated.
    pub fn downloaded_servers_for_guest_hole(
        &self,
        count: usize,
        protocol: ProtocolSelection,
        smart_protocols: &SmartProtocols,
    ) -> Vec<Server> {
        let qualifies =
            |server: &Server| server.online && supports_protocol(server, protocol, smart_protocols);
        let best = self
            .directory
            .all_servers_by_score()
            .into_iter()
            .find(|server| qualifies(server));
        let online: Vec<Server> = self
            .directory
            .vpn_countries()
            .iter()
            .flat_map(|country| country.servers.iter())
            .filter(|server| qualifies(server))
            .cloned()
            .collect();
        let spread = take_random_stable(&online, count);

        let mut combined: Vec<Server> = best.into_iter().chain(spread).collect();
        combined.shuffle(&mut rand::thread_rng());
        let mut seen = HashSet::new();
        combined.retain(|server| seen.insert(server.server_id.clone()));
        combined.truncate(count);
        combined
    }

    pub fn server_by_id(&self, id: &str) -> Option<Server> {
        self.directory.server_by_id(id).or_else(|| {
            self.guest_hole_servers
                .read()
                .as_ref()?
                .iter()
                .find(|server| server.server_id == id)
                .cloned()
        })
    }

    pub fn get_vpn_countries(&self) -> Vec<VpnCountry> {
        self.directory.vpn_countries()
    }

    pub fn get_secure_core_exit_countries(&self) -> Vec<VpnCountry> {
        self.directory.secure_core_exit_countries()
    }

    pub fn get_gateways(&self) -> Vec<GatewayGroup> {
        self.directory.gateways()
    }

    /// Countries offering at least one free-tier server
    pub fn free_countries(&self) -> Vec<VpnCountry> {
        self.directory
            .vpn_countries()
            .into_iter()
            .filter(|country| country.servers.iter().any(Server::is_free_server))
            .collect()
    }

    pub fn vpn_exit_country(&self, country_code: &str, secure_core: bool) -> Option<VpnCountry> {
        self.directory.country(country_code, secure_core)
    }

    pub fn logicals_status_id(&self) -> Option<String> {
        self.directory.status_id()
    }

    /// Resolve an intent and rank the candidates to one best server
    pub fn best_server_for_connect_intent(
        &self,
        intent: &ConnectIntent,
        user: Option<&VpnUser>,
        protocol: ProtocolSelection,
        smart_protocols: &SmartProtocols,
        excluded: &ExcludedLocations,
    ) -> Option<Server> {
        self.for_connect_intent(intent, None, excluded, |result| {
            best_score_server(result.servers, user, protocol, smart_protocols)
        })
    }

    /// Resolve an intent to its candidate set, or yield the fallback
    /// when the requested place does not exist.
    pub fn for_connect_intent<T>(
        &self,
        intent: &ConnectIntent,
        fallback: T,
        excluded: &ExcludedLocations,
        f: impl FnOnce(ServersResult) -> T,
    ) -> T {
        let guest_hole = self.guest_hole_servers.read();
        let guest_hole_servers: &[Server] = guest_hole.as_deref().unwrap_or(&[]);
        let physical = self.physical_user_country.read();
        match resolve_intent(
            intent,
            &self.directory,
            guest_hole_servers,
            physical.as_deref(),
            excluded,
        ) {
            Some(result) => f(result),
            None => fallback,
        }
    }

    pub fn get_random_server(
        &self,
        user: Option<&VpnUser>,
        protocol: ProtocolSelection,
        smart_protocols: &SmartProtocols,
    ) -> Option<Server> {
        random_server(
            &self.directory.vpn_countries(),
            user,
            protocol,
            smart_protocols,
        )
    }

    fn save_state(&self) {
        let state = self.state.lock().clone();
        if let Err(err) = self.storage.save(STATE_KEY, &state) {
            warn!(%err, "failed to persist server manager state");
        }
    }

    fn bump_version(&self) {
        self.version_tx.send_modify(|version| *version += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{free_server, gateway_server, server};
    use skyhop_common::{FakeClock, MemoryStore, TransmissionProtocol, VpnProtocol};
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    fn wg_udp() -> ProtocolSelection {
        ProtocolSelection::new(VpnProtocol::WireGuard, TransmissionProtocol::Udp)
    }

    fn new_manager() -> ServerManager {
        ServerManager::new(
            Storage::new(Arc::new(MemoryStore::new())),
            Arc::new(FakeClock::new(1_000_000)),
            100,
        )
    }

    #[tokio::test]
    async fn test_needs_update_until_first_download() {
        let manager = new_manager();
        manager.ensure_loaded().await;
        assert!(manager.needs_update().await);
        assert!(!manager.is_downloaded_at_least_once());

        manager
            .set_servers(vec![server("ch-1", "CH", 1.0)], None, &HashSet::new())
            .await;
        assert!(!manager.needs_update().await);
        assert!(manager.is_downloaded_at_least_once());
        assert_eq!(manager.last_update_timestamp(), 1_000_000);
    }

    #[tokio::test]
    async fn test_best_server_prefers_lower_score() {
        let manager = new_manager();
        manager
            .set_servers(
                vec![server("a", "CH", 1.2), server("b", "CH", 0.9)],
                None,
                &HashSet::new(),
            )
            .await;
        let best = manager
            .best_server_for_connect_intent(
                &ConnectIntent::fastest(),
                None,
                wg_udp(),
                &vec![],
                &ExcludedLocations::default(),
            )
            .unwrap();
        assert_eq!(best.server_id, "b");
    }

    #[tokio::test]
    async fn test_guest_hole_rejected_after_download() {
        let manager = new_manager();
        manager.ensure_loaded().await;
        manager
            .set_guest_hole_servers(vec![server("gh-1", "US", 1.0)])
            .unwrap();
        assert!(manager.server_by_id("gh-1").is_some());

        manager
            .set_servers(vec![server("ch-1", "CH", 1.0)], None, &HashSet::new())
            .await;
        assert_eq!(
            manager.set_guest_hole_servers(vec![]),
            Err(ServerManagerError::GuestHoleAfterDownload)
        );
    }

    #[tokio::test]
    async fn test_clear_cache_keeps_servers() {
        let manager = new_manager();
        manager
            .set_servers(vec![server("ch-1", "CH", 1.0)], None, &HashSet::new())
            .await;
        manager.clear_cache();
        assert!(manager.needs_update().await);
        assert!(manager.server_by_id("ch-1").is_some());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let storage = Storage::new(Arc::new(MemoryStore::new()));
        let clock = Arc::new(FakeClock::new(5_000));
        let manager = ServerManager::new(storage.clone(), clock.clone(), 100);
        manager
            .set_servers(vec![server("ch-1", "CH", 1.0)], None, &HashSet::new())
            .await;

        // needs_update loads persisted state itself; asked first thing
        // on a cold manager it must not report a spurious refetch.
        let reopened = ServerManager::new(storage.clone(), clock.clone(), 100);
        assert!(!reopened.needs_update().await);
        assert_eq!(reopened.last_update_timestamp(), 5_000);
        assert!(reopened.server_by_id("ch-1").is_some());

        // An app upgrade invalidates the persisted list.
        let upgraded = ServerManager::new(storage, clock, 101);
        assert!(upgraded.needs_update().await);
    }

    #[tokio::test]
    async fn test_free_countries_and_gateways() {
        let manager = new_manager();
        manager
            .set_servers(
                vec![
                    server("ch-1", "CH", 1.0),
                    free_server("nl-free", "NL", 2.0),
                    gateway_server("gw-1", "office", 0.5),
                ],
                None,
                &HashSet::new(),
            )
            .await;
        let free = manager.free_countries();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].flag, "NL");
        assert_eq!(manager.get_gateways().len(), 1);
        // Gateway servers never leak into the country list.
        assert_eq!(manager.get_vpn_countries().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_loaded_loads_once() {
        struct CountingStore {
            inner: MemoryStore,
            gets: AtomicU32,
        }

        impl skyhop_common::KeyValueStore for CountingStore {
            fn get(&self, key: &str) -> Option<String> {
                self.gets.fetch_add(1, AtomicOrdering::SeqCst);
                self.inner.get(key)
            }
            fn put(&self, key: &str, value: String) -> Result<(), skyhop_common::StorageError> {
                self.inner.put(key, value)
            }
            fn remove(&self, key: &str) {
                self.inner.remove(key);
            }
            fn contains(&self, key: &str) -> bool {
                self.inner.contains(key)
            }
        }

        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            gets: AtomicU32::new(0),
        });
        let manager = Arc::new(ServerManager::new(
            Storage::new(store.clone()),
            Arc::new(FakeClock::new(0)),
            1,
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.ensure_loaded().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let after_first = store.gets.load(AtomicOrdering::SeqCst);
        manager.ensure_loaded().await;
        // The state key is read exactly once across all callers.
        assert_eq!(store.gets.load(AtomicOrdering::SeqCst), after_first);
        assert_eq!(after_first, 1);
    }

    #[tokio::test]
    async fn test_guest_hole_sampling_is_bounded_and_unique() {
        let manager = new_manager();
        let servers: Vec<Server> = (0..30)
            .map(|n| server(&format!("s-{n}"), "CH", f64::from(n)))
            .collect();
        manager.set_servers(servers, None, &HashSet::new()).await;

        let sample = manager.downloaded_servers_for_guest_hole(10, wg_udp(), &vec![]);
        assert_eq!(sample.len(), 10);
        let ids: HashSet<_> = sample.iter().map(|s| s.server_id.clone()).collect();
        assert_eq!(ids.len(), 10);
    }
}
