//! Periodic refresh of the server list and load feed

use crate::api::{ServerListResult, ServersApi};
use crate::loads::LoadsError;
use crate::manager::ServerManager;
use parking_lot::RwLock;
use skyhop_appconfig::AppConfigResponse;
use skyhop_common::{ApiError, ApiResult};
use skyhop_updates::{PeriodicUpdateManager, PeriodicUpdateSpec, UpdateHandle};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

const LIST_RETRY_DELAY: Duration = Duration::from_secs(30 * 60);
const LOADS_UPDATE_DELAY: Duration = Duration::from_secs(15 * 60);

/// Registers the server list and loads refresh actions and exposes
/// forced refresh for flows that cannot wait for the cadence.
pub struct ServerListUpdater {
    updates: Arc<PeriodicUpdateManager>,
    list_update: UpdateHandle<ApiResult<()>>,
    loads_update: UpdateHandle<ApiResult<()>>,
    retained_ids: Arc<RwLock<HashSet<String>>>,
}

impl ServerListUpdater {
    pub fn new(
        api: Arc<dyn ServersApi>,
        manager: Arc<ServerManager>,
        updates: Arc<PeriodicUpdateManager>,
        config: &AppConfigResponse,
        logged_in: watch::Receiver<bool>,
        in_foreground: watch::Receiver<bool>,
    ) -> Self {
        // Ids of servers that must survive a list replace, e.g. the one
        // currently connected to.
        let retained_ids: Arc<RwLock<HashSet<String>>> = Arc::new(RwLock::new(HashSet::new()));

        let foreground_delay =
            Duration::from_secs(config.logicals_refresh_foreground_delay_minutes * 60);
        let background_delay =
            Duration::from_secs(config.logicals_refresh_background_delay_minutes * 60);

        let list_update = updates.register_api_call(
            "server_list",
            {
                let api = api.clone();
                let manager = manager.clone();
                let retained_ids = retained_ids.clone();
                move || {
                    let api = api.clone();
                    let manager = manager.clone();
                    let retained_ids = retained_ids.clone();
                    async move {
                        match api.get_server_list().await? {
                            ServerListResult::List(response) => {
                                let retained = retained_ids.read().clone();
                                info!(servers = response.logical_servers.len(), "server list updated");
                                manager
                                    .set_servers(
                                        response.logical_servers,
                                        response.status_id,
                                        &retained,
                                    )
                                    .await;
                            }
                            ServerListResult::NotModified => {
                                manager.update_timestamp();
                            }
                        }
                        Ok(())
                    }
                }
            },
            vec![
                PeriodicUpdateSpec::with_retry(
                    foreground_delay,
                    LIST_RETRY_DELAY,
                    vec![logged_in.clone(), in_foreground.clone()],
                ),
                PeriodicUpdateSpec::new(background_delay, vec![]),
            ],
        );

        let loads_update = updates.register_api_call(
            "server_loads",
            {
                let api = api.clone();
                let manager = manager.clone();
                let updates = updates.clone();
                let list_update = list_update.clone();
                move || {
                    let api = api.clone();
                    let manager = manager.clone();
                    let updates = updates.clone();
                    let list_update = list_update.clone();
                    async move {
                        match manager.logicals_status_id() {
                            Some(status_id) => {
                                let feed = api.get_binary_loads(&status_id).await?;
                                match manager
                                    .update_binary_loads(&feed.status_id, &feed.payload)
                                    .await
                                {
                                    Ok(()) => Ok(()),
                                    Err(LoadsError::StaleStatus { .. }) => {
                                        // The feed moved to a new list
                                        // generation; fetch the full list.
                                        info!("loads feed is stale, refreshing server list");
                                        updates.execute_now(&list_update).await
                                    }
                                    Err(err @ LoadsError::Malformed(_)) => {
                                        Err(ApiError::Parse(err.to_string()))
                                    }
                                }
                            }
                            None => {
                                let loads = api.get_loads().await?;
                                manager.update_loads(&loads).await;
                                Ok(())
                            }
                        }
                    }
                }
            },
            vec![PeriodicUpdateSpec::new(
                LOADS_UPDATE_DELAY,
                vec![logged_in, in_foreground],
            )],
        );

        Self {
            updates,
            list_update,
            loads_update,
            retained_ids,
        }
    }

    /// Ids that must survive the next list replace, e.g. the server of
    /// an active connection
    pub fn set_retained_server_ids(&self, ids: HashSet<String>) {
        *self.retained_ids.write() = ids;
    }

    /// Fetch the full list immediately, ignoring cadence and gating
    pub async fn force_update(&self) -> ApiResult<()> {
        self.updates.execute_now(&self.list_update).await
    }

    pub async fn force_loads_update(&self) -> ApiResult<()> {
        self.updates.execute_now(&self.loads_update).await
    }
}
