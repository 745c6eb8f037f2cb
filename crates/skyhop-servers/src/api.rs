//! Remote endpoints the directory refreshes from

use crate::loads::LoadUpdate;
use crate::server::Server;
use crate::streaming::StreamingServicesResponse;
use crate::translations::ServerTranslationsResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skyhop_common::ApiResult;

/// Full logicals payload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerListResponse {
    #[serde(rename = "LogicalServers")]
    pub logical_servers: Vec<Server>,
    /// Generation tag pairing this list with binary load feeds
    #[serde(rename = "StatusID", default)]
    pub status_id: Option<String>,
}

/// Outcome of a conditional logicals fetch
#[derive(Clone, Debug)]
pub enum ServerListResult {
    List(ServerListResponse),
    /// The backend reported no change since the last fetch
    NotModified,
}

/// Packed load feed, tagged with the generation it was produced for
#[derive(Clone, Debug)]
pub struct BinaryLoadsResponse {
    pub status_id: String,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait ServersApi: Send + Sync {
    async fn get_server_list(&self) -> ApiResult<ServerListResult>;

    async fn get_loads(&self) -> ApiResult<Vec<LoadUpdate>>;

    /// Packed load feed; the response may carry a newer generation than
    /// the requested one
    async fn get_binary_loads(&self, status_id: &str) -> ApiResult<BinaryLoadsResponse>;

    async fn get_streaming_services(&self) -> ApiResult<StreamingServicesResponse>;

    async fn get_server_translations(
        &self,
        language_tag: &str,
    ) -> ApiResult<ServerTranslationsResponse>;
}
