//! Server directory and selection engine for the Skyhop VPN client
//!
//! The directory is fetched remotely, persisted locally and kept fresh
//! through the periodic update manager. On top of it sits the intent
//! resolver and score ranker the connection flow uses to turn "fastest
//! in Switzerland" into one concrete server.

pub mod api;
pub mod country;
pub mod directory;
pub mod intent;
pub mod loads;
pub mod manager;
pub mod ranking;
mod resolver;
pub mod server;
pub mod streaming;
pub mod translations;
pub mod updater;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use api::{BinaryLoadsResponse, ServerListResponse, ServerListResult, ServersApi};
pub use country::{GatewayGroup, VpnCountry};
pub use directory::DirectoryStore;
pub use intent::{ConnectIntent, ExcludedLocations, ServersResult};
pub use loads::{LoadUpdate, LoadsError};
pub use manager::{ServerManager, ServerManagerError};
pub use ranking::{best_score_server, random_server};
pub use server::{supports_protocol, ConnectingDomain, ProtocolEntry, Server};
pub use streaming::{
    StreamingService, StreamingServicesResponse, StreamingServicesStore, StreamingServicesUpdater,
};
pub use translations::{
    LocaleProvider, ServerTranslationsResponse, Translator, UpdateServerTranslations,
};
pub use updater::ServerListUpdater;
