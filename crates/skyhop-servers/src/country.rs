//! Derived server groupings

use crate::server::{supports_protocol, Server};
use skyhop_common::{has_access, ProtocolSelection, SmartProtocols, VpnUser};

/// All servers exiting in one country, for one topology (regular or
/// secure core). Rebuilt on every bulk replace.
#[derive(Clone, Debug, PartialEq)]
pub struct VpnCountry {
    /// 2-letter exit country code
    pub flag: String,
    pub servers: Vec<Server>,
}

impl VpnCountry {
    pub fn has_accessible_online_server(&self, user: Option<&VpnUser>) -> bool {
        self.servers
            .iter()
            .any(|server| server.online && has_access(user, server.tier))
    }

    /// Online servers the user can connect to with the given protocol
    pub fn accessible_online_servers(
        &self,
        user: Option<&VpnUser>,
        protocol: ProtocolSelection,
        smart_protocols: &SmartProtocols,
    ) -> Vec<&Server> {
        self.servers
            .iter()
            .filter(|server| {
                server.online
                    && has_access(user, server.tier)
                    && supports_protocol(server, protocol, smart_protocols)
            })
            .collect()
    }
}

/// A named private gateway's servers
#[derive(Clone, Debug, PartialEq)]
pub struct GatewayGroup {
    pub name: String,
    pub servers: Vec<Server>,
}
