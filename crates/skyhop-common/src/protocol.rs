//! VPN protocol and transport selection model

use serde::{Deserialize, Serialize};

/// Tunneling protocol family
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VpnProtocol {
    WireGuard,
    /// Automatic selection among the remotely enabled protocols
    Smart,
}

/// Transport a protocol is carried over
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransmissionProtocol {
    Udp,
    Tcp,
    Tls,
}

/// A concrete (protocol, transport) pair the client can connect with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolSelection {
    pub vpn: VpnProtocol,
    pub transmission: TransmissionProtocol,
}

impl ProtocolSelection {
    pub const SMART: ProtocolSelection = ProtocolSelection {
        vpn: VpnProtocol::Smart,
        transmission: TransmissionProtocol::Udp,
    };

    pub const fn new(vpn: VpnProtocol, transmission: TransmissionProtocol) -> Self {
        Self { vpn, transmission }
    }

    /// Whether this selection stands for "pick for me"
    pub fn is_smart(&self) -> bool {
        self.vpn == VpnProtocol::Smart
    }
}

/// Ordered list of concrete protocols enabled by remote configuration
pub type SmartProtocols = Vec<ProtocolSelection>;
