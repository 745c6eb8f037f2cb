//! Server feature bitset

use serde::{Deserialize, Serialize};

/// Capabilities a server can advertise, decoded from the wire bitmask
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerFeature {
    SecureCore,
    Tor,
    P2P,
    Streaming,
    Ipv6,
    /// Member of a private gateway rather than the public directory
    Restricted,
}

impl ServerFeature {
    fn bit(self) -> u32 {
        match self {
            ServerFeature::SecureCore => 1,
            ServerFeature::Tor => 2,
            ServerFeature::P2P => 4,
            ServerFeature::Streaming => 8,
            ServerFeature::Ipv6 => 16,
            ServerFeature::Restricted => 32,
        }
    }
}

/// Packed set of [`ServerFeature`]s, stored as the wire bitmask
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerFeatures(u32);

impl ServerFeatures {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn of(features: &[ServerFeature]) -> Self {
        Self(features.iter().fold(0, |acc, f| acc | f.bit()))
    }

    pub fn contains(&self, feature: ServerFeature) -> bool {
        self.0 & feature.bit() != 0
    }

    /// True when every feature in `required` is present
    pub fn satisfies(&self, required: ServerFeatures) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}
