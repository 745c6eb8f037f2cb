//! User access tier

use serde::{Deserialize, Serialize};

/// The subscription tier of the signed-in user.
///
/// Servers carry a minimum tier; a user can connect to servers at or
/// below their own tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnUser {
    pub max_tier: u8,
}

impl VpnUser {
    pub fn new(max_tier: u8) -> Self {
        Self { max_tier }
    }

    pub fn has_access_to_tier(&self, server_tier: u8) -> bool {
        self.max_tier >= server_tier
    }
}

/// Access check tolerating a signed-out user (no access to anything)
pub fn has_access(user: Option<&VpnUser>, server_tier: u8) -> bool {
    user.map_or(false, |u| u.has_access_to_tier(server_tier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_access() {
        let free = VpnUser::new(0);
        let plus = VpnUser::new(2);
        assert!(free.has_access_to_tier(0));
        assert!(!free.has_access_to_tier(2));
        assert!(plus.has_access_to_tier(1));
        assert!(!has_access(None, 0));
    }
}
