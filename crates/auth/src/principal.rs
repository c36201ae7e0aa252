use serde::{Deserialize, Serialize};

use regdesk_core::{AccountId, RegionId};

use crate::{JwtClaims, Permission, Role, permissions_for_role};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub account_id: AccountId,
    pub role: Role,
    pub region_id: Option<RegionId>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(account_id: AccountId, role: Role, region_id: Option<RegionId>) -> Self {
        Self {
            account_id,
            role,
            region_id,
            permissions: permissions_for_role(role),
        }
    }

    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self::new(claims.sub, claims.role, claims.region_id)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Whether this principal may act within `region_id`.
    ///
    /// Super/admin principals reach every region; scoped roles only their own.
    pub fn can_reach_region(&self, region_id: RegionId) -> bool {
        if !self.role.is_region_scoped() {
            return true;
        }
        self.region_id == Some(region_id)
    }
}
