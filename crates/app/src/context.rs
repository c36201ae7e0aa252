use regdesk_auth::{JwtClaims, Permission, Principal, Role, authorize};
use regdesk_core::{AccountId, RegionId};

use crate::error::{UsecaseError, UsecaseResult};

/// Who is calling a use case.
///
/// Built from verified token claims; immutable for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    principal: Principal,
}

impl ActorContext {
    pub fn new(account_id: AccountId, role: Role, region_id: Option<RegionId>) -> Self {
        Self {
            principal: Principal::new(account_id, role, region_id),
        }
    }

    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            principal: Principal::from_claims(claims),
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.principal.account_id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn region_id(&self) -> Option<RegionId> {
        self.principal.region_id
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.principal.permissions
    }

    pub fn is_staff(&self) -> bool {
        self.principal.is_staff()
    }

    pub fn require(&self, permission: &Permission) -> UsecaseResult<()> {
        authorize(&self.principal, permission)?;
        Ok(())
    }

    pub fn ensure_region(&self, region_id: RegionId) -> UsecaseResult<()> {
        if self.principal.can_reach_region(region_id) {
            return Ok(());
        }
        Err(UsecaseError::forbidden(format!(
            "account {} cannot act on region {region_id}",
            self.account_id()
        ))
        .with_context("region_id", region_id.to_string()))
    }

    /// Region filter for list queries: scoped roles only see their own region.
    pub fn region_filter(&self) -> Option<RegionId> {
        if self.role().is_region_scoped() { self.region_id() } else { None }
    }
}
