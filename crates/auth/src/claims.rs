use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regdesk_core::{AccountId, RegionId};

use crate::Role;

/// Access token claims (transport-agnostic).
///
/// Tokens are issued by the identity provider; this is the minimal set of
/// claims the backend expects once a token has been decoded and verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the authenticated account.
    pub sub: AccountId,

    /// Role granted to the account.
    pub role: Role,

    /// Region the account belongs to (required for managers).
    #[serde(default)]
    pub region_id: Option<RegionId>,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("manager tokens must carry a region")]
    MissingRegion,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Deterministically validate token claims.
///
/// Signature verification happens in [`crate::jwt`]; this validates the
/// *claims* only.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    if claims.role.is_region_scoped() && claims.region_id.is_none() {
        return Err(TokenValidationError::MissingRegion);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(role: Role, region_id: Option<RegionId>) -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: AccountId::new(),
            role,
            region_id,
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn valid_claims_pass() {
        assert_eq!(validate_claims(&claims(Role::User, None), Utc::now()), Ok(()));
    }

    #[test]
    fn expired_claims_fail() {
        let c = claims(Role::User, None);
        let later = c.expires_at + Duration::seconds(1);
        assert_eq!(validate_claims(&c, later), Err(TokenValidationError::Expired));
    }

    #[test]
    fn future_claims_fail() {
        let c = claims(Role::Admin, None);
        let earlier = c.issued_at - Duration::seconds(1);
        assert_eq!(validate_claims(&c, earlier), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn manager_without_region_fails() {
        assert_eq!(
            validate_claims(&claims(Role::Manager, None), Utc::now()),
            Err(TokenValidationError::MissingRegion)
        );
        assert!(validate_claims(&claims(Role::Manager, Some(RegionId::new())), Utc::now()).is_ok());
    }
}
