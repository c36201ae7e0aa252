//! HS256 token decoding/encoding on top of `jsonwebtoken`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use regdesk_core::{AccountId, RegionId};

use crate::{JwtClaims, Role, TokenValidationError, validate_claims};

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// Shared-secret (HS256) validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time window is checked by `validate_claims` on our own claim names.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

/// Shared-secret (HS256) issuer for tests and operator tooling.
pub struct Hs256JwtIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl Hs256JwtIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(
        &self,
        sub: AccountId,
        role: Role,
        region_id: Option<RegionId>,
    ) -> Result<String, TokenValidationError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub,
            role,
            region_id,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates_with_same_secret() {
        let issuer = Hs256JwtIssuer::new(b"secret", Duration::minutes(5));
        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        let sub = AccountId::new();

        let token = issuer.issue(sub, Role::Admin, None).unwrap();
        let claims = validator.validate(&token, Utc::now()).unwrap();

        assert_eq!(claims.sub, sub);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = Hs256JwtIssuer::new(b"secret", Duration::minutes(5));
        let validator = Hs256JwtValidator::new(b"other".to_vec());
        let token = issuer.issue(AccountId::new(), Role::User, None).unwrap();

        assert!(matches!(
            validator.validate(&token, Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = Hs256JwtIssuer::new(b"secret", Duration::minutes(5));
        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        let token = issuer.issue(AccountId::new(), Role::User, None).unwrap();

        let later = Utc::now() + Duration::minutes(6);
        assert_eq!(validator.validate(&token, later), Err(TokenValidationError::Expired));
    }
}
