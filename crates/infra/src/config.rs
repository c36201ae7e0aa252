//! Configuration loaded from the environment (and `.env` when present).

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const DEV_JWT_SECRET: &str = "regdesk-dev-secret-change-me";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    pub inscriptions: InscriptionConfig,
    pub workers: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `None` runs on the in-memory stores.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// `None` keeps the fast cache tier in process memory.
    pub url: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig").field("jwt_secret", &"<redacted>").finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// `None` selects the fake gateway.
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(skip_serializing)]
    pub webhook_token: Option<String>,
    /// Gateway fee in basis points, deducted from each installment's net value.
    pub fee_bps: u32,
    pub max_installments: u32,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("webhook_token", &self.webhook_token.as_ref().map(|_| "<redacted>"))
            .field("fee_bps", &self.fee_bps)
            .field("max_installments", &self.max_installments)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InscriptionConfig {
    pub cache_ttl_secs: u64,
    pub pending_ttl_hours: u64,
    pub guest_ttl_minutes: u64,
    pub payment_link_ttl_hours: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub expired_interval_secs: u64,
    pub guest_interval_secs: u64,
}

impl Default for InscriptionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 1800,
            pending_ttl_hours: 72,
            guest_ttl_minutes: 30,
            payment_link_ttl_hours: 48,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            expired_interval_secs: 1800,
            guest_interval_secs: 900,
        }
    }
}

impl Config {
    /// Loads `.env` (if any) and then reads the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = match text("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET is not set; using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let inscription_defaults = InscriptionConfig::default();
        let worker_defaults = WorkerConfig::default();

        Ok(Self {
            server: ServerConfig {
                host: text("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed(&lookup, "PORT", 8080)?,
            },
            database: DatabaseConfig {
                url: text("DATABASE_URL"),
                max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            redis: RedisConfig { url: text("REDIS_URL") },
            auth: AuthConfig { jwt_secret },
            gateway: GatewayConfig {
                base_url: text("GATEWAY_BASE_URL"),
                api_key: text("GATEWAY_API_KEY"),
                webhook_token: text("GATEWAY_WEBHOOK_TOKEN"),
                fee_bps: parsed(&lookup, "GATEWAY_FEE_BPS", 399)?,
                max_installments: parsed(&lookup, "GATEWAY_MAX_INSTALLMENTS", 12)?,
            },
            inscriptions: InscriptionConfig {
                cache_ttl_secs: parsed(&lookup, "INSCRIPTION_CACHE_TTL_SECS", inscription_defaults.cache_ttl_secs)?,
                pending_ttl_hours: parsed(
                    &lookup,
                    "INSCRIPTION_PENDING_TTL_HOURS",
                    inscription_defaults.pending_ttl_hours,
                )?,
                guest_ttl_minutes: parsed(
                    &lookup,
                    "GUEST_INSCRIPTION_TTL_MINUTES",
                    inscription_defaults.guest_ttl_minutes,
                )?,
                payment_link_ttl_hours: parsed(
                    &lookup,
                    "PAYMENT_LINK_TTL_HOURS",
                    inscription_defaults.payment_link_ttl_hours,
                )?,
            },
            workers: WorkerConfig {
                expired_interval_secs: parsed(
                    &lookup,
                    "WORKER_EXPIRED_INTERVAL_SECS",
                    worker_defaults.expired_interval_secs,
                )?,
                guest_interval_secs: parsed(
                    &lookup,
                    "WORKER_GUEST_INTERVAL_SECS",
                    worker_defaults.guest_interval_secs,
                )?,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = from(&[]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.database.url.is_none());
        assert!(config.redis.url.is_none());
        assert_eq!(config.gateway.fee_bps, 399);
        assert_eq!(config.gateway.max_installments, 12);
        assert_eq!(config.inscriptions, InscriptionConfig::default());
        assert_eq!(config.workers.expired_interval_secs, 1800);
        assert_eq!(config.workers.guest_interval_secs, 900);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = from(&[
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/regdesk"),
            ("GUEST_INSCRIPTION_TTL_MINUTES", "5"),
            ("GATEWAY_API_KEY", "key"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/regdesk"));
        assert_eq!(config.inscriptions.guest_ttl_minutes, 5);
        assert_eq!(config.gateway.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = from(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "PORT",
                value: "eighty".to_string()
            }
        );
    }

    #[test]
    fn secrets_are_redacted() {
        let config = from(&[("JWT_SECRET", "s3cret"), ("GATEWAY_WEBHOOK_TOKEN", "tok-42")]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("tok-42"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("s3cret"));
    }
}
