//! Infrastructure layer: configuration, repositories, cache tiers, payment gateway.

pub mod cache;
pub mod config;
pub mod gateway;
pub mod postgres;
pub mod store;

pub use cache::{CacheError, CacheTier, InMemoryCacheTier, InscriptionCache, PgCacheTier, RedisCacheTier};
pub use config::{Config, ConfigError};
pub use gateway::{FakePaymentGateway, GatewayError, GatewayWebhook, HttpPaymentGateway, PaymentGateway, WebhookEvent};
pub use postgres::PgStore;
pub use store::{InMemoryStore, StoreError, StoreResult, Stores};
