//! Infrastructure wiring for the binary: storage, cache tiers, payment gateway.

use std::sync::Arc;

use tracing::{info, warn};

use regdesk_app::{AppServices, Settings, SystemClock};
use regdesk_infra::{
    CacheTier, Config, FakePaymentGateway, HttpPaymentGateway, InMemoryCacheTier, InscriptionCache, PaymentGateway,
    PgCacheTier, PgStore, RedisCacheTier, Stores,
};

/// Postgres when `DATABASE_URL` is set, Redis when `REDIS_URL` is set,
/// in-memory otherwise.
pub async fn build_services(config: &Config) -> anyhow::Result<AppServices> {
    let fast: Arc<dyn CacheTier> = match &config.redis.url {
        Some(url) => {
            info!("using redis cache tier");
            Arc::new(RedisCacheTier::connect(url).await?)
        }
        None => Arc::new(InMemoryCacheTier::new()),
    };

    let (stores, durable): (Stores, Arc<dyn CacheTier>) = match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(url, config.database.max_connections).await?;
            store.apply_schema().await?;
            info!("postgres schema applied");
            let durable: Arc<dyn CacheTier> = Arc::new(PgCacheTier::new(store.pool()));
            (Stores::from_backend(Arc::new(store)), durable)
        }
        None => {
            warn!("DATABASE_URL not set; data lives in memory and is lost on restart");
            let durable: Arc<dyn CacheTier> = Arc::new(InMemoryCacheTier::new());
            (Stores::in_memory(), durable)
        }
    };

    let gateway: Arc<dyn PaymentGateway> = match (&config.gateway.base_url, &config.gateway.api_key) {
        (Some(base_url), Some(api_key)) => Arc::new(HttpPaymentGateway::new(base_url.as_str(), api_key.as_str())?),
        _ => {
            warn!("payment gateway not configured; checkouts use the offline gateway");
            Arc::new(FakePaymentGateway::new())
        }
    };

    Ok(AppServices::new(
        stores,
        InscriptionCache::new(fast, durable),
        gateway,
        Arc::new(SystemClock),
        Settings::from_config(config),
    ))
}
