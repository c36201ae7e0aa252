//! Redis fast tier: one JSON string per record, expired by Redis itself (`SET .. EX`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use tracing::{info, instrument};

use regdesk_inscriptions::CacheRecord;

use super::{CacheError, CacheResult, CacheTier};

const KEY_PREFIX: &str = "regdesk:inscription-cache:";

#[derive(Clone)]
pub struct RedisCacheTier {
    conn: ConnectionManager,
}

impl RedisCacheTier {
    #[instrument(skip(redis_url), err)]
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| CacheError::Backend(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        info!("connected to redis");
        Ok(Self { conn })
    }

    fn redis_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }
}

#[async_trait]
impl CacheTier for RedisCacheTier {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn put(&self, record: &CacheRecord, now: DateTime<Utc>) -> CacheResult<()> {
        let ttl = record.ttl_seconds(now);
        if ttl == 0 {
            return Ok(());
        }
        let payload = serde_json::to_string(record).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(Self::redis_key(&record.key))
            .arg(payload)
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::redis_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        raw.map(|json| serde_json::from_str(&json).map_err(|e| CacheError::Serialization(e.to_string())))
            .transpose()
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: u64 = redis::cmd("DEL")
            .arg(Self::redis_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> CacheResult<u64> {
        // Keys carry their own TTL.
        Ok(0)
    }
}
