//! Two-tier store for staged inscriptions.
//!
//! Records are written to both tiers, read from the fast tier first and
//! repopulated there from the durable tier on a miss. The durable tier is
//! authoritative: failures there fail the operation, while fast-tier failures
//! are logged and absorbed.

mod pg_tier;
mod redis_tier;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use regdesk_inscriptions::CacheRecord;

pub use pg_tier::PgCacheTier;
pub use redis_tier::RedisCacheTier;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache payload could not be encoded or decoded: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait CacheTier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stores the record until its `expires_at`.
    async fn put(&self, record: &CacheRecord, now: DateTime<Utc>) -> CacheResult<()>;

    /// Returns the record even when it is past its expiry; callers decide.
    async fn get(&self, key: &str) -> CacheResult<Option<CacheRecord>>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Drops records expired at `now`, returning how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> CacheResult<u64>;
}

/// Process-local tier (tests/dev, or the fast tier when Redis is not configured).
#[derive(Default)]
pub struct InMemoryCacheTier {
    records: RwLock<HashMap<String, CacheRecord>>,
}

impl InMemoryCacheTier {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> CacheError {
    CacheError::Backend("in-memory cache lock poisoned".to_string())
}

#[async_trait]
impl CacheTier for InMemoryCacheTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, record: &CacheRecord, _now: DateTime<Utc>) -> CacheResult<()> {
        self.records
            .write()
            .map_err(|_| poisoned())?
            .insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheRecord>> {
        Ok(self.records.read().map_err(|_| poisoned())?.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.records.write().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> CacheResult<u64> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}

/// Write-through / read-through pair of tiers.
#[derive(Clone)]
pub struct InscriptionCache {
    fast: Arc<dyn CacheTier>,
    durable: Arc<dyn CacheTier>,
}

impl InscriptionCache {
    pub fn new(fast: Arc<dyn CacheTier>, durable: Arc<dyn CacheTier>) -> Self {
        Self { fast, durable }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCacheTier::new()), Arc::new(InMemoryCacheTier::new()))
    }

    #[instrument(skip(self, record), fields(key = %record.key, owner = %record.owner), err)]
    pub async fn put(&self, record: &CacheRecord, now: DateTime<Utc>) -> CacheResult<()> {
        self.durable.put(record, now).await?;
        if let Err(e) = self.fast.put(record, now).await {
            warn!(tier = self.fast.name(), error = %e, "fast cache write failed");
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn get(&self, key: &str, now: DateTime<Utc>) -> CacheResult<Option<CacheRecord>> {
        match self.fast.get(key).await {
            Ok(Some(record)) => return Ok(Some(record)),
            Ok(None) => {}
            Err(e) => warn!(tier = self.fast.name(), error = %e, "fast cache read failed"),
        }

        let Some(record) = self.durable.get(key).await? else {
            return Ok(None);
        };
        if !record.is_expired(now) {
            debug!(tier = self.fast.name(), "repopulating fast cache");
            if let Err(e) = self.fast.put(&record, now).await {
                warn!(tier = self.fast.name(), error = %e, "fast cache repopulation failed");
            }
        }
        Ok(Some(record))
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        if let Err(e) = self.fast.delete(key).await {
            warn!(tier = self.fast.name(), error = %e, "fast cache delete failed");
        }
        self.durable.delete(key).await
    }

    /// Purges both tiers; returns the durable tier's count.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> CacheResult<u64> {
        if let Err(e) = self.fast.purge_expired(now).await {
            warn!(tier = self.fast.name(), error = %e, "fast cache purge failed");
        }
        self.durable.purge_expired(now).await
    }
}
