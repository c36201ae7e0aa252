//! Durable tier backed by the `inscription_cache` table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use regdesk_inscriptions::CacheRecord;

use super::{CacheError, CacheResult, CacheTier};

pub struct PgCacheTier {
    pool: Arc<PgPool>,
}

impl PgCacheTier {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn backend(operation: &str, err: sqlx::Error) -> CacheError {
    CacheError::Backend(format!("{operation}: {err}"))
}

#[async_trait]
impl CacheTier for PgCacheTier {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self, record), fields(key = %record.key), err)]
    async fn put(&self, record: &CacheRecord, _now: DateTime<Utc>) -> CacheResult<()> {
        let payload = serde_json::to_value(&record.payload).map_err(|e| CacheError::Serialization(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO inscription_cache (key, owner, event_id, payload, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (key)
            DO UPDATE SET payload = EXCLUDED.payload, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&record.key)
        .bind(record.owner.as_uuid())
        .bind(record.event_id.as_uuid())
        .bind(payload)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| backend("put_cache_record", e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheRecord>> {
        let Some(row) = sqlx::query(
            "SELECT key, owner, event_id, payload, created_at, expires_at FROM inscription_cache WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| backend("get_cache_record", e))?
        else {
            return Ok(None);
        };

        let decode = |e| backend("decode_cache_record", e);
        let payload: serde_json::Value = row.try_get("payload").map_err(decode)?;
        Ok(Some(CacheRecord {
            key: row.try_get("key").map_err(decode)?,
            owner: regdesk_core::AccountId::from_uuid(row.try_get("owner").map_err(decode)?),
            event_id: regdesk_events::EventId::from_uuid(row.try_get("event_id").map_err(decode)?),
            payload: serde_json::from_value(payload).map_err(|e| CacheError::Serialization(e.to_string()))?,
            created_at: row.try_get("created_at").map_err(decode)?,
            expires_at: row.try_get("expires_at").map_err(decode)?,
        }))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        sqlx::query("DELETE FROM inscription_cache WHERE key = $1")
            .bind(key)
            .execute(&*self.pool)
            .await
            .map_err(|e| backend("delete_cache_record", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn purge_expired(&self, now: DateTime<Utc>) -> CacheResult<u64> {
        let result = sqlx::query("DELETE FROM inscription_cache WHERE expires_at <= $1")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| backend("purge_cache_records", e))?;
        Ok(result.rows_affected())
    }
}
