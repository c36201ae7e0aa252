//! Postgres-backed repositories.
//!
//! ## Error mapping
//!
//! | sqlx error | Postgres code | `StoreError` |
//! |---|---|---|
//! | unique violation | `23505` | `Conflict` |
//! | foreign key violation | `23503` | `Conflict` |
//! | `RowNotFound` | - | `NotFound` |
//! | column decode failure | - | `Serialization` |
//! | anything else | - | `Backend` |
//!
//! Money is stored as `BIGINT` cents; enums as their lowercase names.

mod accounts;
mod events;
mod finance;
mod inscriptions;
mod payments;

use std::str::FromStr;
use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, instrument};

use regdesk_core::DomainError;

use crate::store::{StoreError, StoreResult};

const SCHEMA: &str = include_str!("../../schema.sql");

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Opens a pool against `url`.
    #[instrument(skip(url), err)]
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        info!(max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }

    /// Applies `schema.sql`. Every statement is `IF NOT EXISTS`.
    #[instrument(skip(self), err)]
    pub async fn apply_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }

    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        decode @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_)) => {
            StoreError::Serialization(format!("{operation}: {decode}"))
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}

/// Parses an enum column stored as text.
pub(crate) fn parse_column<T>(column: &str, raw: &str) -> StoreResult<T>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|e: DomainError| StoreError::Serialization(format!("column {column}: {e}")))
}

pub(crate) fn to_int(column: &str, value: u32) -> StoreResult<i32> {
    i32::try_from(value).map_err(|_| StoreError::Serialization(format!("column {column}: {value} out of range")))
}

pub(crate) fn from_int(column: &str, value: i32) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Serialization(format!("column {column}: {value} is negative")))
}

/// Turns a zero-row `UPDATE`/`DELETE` into `NotFound`.
pub(crate) fn expect_rows(result: sqlx::postgres::PgQueryResult) -> StoreResult<()> {
    if result.rows_affected() == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}
