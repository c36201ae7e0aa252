use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::instrument;
use uuid::Uuid;

use regdesk_accounts::{
    Account, AccountParticipant, AccountParticipantId, AccountParticipantRecord, AccountRecord, Region,
};
use regdesk_core::{AccountId, RegionId};

use super::{PgStore, expect_rows, map_sqlx_error, parse_column};
use crate::store::{AccountParticipantRepository, AccountRepository, RegionRepository, StoreResult};

fn region_from_row(row: &PgRow) -> StoreResult<Region> {
    let decode = |e| map_sqlx_error("decode_region", e);
    Ok(Region::with(
        RegionId::from_uuid(row.try_get("id").map_err(decode)?),
        row.try_get("name").map_err(decode)?,
        row.try_get("created_at").map_err(decode)?,
    ))
}

fn account_from_row(row: &PgRow) -> StoreResult<Account> {
    let decode = |e| map_sqlx_error("decode_account", e);
    let role: String = row.try_get("role").map_err(decode)?;
    let region_id: Option<Uuid> = row.try_get("region_id").map_err(decode)?;
    Ok(Account::with(AccountRecord {
        id: AccountId::from_uuid(row.try_get("id").map_err(decode)?),
        username: row.try_get("username").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        role: parse_column("role", &role)?,
        region_id: region_id.map(RegionId::from_uuid),
        active: row.try_get("active").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    }))
}

fn participant_from_row(row: &PgRow) -> StoreResult<AccountParticipant> {
    let decode = |e| map_sqlx_error("decode_account_participant", e);
    let gender: String = row.try_get("gender").map_err(decode)?;
    let birth_date: NaiveDate = row.try_get("birth_date").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;
    Ok(AccountParticipant::with(AccountParticipantRecord {
        id: AccountParticipantId::from_uuid(row.try_get("id").map_err(decode)?),
        account_id: AccountId::from_uuid(row.try_get("account_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        birth_date,
        gender: parse_column("gender", &gender)?,
        document: row.try_get("document").map_err(decode)?,
        phone: row.try_get("phone").map_err(decode)?,
        created_at,
    }))
}

#[async_trait]
impl RegionRepository for PgStore {
    #[instrument(skip(self, region), fields(region_id = %region.id_typed()), err)]
    async fn insert_region(&self, region: &Region) -> StoreResult<()> {
        sqlx::query("INSERT INTO regions (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(region.id_typed().as_uuid())
            .bind(region.name())
            .bind(region.created_at())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_region", e))?;
        Ok(())
    }

    async fn get_region(&self, id: RegionId) -> StoreResult<Option<Region>> {
        sqlx::query("SELECT id, name, created_at FROM regions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_region", e))?
            .as_ref()
            .map(region_from_row)
            .transpose()
    }

    async fn list_regions(&self) -> StoreResult<Vec<Region>> {
        sqlx::query("SELECT id, name, created_at FROM regions ORDER BY name")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_regions", e))?
            .iter()
            .map(region_from_row)
            .collect()
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, name, email, role, region_id, active, created_at";

#[async_trait]
impl AccountRepository for PgStore {
    #[instrument(skip(self, account), fields(account_id = %account.id_typed(), username = account.username()), err)]
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, name, email, role, region_id, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account.id_typed().as_uuid())
        .bind(account.username())
        .bind(account.name())
        .bind(account.email())
        .bind(account.role().as_str())
        .bind(account.region_id().map(|r| *r.as_uuid()))
        .bind(account.is_active())
        .bind(account.created_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    #[instrument(skip(self, account), fields(account_id = %account.id_typed()), err)]
    async fn update_account(&self, account: &Account) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET name = $2, email = $3, role = $4, region_id = $5, active = $6
            WHERE id = $1
            "#,
        )
        .bind(account.id_typed().as_uuid())
        .bind(account.name())
        .bind(account.email())
        .bind(account.role().as_str())
        .bind(account.region_id().map(|r| *r.as_uuid()))
        .bind(account.is_active())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_account", e))?;
        expect_rows(result)
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_account", e))?
            .as_ref()
            .map(account_from_row)
            .transpose()
    }

    async fn list_accounts(&self, region: Option<RegionId>) -> StoreResult<Vec<Account>> {
        sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE ($1::uuid IS NULL OR region_id = $1) ORDER BY username"
        ))
        .bind(region.map(|r| *r.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?
        .iter()
        .map(account_from_row)
        .collect()
    }
}

const PARTICIPANT_COLUMNS: &str = "id, account_id, name, birth_date, gender, document, phone, created_at";

#[async_trait]
impl AccountParticipantRepository for PgStore {
    #[instrument(skip(self, participant), fields(participant_id = %participant.id_typed()), err)]
    async fn insert_account_participant(&self, participant: &AccountParticipant) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO account_participants (id, account_id, name, birth_date, gender, document, phone, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(participant.id_typed().as_uuid())
        .bind(participant.account_id().as_uuid())
        .bind(participant.name())
        .bind(participant.birth_date())
        .bind(participant.gender().as_str())
        .bind(participant.document())
        .bind(participant.phone())
        .bind(participant.created_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account_participant", e))?;
        Ok(())
    }

    #[instrument(skip(self, participant), fields(participant_id = %participant.id_typed()), err)]
    async fn update_account_participant(&self, participant: &AccountParticipant) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE account_participants
            SET name = $2, birth_date = $3, gender = $4, document = $5, phone = $6
            WHERE id = $1
            "#,
        )
        .bind(participant.id_typed().as_uuid())
        .bind(participant.name())
        .bind(participant.birth_date())
        .bind(participant.gender().as_str())
        .bind(participant.document())
        .bind(participant.phone())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_account_participant", e))?;
        expect_rows(result)
    }

    async fn get_account_participant(&self, id: AccountParticipantId) -> StoreResult<Option<AccountParticipant>> {
        sqlx::query(&format!("SELECT {PARTICIPANT_COLUMNS} FROM account_participants WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_account_participant", e))?
            .as_ref()
            .map(participant_from_row)
            .transpose()
    }

    async fn list_account_participants(&self, account_id: AccountId) -> StoreResult<Vec<AccountParticipant>> {
        sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM account_participants WHERE account_id = $1 ORDER BY name"
        ))
        .bind(account_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_account_participants", e))?
        .iter()
        .map(participant_from_row)
        .collect()
    }

    #[instrument(skip(self), fields(participant_id = %id), err)]
    async fn delete_account_participant(&self, id: AccountParticipantId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM account_participants WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_account_participant", e))?;
        expect_rows(result)
    }
}
