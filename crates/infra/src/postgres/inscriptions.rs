use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::instrument;
use uuid::Uuid;

use regdesk_accounts::AccountParticipantId;
use regdesk_core::{AccountId, Money};
use regdesk_events::{EventId, TypeInscriptionId};
use regdesk_inscriptions::{Inscription, InscriptionId, InscriptionRecord, Participant, ParticipantId};

use super::{PgStore, expect_rows, map_sqlx_error, parse_column};
use crate::store::{InscriptionRepository, StoreResult};

const INSCRIPTION_COLUMNS: &str = "id, event_id, account_id, responsible, email, phone, status, total_value, \
    total_paid, is_guest, created_at, expires_at";

fn inscription_from_row(row: &PgRow) -> StoreResult<Inscription> {
    let decode = |e| map_sqlx_error("decode_inscription", e);
    let status: String = row.try_get("status").map_err(decode)?;
    let account_id: Option<Uuid> = row.try_get("account_id").map_err(decode)?;
    Ok(Inscription::with(InscriptionRecord {
        id: InscriptionId::from_uuid(row.try_get("id").map_err(decode)?),
        event_id: EventId::from_uuid(row.try_get("event_id").map_err(decode)?),
        account_id: account_id.map(AccountId::from_uuid),
        responsible: row.try_get("responsible").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        phone: row.try_get("phone").map_err(decode)?,
        status: parse_column("status", &status)?,
        total_value: Money::from_cents(row.try_get("total_value").map_err(decode)?),
        total_paid: Money::from_cents(row.try_get("total_paid").map_err(decode)?),
        is_guest: row.try_get("is_guest").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        expires_at: row.try_get("expires_at").map_err(decode)?,
    }))
}

fn participant_from_row(row: &PgRow) -> StoreResult<Participant> {
    let decode = |e| map_sqlx_error("decode_participant", e);
    let gender: String = row.try_get("gender").map_err(decode)?;
    let account_participant_id: Option<Uuid> = row.try_get("account_participant_id").map_err(decode)?;
    Ok(Participant::with(
        ParticipantId::from_uuid(row.try_get("id").map_err(decode)?),
        InscriptionId::from_uuid(row.try_get("inscription_id").map_err(decode)?),
        row.try_get("name").map_err(decode)?,
        row.try_get("birth_date").map_err(decode)?,
        parse_column("gender", &gender)?,
        TypeInscriptionId::from_uuid(row.try_get("type_inscription_id").map_err(decode)?),
        Money::from_cents(row.try_get("value").map_err(decode)?),
        account_participant_id.map(AccountParticipantId::from_uuid),
    ))
}

impl PgStore {
    async fn select_inscriptions(&self, operation: &str, filter: &str, bind: Uuid) -> StoreResult<Vec<Inscription>> {
        sqlx::query(&format!(
            "SELECT {INSCRIPTION_COLUMNS} FROM inscriptions WHERE {filter} ORDER BY created_at"
        ))
        .bind(bind)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?
        .iter()
        .map(inscription_from_row)
        .collect()
    }
}

#[async_trait]
impl InscriptionRepository for PgStore {
    #[instrument(
        skip(self, inscription, participants),
        fields(inscription_id = %inscription.id_typed(), participants = participants.len()),
        err
    )]
    async fn insert_inscription(&self, inscription: &Inscription, participants: &[Participant]) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(&format!(
            "INSERT INTO inscriptions ({INSCRIPTION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(inscription.id_typed().as_uuid())
        .bind(inscription.event_id().as_uuid())
        .bind(inscription.account_id().map(|a| *a.as_uuid()))
        .bind(inscription.responsible())
        .bind(inscription.email())
        .bind(inscription.phone())
        .bind(inscription.status().as_str())
        .bind(inscription.total_value().cents())
        .bind(inscription.total_paid().cents())
        .bind(inscription.is_guest())
        .bind(inscription.created_at())
        .bind(inscription.expires_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_inscription", e))?;

        for participant in participants {
            sqlx::query(
                r#"
                INSERT INTO participants (
                    id, inscription_id, name, birth_date, gender, type_inscription_id, value, account_participant_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(participant.id_typed().as_uuid())
            .bind(participant.inscription_id().as_uuid())
            .bind(participant.name())
            .bind(participant.birth_date())
            .bind(participant.gender().as_str())
            .bind(participant.type_inscription_id().as_uuid())
            .bind(participant.value().cents())
            .bind(participant.account_participant_id().map(|p| *p.as_uuid()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_participant", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, inscription), fields(inscription_id = %inscription.id_typed()), err)]
    async fn update_inscription(&self, inscription: &Inscription) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inscriptions
            SET responsible = $2, email = $3, phone = $4, status = $5, total_value = $6, total_paid = $7,
                expires_at = $8
            WHERE id = $1
            "#,
        )
        .bind(inscription.id_typed().as_uuid())
        .bind(inscription.responsible())
        .bind(inscription.email())
        .bind(inscription.phone())
        .bind(inscription.status().as_str())
        .bind(inscription.total_value().cents())
        .bind(inscription.total_paid().cents())
        .bind(inscription.expires_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_inscription", e))?;
        expect_rows(result)
    }

    async fn get_inscription(&self, id: InscriptionId) -> StoreResult<Option<Inscription>> {
        Ok(self
            .select_inscriptions("get_inscription", "id = $1", *id.as_uuid())
            .await?
            .into_iter()
            .next())
    }

    async fn list_participants(&self, inscription_id: InscriptionId) -> StoreResult<Vec<Participant>> {
        sqlx::query(
            r#"
            SELECT id, inscription_id, name, birth_date, gender, type_inscription_id, value, account_participant_id
            FROM participants
            WHERE inscription_id = $1
            ORDER BY name
            "#,
        )
        .bind(inscription_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_participants", e))?
        .iter()
        .map(participant_from_row)
        .collect()
    }

    async fn list_inscriptions_by_event(&self, event_id: EventId) -> StoreResult<Vec<Inscription>> {
        self.select_inscriptions("list_inscriptions_by_event", "event_id = $1", *event_id.as_uuid())
            .await
    }

    async fn list_inscriptions_by_account(&self, account_id: AccountId) -> StoreResult<Vec<Inscription>> {
        self.select_inscriptions("list_inscriptions_by_account", "account_id = $1", *account_id.as_uuid())
            .await
    }

    #[instrument(skip(self), fields(inscription_id = %id), err)]
    async fn delete_inscription(&self, id: InscriptionId) -> StoreResult<()> {
        // participants cascade.
        let result = sqlx::query("DELETE FROM inscriptions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_inscription", e))?;
        expect_rows(result)
    }

    async fn count_inscriptions_by_event(&self, event_id: EventId) -> StoreResult<u64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS total FROM inscriptions WHERE event_id = $1")
            .bind(event_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_inscriptions_by_event", e))?
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_inscriptions_by_event", e))?;
        Ok(count.max(0) as u64)
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Inscription>> {
        sqlx::query(&format!(
            "SELECT {INSCRIPTION_COLUMNS} FROM inscriptions \
             WHERE status = 'pending' AND total_paid = 0 AND expires_at IS NOT NULL AND expires_at < $1"
        ))
        .bind(now)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_expired_pending", e))?
        .iter()
        .map(inscription_from_row)
        .collect()
    }

    async fn list_expired_guests(&self, now: DateTime<Utc>) -> StoreResult<Vec<Inscription>> {
        sqlx::query(&format!(
            "SELECT {INSCRIPTION_COLUMNS} FROM inscriptions \
             WHERE is_guest AND status <> 'paid' AND expires_at IS NOT NULL AND expires_at < $1"
        ))
        .bind(now)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_expired_guests", e))?
        .iter()
        .map(inscription_from_row)
        .collect()
    }

    async fn type_in_use(&self, type_id: TypeInscriptionId) -> StoreResult<bool> {
        sqlx::query("SELECT EXISTS (SELECT 1 FROM participants WHERE type_inscription_id = $1) AS used")
            .bind(type_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("type_in_use", e))?
            .try_get("used")
            .map_err(|e| map_sqlx_error("type_in_use", e))
    }
}
