use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use tracing::instrument;
use uuid::Uuid;

use regdesk_core::{AccountId, Money};
use regdesk_events::EventId;
use regdesk_inscriptions::InscriptionId;
use regdesk_payments::{
    InstallmentId, Payment, PaymentAllocation, PaymentId, PaymentInstallment, PaymentLink, PaymentLinkId,
    PaymentLinkRecord, PaymentRecord,
};

use super::{PgStore, expect_rows, from_int, map_sqlx_error, parse_column, to_int};
use crate::store::{PaymentLinkRepository, PaymentRepository, StoreResult};

const PAYMENT_COLUMNS: &str = "id, event_id, account_id, method, origin, status, total_value, receipt_url, \
    rejection_reason, gateway_reference, created_at, reviewed_at";

const INSTALLMENT_COLUMNS: &str = "id, payment_id, number, value, net_value, status, due_on, paid_at, gateway_reference";

fn allocation_from_row(row: &PgRow) -> StoreResult<PaymentAllocation> {
    let decode = |e| map_sqlx_error("decode_payment_allocation", e);
    Ok(PaymentAllocation {
        payment_id: PaymentId::from_uuid(row.try_get("payment_id").map_err(decode)?),
        inscription_id: InscriptionId::from_uuid(row.try_get("inscription_id").map_err(decode)?),
        value: Money::from_cents(row.try_get("value").map_err(decode)?),
    })
}

fn installment_from_row(row: &PgRow) -> StoreResult<PaymentInstallment> {
    let decode = |e| map_sqlx_error("decode_payment_installment", e);
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(PaymentInstallment::with(
        InstallmentId::from_uuid(row.try_get("id").map_err(decode)?),
        PaymentId::from_uuid(row.try_get("payment_id").map_err(decode)?),
        from_int("number", row.try_get("number").map_err(decode)?)?,
        Money::from_cents(row.try_get("value").map_err(decode)?),
        Money::from_cents(row.try_get("net_value").map_err(decode)?),
        parse_column("status", &status)?,
        row.try_get("due_on").map_err(decode)?,
        row.try_get("paid_at").map_err(decode)?,
        row.try_get("gateway_reference").map_err(decode)?,
    ))
}

fn payment_from_row(
    row: &PgRow,
    allocations: Vec<PaymentAllocation>,
    installments: Vec<PaymentInstallment>,
) -> StoreResult<Payment> {
    let decode = |e| map_sqlx_error("decode_payment", e);
    let method: String = row.try_get("method").map_err(decode)?;
    let origin: String = row.try_get("origin").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let account_id: Option<Uuid> = row.try_get("account_id").map_err(decode)?;
    Ok(Payment::with(PaymentRecord {
        id: PaymentId::from_uuid(row.try_get("id").map_err(decode)?),
        event_id: EventId::from_uuid(row.try_get("event_id").map_err(decode)?),
        account_id: account_id.map(AccountId::from_uuid),
        method: parse_column("method", &method)?,
        origin: parse_column("origin", &origin)?,
        status: parse_column("status", &status)?,
        total_value: Money::from_cents(row.try_get("total_value").map_err(decode)?),
        receipt_url: row.try_get("receipt_url").map_err(decode)?,
        rejection_reason: row.try_get("rejection_reason").map_err(decode)?,
        gateway_reference: row.try_get("gateway_reference").map_err(decode)?,
        allocations,
        installments,
        created_at: row.try_get("created_at").map_err(decode)?,
        reviewed_at: row.try_get("reviewed_at").map_err(decode)?,
    }))
}

fn link_from_row(row: &PgRow) -> StoreResult<PaymentLink> {
    let decode = |e| map_sqlx_error("decode_payment_link", e);
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(PaymentLink::with(PaymentLinkRecord {
        id: PaymentLinkId::from_uuid(row.try_get("id").map_err(decode)?),
        event_id: EventId::from_uuid(row.try_get("event_id").map_err(decode)?),
        inscription_id: InscriptionId::from_uuid(row.try_get("inscription_id").map_err(decode)?),
        token: row.try_get("token").map_err(decode)?,
        value: Money::from_cents(row.try_get("value").map_err(decode)?),
        status: parse_column("status", &status)?,
        expires_at: row.try_get("expires_at").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    }))
}

async fn insert_installments(conn: &mut PgConnection, installments: &[PaymentInstallment]) -> StoreResult<()> {
    for installment in installments {
        sqlx::query(&format!(
            "INSERT INTO payment_installments ({INSTALLMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(installment.id_typed().as_uuid())
        .bind(installment.payment_id().as_uuid())
        .bind(to_int("number", installment.number())?)
        .bind(installment.value().cents())
        .bind(installment.net_value().cents())
        .bind(installment.status().as_str())
        .bind(installment.due_on())
        .bind(installment.paid_at())
        .bind(installment.gateway_reference())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_installment", e))?;
    }
    Ok(())
}

impl PgStore {
    /// Loads payments matching `filter` together with their allocations and installments.
    async fn select_payments(&self, operation: &str, filter: &str, bind: Uuid) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {filter} ORDER BY created_at"
        ))
        .bind(bind)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error(operation, e))?;

        let mut allocations: HashMap<Uuid, Vec<PaymentAllocation>> = HashMap::new();
        for row in sqlx::query(
            "SELECT payment_id, inscription_id, value FROM payment_allocations WHERE payment_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("select_allocations", e))?
        .iter()
        {
            let allocation = allocation_from_row(row)?;
            allocations
                .entry(*allocation.payment_id.as_uuid())
                .or_default()
                .push(allocation);
        }

        let mut installments: HashMap<Uuid, Vec<PaymentInstallment>> = HashMap::new();
        for row in sqlx::query(&format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM payment_installments WHERE payment_id = ANY($1) ORDER BY number"
        ))
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("select_installments", e))?
        .iter()
        {
            let installment = installment_from_row(row)?;
            installments
                .entry(*installment.payment_id().as_uuid())
                .or_default()
                .push(installment);
        }

        rows.iter()
            .zip(ids)
            .map(|(row, id)| {
                payment_from_row(
                    row,
                    allocations.remove(&id).unwrap_or_default(),
                    installments.remove(&id).unwrap_or_default(),
                )
            })
            .collect()
    }
}

#[async_trait]
impl PaymentRepository for PgStore {
    #[instrument(skip(self, payment), fields(payment_id = %payment.id_typed()), err)]
    async fn insert_payment(&self, payment: &Payment) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(payment.id_typed().as_uuid())
        .bind(payment.event_id().as_uuid())
        .bind(payment.account_id().map(|a| *a.as_uuid()))
        .bind(payment.method().as_str())
        .bind(payment.origin().as_str())
        .bind(payment.status().as_str())
        .bind(payment.total_value().cents())
        .bind(payment.receipt_url())
        .bind(payment.rejection_reason())
        .bind(payment.gateway_reference())
        .bind(payment.created_at())
        .bind(payment.reviewed_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_payment", e))?;

        for allocation in payment.allocations() {
            sqlx::query("INSERT INTO payment_allocations (payment_id, inscription_id, value) VALUES ($1, $2, $3)")
                .bind(allocation.payment_id.as_uuid())
                .bind(allocation.inscription_id.as_uuid())
                .bind(allocation.value.cents())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_allocation", e))?;
        }

        insert_installments(&mut tx, payment.installments()).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, payment),
        fields(payment_id = %payment.id_typed(), status = payment.status().as_str()),
        err
    )]
    async fn update_payment(&self, payment: &Payment) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, rejection_reason = $3, gateway_reference = $4, reviewed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(payment.id_typed().as_uuid())
        .bind(payment.status().as_str())
        .bind(payment.rejection_reason())
        .bind(payment.gateway_reference())
        .bind(payment.reviewed_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_payment", e))?;
        expect_rows(result)?;

        // Installments are rewritten wholesale; there are at most a dozen per payment.
        sqlx::query("DELETE FROM payment_installments WHERE payment_id = $1")
            .bind(payment.id_typed().as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_installments", e))?;
        insert_installments(&mut tx, payment.installments()).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> StoreResult<Option<Payment>> {
        Ok(self
            .select_payments("get_payment", "id = $1", *id.as_uuid())
            .await?
            .into_iter()
            .next())
    }

    async fn list_payments_by_event(&self, event_id: EventId) -> StoreResult<Vec<Payment>> {
        self.select_payments("list_payments_by_event", "event_id = $1", *event_id.as_uuid())
            .await
    }

    async fn list_payments_by_inscription(&self, inscription_id: InscriptionId) -> StoreResult<Vec<Payment>> {
        self.select_payments(
            "list_payments_by_inscription",
            "id IN (SELECT payment_id FROM payment_allocations WHERE inscription_id = $1)",
            *inscription_id.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self), fields(payment_id = %id), err)]
    async fn delete_payment(&self, id: PaymentId) -> StoreResult<()> {
        // allocations and installments cascade.
        let result = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_payment", e))?;
        expect_rows(result)
    }

    async fn find_payment_by_installment_reference(&self, reference: &str) -> StoreResult<Option<Payment>> {
        let payment_id: Option<Uuid> =
            sqlx::query("SELECT payment_id FROM payment_installments WHERE gateway_reference = $1")
                .bind(reference)
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_payment_by_installment_reference", e))?
                .map(|row| row.try_get("payment_id"))
                .transpose()
                .map_err(|e| map_sqlx_error("find_payment_by_installment_reference", e))?;
        match payment_id {
            Some(id) => self.get_payment(PaymentId::from_uuid(id)).await,
            None => Ok(None),
        }
    }
}

const LINK_COLUMNS: &str = "id, event_id, inscription_id, token, value, status, expires_at, created_at";

#[async_trait]
impl PaymentLinkRepository for PgStore {
    #[instrument(skip(self, link), fields(link_id = %link.id_typed()), err)]
    async fn insert_link(&self, link: &PaymentLink) -> StoreResult<()> {
        sqlx::query(&format!("INSERT INTO payment_links ({LINK_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"))
            .bind(link.id_typed().as_uuid())
            .bind(link.event_id().as_uuid())
            .bind(link.inscription_id().as_uuid())
            .bind(link.token())
            .bind(link.value().cents())
            .bind(link.status().as_str())
            .bind(link.expires_at())
            .bind(link.created_at())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_link", e))?;
        Ok(())
    }

    #[instrument(skip(self, link), fields(link_id = %link.id_typed()), err)]
    async fn update_link(&self, link: &PaymentLink) -> StoreResult<()> {
        let result = sqlx::query("UPDATE payment_links SET status = $2, expires_at = $3 WHERE id = $1")
            .bind(link.id_typed().as_uuid())
            .bind(link.status().as_str())
            .bind(link.expires_at())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_link", e))?;
        expect_rows(result)
    }

    async fn get_link(&self, id: PaymentLinkId) -> StoreResult<Option<PaymentLink>> {
        sqlx::query(&format!("SELECT {LINK_COLUMNS} FROM payment_links WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_link", e))?
            .as_ref()
            .map(link_from_row)
            .transpose()
    }

    async fn get_link_by_token(&self, token: &str) -> StoreResult<Option<PaymentLink>> {
        sqlx::query(&format!("SELECT {LINK_COLUMNS} FROM payment_links WHERE token = $1"))
            .bind(token)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_link_by_token", e))?
            .as_ref()
            .map(link_from_row)
            .transpose()
    }

    #[instrument(skip(self), fields(inscription_id = %inscription_id), err)]
    async fn delete_links_by_inscription(&self, inscription_id: InscriptionId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM payment_links WHERE inscription_id = $1")
            .bind(inscription_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_links_by_inscription", e))?;
        Ok(result.rows_affected())
    }
}
