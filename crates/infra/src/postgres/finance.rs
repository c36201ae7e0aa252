use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::instrument;
use uuid::Uuid;

use regdesk_core::{AccountId, Money, RegionId};
use regdesk_events::{EventId, EventTicketId};
use regdesk_finance::{
    CashMovement, CashMovementId, CashMovementRecord, CashRegister, CashRegisterId, CashRegisterRecord,
};
use regdesk_tickets::{TicketSale, TicketSaleId, TicketSaleRecord};

use super::{PgStore, expect_rows, from_int, map_sqlx_error, parse_column, to_int};
use crate::store::{CashRegisterRepository, StoreResult, TicketSaleRepository};

const SALE_COLUMNS: &str =
    "id, event_id, ticket_id, buyer_name, quantity, unit_price, total_value, method, status, sold_by, created_at";

fn sale_from_row(row: &PgRow) -> StoreResult<TicketSale> {
    let decode = |e| map_sqlx_error("decode_ticket_sale", e);
    let method: String = row.try_get("method").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(TicketSale::with(TicketSaleRecord {
        id: TicketSaleId::from_uuid(row.try_get("id").map_err(decode)?),
        event_id: EventId::from_uuid(row.try_get("event_id").map_err(decode)?),
        ticket_id: EventTicketId::from_uuid(row.try_get("ticket_id").map_err(decode)?),
        buyer_name: row.try_get("buyer_name").map_err(decode)?,
        quantity: from_int("quantity", row.try_get("quantity").map_err(decode)?)?,
        unit_price: Money::from_cents(row.try_get("unit_price").map_err(decode)?),
        total_value: Money::from_cents(row.try_get("total_value").map_err(decode)?),
        method: parse_column("method", &method)?,
        status: parse_column("status", &status)?,
        sold_by: AccountId::from_uuid(row.try_get("sold_by").map_err(decode)?),
        created_at: row.try_get("created_at").map_err(decode)?,
    }))
}

fn register_from_row(row: &PgRow, event_ids: Vec<EventId>) -> StoreResult<CashRegister> {
    let decode = |e| map_sqlx_error("decode_cash_register", e);
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(CashRegister::with(CashRegisterRecord {
        id: CashRegisterId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        region_id: RegionId::from_uuid(row.try_get("region_id").map_err(decode)?),
        balance: Money::from_cents(row.try_get("balance").map_err(decode)?),
        status: parse_column("status", &status)?,
        event_ids,
        created_at: row.try_get("created_at").map_err(decode)?,
    }))
}

fn movement_from_row(row: &PgRow) -> StoreResult<CashMovement> {
    let decode = |e| map_sqlx_error("decode_cash_movement", e);
    let kind: String = row.try_get("kind").map_err(decode)?;
    let origin: String = row.try_get("origin").map_err(decode)?;
    Ok(CashMovement::with(CashMovementRecord {
        id: CashMovementId::from_uuid(row.try_get("id").map_err(decode)?),
        cash_register_id: CashRegisterId::from_uuid(row.try_get("cash_register_id").map_err(decode)?),
        kind: parse_column("kind", &kind)?,
        origin: parse_column("origin", &origin)?,
        value: Money::from_cents(row.try_get("value").map_err(decode)?),
        description: row.try_get("description").map_err(decode)?,
        reference_id: row.try_get("reference_id").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    }))
}

#[async_trait]
impl TicketSaleRepository for PgStore {
    #[instrument(skip(self, sale), fields(sale_id = %sale.id_typed(), quantity = sale.quantity()), err)]
    async fn insert_sale(&self, sale: &TicketSale) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO ticket_sales ({SALE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(sale.id_typed().as_uuid())
        .bind(sale.event_id().as_uuid())
        .bind(sale.ticket_id().as_uuid())
        .bind(sale.buyer_name())
        .bind(to_int("quantity", sale.quantity())?)
        .bind(sale.unit_price().cents())
        .bind(sale.total_value().cents())
        .bind(sale.method().as_str())
        .bind(sale.status().as_str())
        .bind(sale.sold_by().as_uuid())
        .bind(sale.created_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_sale", e))?;
        Ok(())
    }

    #[instrument(skip(self, sale), fields(sale_id = %sale.id_typed()), err)]
    async fn update_sale(&self, sale: &TicketSale) -> StoreResult<()> {
        let result = sqlx::query("UPDATE ticket_sales SET status = $2 WHERE id = $1")
            .bind(sale.id_typed().as_uuid())
            .bind(sale.status().as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_sale", e))?;
        expect_rows(result)
    }

    async fn get_sale(&self, id: TicketSaleId) -> StoreResult<Option<TicketSale>> {
        sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM ticket_sales WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_sale", e))?
            .as_ref()
            .map(sale_from_row)
            .transpose()
    }

    async fn list_sales_by_event(&self, event_id: EventId) -> StoreResult<Vec<TicketSale>> {
        sqlx::query(&format!(
            "SELECT {SALE_COLUMNS} FROM ticket_sales WHERE event_id = $1 ORDER BY created_at"
        ))
        .bind(event_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_sales_by_event", e))?
        .iter()
        .map(sale_from_row)
        .collect()
    }
}

impl PgStore {
    async fn select_registers(
        &self,
        operation: &str,
        filter: &str,
        bind: Option<Uuid>,
    ) -> StoreResult<Vec<CashRegister>> {
        let rows = sqlx::query(&format!(
            "SELECT id, name, region_id, balance, status, created_at FROM cash_registers WHERE {filter} ORDER BY name"
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

        let mut allocations: HashMap<Uuid, Vec<EventId>> = HashMap::new();
        for row in sqlx::query(
            "SELECT cash_register_id, event_id FROM cash_register_events WHERE cash_register_id = ANY($1) ORDER BY event_id",
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("select_register_events", e))?
        .iter()
        {
            let register: Uuid = row
                .try_get("cash_register_id")
                .map_err(|e| map_sqlx_error("decode_register_event", e))?;
            let event: Uuid = row
                .try_get("event_id")
                .map_err(|e| map_sqlx_error("decode_register_event", e))?;
            allocations
                .entry(register)
                .or_default()
                .push(EventId::from_uuid(event));
        }

        rows.iter()
            .zip(ids)
            .map(|(row, id)| register_from_row(row, allocations.remove(&id).unwrap_or_default()))
            .collect()
    }
}

#[async_trait]
impl CashRegisterRepository for PgStore {
    #[instrument(skip(self, register), fields(register_id = %register.id_typed()), err)]
    async fn insert_register(&self, register: &CashRegister) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query(
            "INSERT INTO cash_registers (id, name, region_id, balance, status, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(register.id_typed().as_uuid())
        .bind(register.name())
        .bind(register.region_id().as_uuid())
        .bind(register.balance().cents())
        .bind(register.status().as_str())
        .bind(register.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_register", e))?;
        for event_id in register.event_ids() {
            sqlx::query("INSERT INTO cash_register_events (cash_register_id, event_id) VALUES ($1, $2)")
                .bind(register.id_typed().as_uuid())
                .bind(event_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_register_event", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, register), fields(register_id = %register.id_typed()), err)]
    async fn save_register(&self, register: &CashRegister) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let result = sqlx::query("UPDATE cash_registers SET name = $2, status = $3 WHERE id = $1")
            .bind(register.id_typed().as_uuid())
            .bind(register.name())
            .bind(register.status().as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("save_register", e))?;
        expect_rows(result)?;

        sqlx::query("DELETE FROM cash_register_events WHERE cash_register_id = $1")
            .bind(register.id_typed().as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_register_events", e))?;
        for event_id in register.event_ids() {
            // event_id is UNIQUE, so an event held by another register surfaces as Conflict.
            sqlx::query("INSERT INTO cash_register_events (cash_register_id, event_id) VALUES ($1, $2)")
                .bind(register.id_typed().as_uuid())
                .bind(event_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_register_event", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn get_register(&self, id: CashRegisterId) -> StoreResult<Option<CashRegister>> {
        Ok(self
            .select_registers("get_register", "id = $1", Some(*id.as_uuid()))
            .await?
            .into_iter()
            .next())
    }

    async fn list_registers(&self, region: Option<RegionId>) -> StoreResult<Vec<CashRegister>> {
        self.select_registers(
            "list_registers",
            "($1::uuid IS NULL OR region_id = $1)",
            region.map(|r| *r.as_uuid()),
        )
        .await
    }

    async fn find_register_by_event(&self, event_id: EventId) -> StoreResult<Option<CashRegister>> {
        Ok(self
            .select_registers(
                "find_register_by_event",
                "id IN (SELECT cash_register_id FROM cash_register_events WHERE event_id = $1)",
                Some(*event_id.as_uuid()),
            )
            .await?
            .into_iter()
            .next())
    }

    #[instrument(skip(self, registers, movements), fields(movements = movements.len()), err)]
    async fn record_movements(&self, registers: &[CashRegister], movements: &[CashMovement]) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for register in registers {
            let result = sqlx::query("UPDATE cash_registers SET balance = $2 WHERE id = $1")
                .bind(register.id_typed().as_uuid())
                .bind(register.balance().cents())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_balance", e))?;
            expect_rows(result)?;
        }

        for movement in movements {
            sqlx::query(
                r#"
                INSERT INTO cash_movements (id, cash_register_id, kind, origin, value, description, reference_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(movement.id_typed().as_uuid())
            .bind(movement.cash_register_id().as_uuid())
            .bind(movement.kind().as_str())
            .bind(movement.origin().as_str())
            .bind(movement.value().cents())
            .bind(movement.description())
            .bind(movement.reference_id())
            .bind(movement.created_at())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_movement", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn list_movements(&self, register_id: CashRegisterId) -> StoreResult<Vec<CashMovement>> {
        sqlx::query(
            r#"
            SELECT id, cash_register_id, kind, origin, value, description, reference_id, created_at
            FROM cash_movements
            WHERE cash_register_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(register_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?
        .iter()
        .map(movement_from_row)
        .collect()
    }
}
