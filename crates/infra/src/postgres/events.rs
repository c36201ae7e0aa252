use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::instrument;

use regdesk_core::{Money, RegionId};
use regdesk_events::{
    Event, EventId, EventRecord, EventTicket, EventTicketId, EventTicketRecord, TypeInscription, TypeInscriptionId,
};

use super::{PgStore, expect_rows, from_int, map_sqlx_error, parse_column, to_int};
use crate::store::{EventRepository, EventTicketRepository, StoreResult, TypeInscriptionRepository};

const EVENT_COLUMNS: &str = "id, region_id, name, description, location, starts_on, ends_on, status, \
    payment_enabled, ticket_enabled, max_participants, participants_count, amount_collected, created_at";

fn event_from_row(row: &PgRow) -> StoreResult<Event> {
    let decode = |e| map_sqlx_error("decode_event", e);
    let status: String = row.try_get("status").map_err(decode)?;
    let max_participants: Option<i32> = row.try_get("max_participants").map_err(decode)?;
    Ok(Event::with(EventRecord {
        id: EventId::from_uuid(row.try_get("id").map_err(decode)?),
        region_id: RegionId::from_uuid(row.try_get("region_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        location: row.try_get("location").map_err(decode)?,
        starts_on: row.try_get("starts_on").map_err(decode)?,
        ends_on: row.try_get("ends_on").map_err(decode)?,
        status: parse_column("status", &status)?,
        payment_enabled: row.try_get("payment_enabled").map_err(decode)?,
        ticket_enabled: row.try_get("ticket_enabled").map_err(decode)?,
        max_participants: max_participants
            .map(|v| from_int("max_participants", v))
            .transpose()?,
        participants_count: from_int("participants_count", row.try_get("participants_count").map_err(decode)?)?,
        amount_collected: Money::from_cents(row.try_get("amount_collected").map_err(decode)?),
        created_at: row.try_get("created_at").map_err(decode)?,
    }))
}

fn type_from_row(row: &PgRow) -> StoreResult<TypeInscription> {
    let decode = |e| map_sqlx_error("decode_type_inscription", e);
    Ok(TypeInscription::with(
        TypeInscriptionId::from_uuid(row.try_get("id").map_err(decode)?),
        EventId::from_uuid(row.try_get("event_id").map_err(decode)?),
        row.try_get("description").map_err(decode)?,
        Money::from_cents(row.try_get("value").map_err(decode)?),
    ))
}

fn ticket_from_row(row: &PgRow) -> StoreResult<EventTicket> {
    let decode = |e| map_sqlx_error("decode_event_ticket", e);
    Ok(EventTicket::with(EventTicketRecord {
        id: EventTicketId::from_uuid(row.try_get("id").map_err(decode)?),
        event_id: EventId::from_uuid(row.try_get("event_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        price: Money::from_cents(row.try_get("price").map_err(decode)?),
        quantity_total: from_int("quantity_total", row.try_get("quantity_total").map_err(decode)?)?,
        quantity_available: from_int("quantity_available", row.try_get("quantity_available").map_err(decode)?)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    }))
}

#[async_trait]
impl EventRepository for PgStore {
    #[instrument(skip(self, event), fields(event_id = %event.id_typed()), err)]
    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO events ({EVENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(event.id_typed().as_uuid())
        .bind(event.region_id().as_uuid())
        .bind(event.name())
        .bind(event.description())
        .bind(event.location())
        .bind(event.starts_on())
        .bind(event.ends_on())
        .bind(event.status().as_str())
        .bind(event.payment_enabled())
        .bind(event.ticket_enabled())
        .bind(event.max_participants().map(|v| to_int("max_participants", v)).transpose()?)
        .bind(to_int("participants_count", event.participants_count())?)
        .bind(event.amount_collected().cents())
        .bind(event.created_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_event", e))?;
        Ok(())
    }

    #[instrument(skip(self, event), fields(event_id = %event.id_typed()), err)]
    async fn update_event(&self, event: &Event) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET name = $2, description = $3, location = $4, starts_on = $5, ends_on = $6, status = $7,
                payment_enabled = $8, ticket_enabled = $9, max_participants = $10,
                participants_count = $11, amount_collected = $12
            WHERE id = $1
            "#,
        )
        .bind(event.id_typed().as_uuid())
        .bind(event.name())
        .bind(event.description())
        .bind(event.location())
        .bind(event.starts_on())
        .bind(event.ends_on())
        .bind(event.status().as_str())
        .bind(event.payment_enabled())
        .bind(event.ticket_enabled())
        .bind(event.max_participants().map(|v| to_int("max_participants", v)).transpose()?)
        .bind(to_int("participants_count", event.participants_count())?)
        .bind(event.amount_collected().cents())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_event", e))?;
        expect_rows(result)
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_event", e))?
            .as_ref()
            .map(event_from_row)
            .transpose()
    }

    async fn list_events(&self, region: Option<RegionId>) -> StoreResult<Vec<Event>> {
        sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE ($1::uuid IS NULL OR region_id = $1) ORDER BY starts_on, name"
        ))
        .bind(region.map(|r| *r.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_events", e))?
        .iter()
        .map(event_from_row)
        .collect()
    }

    #[instrument(skip(self), fields(event_id = %id), err)]
    async fn delete_event(&self, id: EventId) -> StoreResult<()> {
        // type_inscriptions and event_tickets cascade.
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_event", e))?;
        expect_rows(result)
    }
}

#[async_trait]
impl TypeInscriptionRepository for PgStore {
    #[instrument(skip(self, kind), fields(type_id = %kind.id_typed()), err)]
    async fn insert_type(&self, kind: &TypeInscription) -> StoreResult<()> {
        sqlx::query("INSERT INTO type_inscriptions (id, event_id, description, value) VALUES ($1, $2, $3, $4)")
            .bind(kind.id_typed().as_uuid())
            .bind(kind.event_id().as_uuid())
            .bind(kind.description())
            .bind(kind.value().cents())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_type", e))?;
        Ok(())
    }

    async fn get_type(&self, id: TypeInscriptionId) -> StoreResult<Option<TypeInscription>> {
        sqlx::query("SELECT id, event_id, description, value FROM type_inscriptions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_type", e))?
            .as_ref()
            .map(type_from_row)
            .transpose()
    }

    async fn list_types(&self, event_id: EventId) -> StoreResult<Vec<TypeInscription>> {
        sqlx::query(
            "SELECT id, event_id, description, value FROM type_inscriptions WHERE event_id = $1 ORDER BY description",
        )
        .bind(event_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_types", e))?
        .iter()
        .map(type_from_row)
        .collect()
    }

    #[instrument(skip(self), fields(type_id = %id), err)]
    async fn delete_type(&self, id: TypeInscriptionId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM type_inscriptions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_type", e))?;
        expect_rows(result)
    }
}

const TICKET_COLUMNS: &str = "id, event_id, name, price, quantity_total, quantity_available, created_at";

#[async_trait]
impl EventTicketRepository for PgStore {
    #[instrument(skip(self, ticket), fields(ticket_id = %ticket.id_typed()), err)]
    async fn insert_ticket(&self, ticket: &EventTicket) -> StoreResult<()> {
        sqlx::query(&format!("INSERT INTO event_tickets ({TICKET_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"))
            .bind(ticket.id_typed().as_uuid())
            .bind(ticket.event_id().as_uuid())
            .bind(ticket.name())
            .bind(ticket.price().cents())
            .bind(to_int("quantity_total", ticket.quantity_total())?)
            .bind(to_int("quantity_available", ticket.quantity_available())?)
            .bind(ticket.created_at())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_ticket", e))?;
        Ok(())
    }

    #[instrument(skip(self, ticket), fields(ticket_id = %ticket.id_typed()), err)]
    async fn update_ticket(&self, ticket: &EventTicket) -> StoreResult<()> {
        let result = sqlx::query("UPDATE event_tickets SET name = $2, price = $3, quantity_available = $4 WHERE id = $1")
            .bind(ticket.id_typed().as_uuid())
            .bind(ticket.name())
            .bind(ticket.price().cents())
            .bind(to_int("quantity_available", ticket.quantity_available())?)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_ticket", e))?;
        expect_rows(result)
    }

    async fn get_ticket(&self, id: EventTicketId) -> StoreResult<Option<EventTicket>> {
        sqlx::query(&format!("SELECT {TICKET_COLUMNS} FROM event_tickets WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_ticket", e))?
            .as_ref()
            .map(ticket_from_row)
            .transpose()
    }

    async fn list_tickets(&self, event_id: EventId) -> StoreResult<Vec<EventTicket>> {
        sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM event_tickets WHERE event_id = $1 ORDER BY created_at"
        ))
        .bind(event_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_tickets", e))?
        .iter()
        .map(ticket_from_row)
        .collect()
    }
}
