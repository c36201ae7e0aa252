use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use regdesk_core::{DomainError, DomainResult, Money, define_id, require_text};

use crate::EventId;

define_id!(
    /// Identifier of a ticket kind sold for an event.
    EventTicketId,
    "EventTicketId"
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEventTicket {
    pub name: String,
    pub price: Money,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTicketRecord {
    pub id: EventTicketId,
    pub event_id: EventId,
    pub name: String,
    pub price: Money,
    pub quantity_total: u32,
    pub quantity_available: u32,
    pub created_at: DateTime<Utc>,
}

/// A ticket kind (e.g. meal, day pass) with limited stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTicket {
    id: EventTicketId,
    event_id: EventId,
    name: String,
    price: Money,
    quantity_total: u32,
    quantity_available: u32,
    created_at: DateTime<Utc>,
}

impl EventTicket {
    pub fn create(event_id: EventId, input: NewEventTicket, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = require_text("name", &input.name)?;
        let price = input.price.ensure_positive("price")?;
        if input.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self {
            id: EventTicketId::new(),
            event_id,
            name,
            price,
            quantity_total: input.quantity,
            quantity_available: input.quantity,
            created_at: now,
        })
    }

    pub fn with(record: EventTicketRecord) -> Self {
        Self {
            id: record.id,
            event_id: record.event_id,
            name: record.name,
            price: record.price,
            quantity_total: record.quantity_total,
            quantity_available: record.quantity_available,
            created_at: record.created_at,
        }
    }

    /// Take `quantity` units out of stock.
    pub fn reserve(&mut self, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if quantity > self.quantity_available {
            return Err(DomainError::conflict(format!(
                "only {} ticket(s) available",
                self.quantity_available
            )));
        }
        self.quantity_available -= quantity;
        Ok(())
    }

    /// Return `quantity` units to stock (never above the total).
    pub fn release(&mut self, quantity: u32) {
        self.quantity_available = (self.quantity_available + quantity).min(self.quantity_total);
    }

    pub fn id_typed(&self) -> EventTicketId {
        self.id
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn quantity_total(&self) -> u32 {
        self.quantity_total
    }

    pub fn quantity_available(&self) -> u32 {
        self.quantity_available
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
