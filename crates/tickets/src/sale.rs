use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use regdesk_core::{AccountId, DomainError, DomainResult, Money, define_id, require_text};
use regdesk_events::{EventId, EventTicket, EventTicketId};
use regdesk_payments::PaymentMethod;

define_id!(
    /// Ticket sale identifier.
    TicketSaleId,
    "TicketSaleId"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketSaleStatus {
    Active,
    Cancelled,
}

impl TicketSaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketSaleStatus::Active => "active",
            TicketSaleStatus::Cancelled => "cancelled",
        }
    }
}

impl core::str::FromStr for TicketSaleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TicketSaleStatus::Active),
            "cancelled" => Ok(TicketSaleStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown ticket sale status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicketSale {
    pub buyer_name: String,
    pub quantity: u32,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSaleRecord {
    pub id: TicketSaleId,
    pub event_id: EventId,
    pub ticket_id: EventTicketId,
    pub buyer_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_value: Money,
    pub method: PaymentMethod,
    pub status: TicketSaleStatus,
    pub sold_by: AccountId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSale {
    id: TicketSaleId,
    event_id: EventId,
    ticket_id: EventTicketId,
    buyer_name: String,
    quantity: u32,
    unit_price: Money,
    total_value: Money,
    method: PaymentMethod,
    status: TicketSaleStatus,
    sold_by: AccountId,
    created_at: DateTime<Utc>,
}

impl TicketSale {
    /// Price a sale from the ticket's current price. Stock is reserved by the
    /// caller on the ticket itself.
    pub fn create(
        ticket: &EventTicket,
        input: NewTicketSale,
        sold_by: AccountId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let buyer_name = require_text("buyer name", &input.buyer_name)?;
        if input.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let unit_price = ticket.price();
        let total_value = unit_price.checked_mul(i64::from(input.quantity))?;

        Ok(Self {
            id: TicketSaleId::new(),
            event_id: ticket.event_id(),
            ticket_id: ticket.id_typed(),
            buyer_name,
            quantity: input.quantity,
            unit_price,
            total_value,
            method: input.method,
            status: TicketSaleStatus::Active,
            sold_by,
            created_at: now,
        })
    }

    pub fn with(record: TicketSaleRecord) -> Self {
        Self {
            id: record.id,
            event_id: record.event_id,
            ticket_id: record.ticket_id,
            buyer_name: record.buyer_name,
            quantity: record.quantity,
            unit_price: record.unit_price,
            total_value: record.total_value,
            method: record.method,
            status: record.status,
            sold_by: record.sold_by,
            created_at: record.created_at,
        }
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        if self.status == TicketSaleStatus::Cancelled {
            return Err(DomainError::conflict("ticket sale is already cancelled"));
        }
        self.status = TicketSaleStatus::Cancelled;
        Ok(())
    }

    pub fn id_typed(&self) -> TicketSaleId {
        self.id
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn ticket_id(&self) -> EventTicketId {
        self.ticket_id
    }

    pub fn buyer_name(&self) -> &str {
        &self.buyer_name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn total_value(&self) -> Money {
        self.total_value
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn status(&self) -> TicketSaleStatus {
        self.status
    }

    pub fn sold_by(&self) -> AccountId {
        self.sold_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regdesk_events::NewEventTicket;

    fn ticket() -> EventTicket {
        EventTicket::create(
            EventId::new(),
            NewEventTicket { name: "Pista".to_string(), price: Money::from_cents(3_000), quantity: 10 },
            Utc::now(),
        )
        .unwrap()
    }

    fn input(quantity: u32) -> NewTicketSale {
        NewTicketSale { buyer_name: "Carla".to_string(), quantity, method: PaymentMethod::Cash }
    }

    #[test]
    fn prices_from_ticket() {
        let t = ticket();
        let sale = TicketSale::create(&t, input(3), AccountId::new(), Utc::now()).unwrap();
        assert_eq!(sale.unit_price(), Money::from_cents(3_000));
        assert_eq!(sale.total_value(), Money::from_cents(9_000));
        assert_eq!(sale.event_id(), t.event_id());
    }

    #[test]
    fn rejects_zero_quantity_and_blank_buyer() {
        let t = ticket();
        assert!(TicketSale::create(&t, input(0), AccountId::new(), Utc::now()).is_err());
        let mut blank = input(1);
        blank.buyer_name = " ".to_string();
        assert!(TicketSale::create(&t, blank, AccountId::new(), Utc::now()).is_err());
    }

    #[test]
    fn cancel_once() {
        let mut sale = TicketSale::create(&ticket(), input(1), AccountId::new(), Utc::now()).unwrap();
        sale.cancel().unwrap();
        assert!(matches!(sale.cancel(), Err(DomainError::Conflict(_))));
    }
}
