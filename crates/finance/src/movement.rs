use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use regdesk_core::{DomainError, DomainResult, Money, define_id, require_text};

use crate::register::CashRegisterId;

define_id!(
    /// Cash movement identifier.
    CashMovementId,
    "CashMovementId"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Income,
    Expense,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Income => "income",
            MovementKind::Expense => "expense",
        }
    }
}

impl core::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(MovementKind::Income),
            "expense" => Ok(MovementKind::Expense),
            other => Err(DomainError::validation(format!("unknown movement kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementOrigin {
    InscriptionPayment,
    TicketSale,
    Manual,
    Transfer,
    Reversal,
}

impl MovementOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementOrigin::InscriptionPayment => "inscription_payment",
            MovementOrigin::TicketSale => "ticket_sale",
            MovementOrigin::Manual => "manual",
            MovementOrigin::Transfer => "transfer",
            MovementOrigin::Reversal => "reversal",
        }
    }
}

impl core::str::FromStr for MovementOrigin {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inscription_payment" => Ok(MovementOrigin::InscriptionPayment),
            "ticket_sale" => Ok(MovementOrigin::TicketSale),
            "manual" => Ok(MovementOrigin::Manual),
            "transfer" => Ok(MovementOrigin::Transfer),
            "reversal" => Ok(MovementOrigin::Reversal),
            other => Err(DomainError::validation(format!("unknown movement origin '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCashMovement {
    pub kind: MovementKind,
    pub origin: MovementOrigin,
    pub value: Money,
    pub description: String,
    /// Payment, ticket sale or counterpart register this movement came from.
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashMovementRecord {
    pub id: CashMovementId,
    pub cash_register_id: CashRegisterId,
    pub kind: MovementKind,
    pub origin: MovementOrigin,
    pub value: Money,
    pub description: String,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Immutable entry in a register's statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashMovement {
    id: CashMovementId,
    cash_register_id: CashRegisterId,
    kind: MovementKind,
    origin: MovementOrigin,
    value: Money,
    description: String,
    reference_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl CashMovement {
    pub(crate) fn create(
        cash_register_id: CashRegisterId,
        input: NewCashMovement,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let value = input.value.ensure_positive("movement value")?;
        let description = require_text("movement description", &input.description)?;
        Ok(Self {
            id: CashMovementId::new(),
            cash_register_id,
            kind: input.kind,
            origin: input.origin,
            value,
            description,
            reference_id: input.reference_id,
            created_at: now,
        })
    }

    pub fn with(record: CashMovementRecord) -> Self {
        Self {
            id: record.id,
            cash_register_id: record.cash_register_id,
            kind: record.kind,
            origin: record.origin,
            value: record.value,
            description: record.description,
            reference_id: record.reference_id,
            created_at: record.created_at,
        }
    }

    /// Signed effect on the balance.
    pub fn signed_value(&self) -> Money {
        match self.kind {
            MovementKind::Income => self.value,
            MovementKind::Expense => -self.value,
        }
    }

    pub fn id_typed(&self) -> CashMovementId {
        self.id
    }

    pub fn cash_register_id(&self) -> CashRegisterId {
        self.cash_register_id
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn origin(&self) -> MovementOrigin {
        self.origin
    }

    pub fn value(&self) -> Money {
        self.value
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn reference_id(&self) -> Option<Uuid> {
        self.reference_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
