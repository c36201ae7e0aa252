use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use regdesk_core::{DomainError, DomainResult, Money, RegionId, define_id, require_text};
use regdesk_events::EventId;

use crate::movement::{CashMovement, MovementKind, NewCashMovement};

define_id!(
    /// Cash register identifier.
    CashRegisterId,
    "CashRegisterId"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashRegisterStatus {
    Open,
    Closed,
}

impl CashRegisterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashRegisterStatus::Open => "open",
            CashRegisterStatus::Closed => "closed",
        }
    }
}

impl core::str::FromStr for CashRegisterStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(CashRegisterStatus::Open),
            "closed" => Ok(CashRegisterStatus::Closed),
            other => Err(DomainError::validation(format!("unknown cash register status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashRegisterRecord {
    pub id: CashRegisterId,
    pub name: String,
    pub region_id: RegionId,
    pub balance: Money,
    pub status: CashRegisterStatus,
    pub event_ids: Vec<EventId>,
    pub created_at: DateTime<Utc>,
}

/// Per-region cash ledger. Events allocated to a register have their income
/// (payments, ticket sales) recorded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashRegister {
    id: CashRegisterId,
    name: String,
    region_id: RegionId,
    balance: Money,
    status: CashRegisterStatus,
    event_ids: Vec<EventId>,
    created_at: DateTime<Utc>,
}

impl CashRegister {
    pub fn create(name: &str, region_id: RegionId, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: CashRegisterId::new(),
            name: require_text("cash register name", name)?,
            region_id,
            balance: Money::zero(),
            status: CashRegisterStatus::Open,
            event_ids: Vec::new(),
            created_at: now,
        })
    }

    pub fn with(record: CashRegisterRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            region_id: record.region_id,
            balance: record.balance,
            status: record.status,
            event_ids: record.event_ids,
            created_at: record.created_at,
        }
    }

    /// Record a movement and update the balance.
    pub fn apply(&mut self, input: NewCashMovement, now: DateTime<Utc>) -> DomainResult<CashMovement> {
        self.ensure_open()?;
        let movement = CashMovement::create(self.id, input, now)?;
        let balance = match movement.kind() {
            MovementKind::Income => self.balance.checked_add(movement.value())?,
            MovementKind::Expense => {
                if movement.value() > self.balance {
                    return Err(DomainError::invariant(format!(
                        "insufficient balance: {} available, {} requested",
                        self.balance,
                        movement.value()
                    )));
                }
                self.balance.checked_sub(movement.value())?
            }
        };
        self.balance = balance;
        Ok(movement)
    }

    pub fn allocate_event(&mut self, event_id: EventId) -> DomainResult<()> {
        self.ensure_open()?;
        if self.event_ids.contains(&event_id) {
            return Err(DomainError::conflict("event is already allocated to this cash register"));
        }
        self.event_ids.push(event_id);
        Ok(())
    }

    pub fn deallocate_event(&mut self, event_id: EventId) -> DomainResult<()> {
        let before = self.event_ids.len();
        self.event_ids.retain(|id| *id != event_id);
        if self.event_ids.len() == before {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    pub fn holds_event(&self, event_id: EventId) -> bool {
        self.event_ids.contains(&event_id)
    }

    pub fn close(&mut self) -> DomainResult<()> {
        if self.status == CashRegisterStatus::Closed {
            return Err(DomainError::conflict("cash register is already closed"));
        }
        self.status = CashRegisterStatus::Closed;
        Ok(())
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.status == CashRegisterStatus::Closed {
            return Err(DomainError::invariant("cash register is closed"));
        }
        Ok(())
    }

    pub fn id_typed(&self) -> CashRegisterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region_id(&self) -> RegionId {
        self.region_id
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn status(&self) -> CashRegisterStatus {
        self.status
    }

    pub fn event_ids(&self) -> &[EventId] {
        &self.event_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
