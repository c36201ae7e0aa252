//! Repository gateways.
//!
//! Each area gets its own trait so use cases depend only on what they touch.
//! Two backends implement every trait: [`InMemoryStore`] (dev/tests) and
//! [`PgStore`](crate::postgres::PgStore).

mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use regdesk_accounts::{Account, AccountParticipant, AccountParticipantId, Region};
use regdesk_core::{AccountId, RegionId};
use regdesk_events::{Event, EventId, EventTicket, EventTicketId, TypeInscription, TypeInscriptionId};
use regdesk_finance::{CashMovement, CashRegister, CashRegisterId};
use regdesk_inscriptions::{Inscription, InscriptionId, Participant};
use regdesk_payments::{Payment, PaymentId, PaymentLink, PaymentLinkId};
use regdesk_tickets::{TicketSale, TicketSaleId};

pub use memory::InMemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored data could not be decoded: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait RegionRepository: Send + Sync {
    async fn insert_region(&self, region: &Region) -> StoreResult<()>;
    async fn get_region(&self, id: RegionId) -> StoreResult<Option<Region>>;
    async fn list_regions(&self) -> StoreResult<Vec<Region>>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the username is taken.
    async fn insert_account(&self, account: &Account) -> StoreResult<()>;
    async fn update_account(&self, account: &Account) -> StoreResult<()>;
    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>>;
    async fn list_accounts(&self, region: Option<RegionId>) -> StoreResult<Vec<Account>>;
}

#[async_trait]
pub trait AccountParticipantRepository: Send + Sync {
    async fn insert_account_participant(&self, participant: &AccountParticipant) -> StoreResult<()>;
    async fn update_account_participant(&self, participant: &AccountParticipant) -> StoreResult<()>;
    async fn get_account_participant(&self, id: AccountParticipantId) -> StoreResult<Option<AccountParticipant>>;
    async fn list_account_participants(&self, account_id: AccountId) -> StoreResult<Vec<AccountParticipant>>;
    async fn delete_account_participant(&self, id: AccountParticipantId) -> StoreResult<()>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert_event(&self, event: &Event) -> StoreResult<()>;
    async fn update_event(&self, event: &Event) -> StoreResult<()>;
    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>>;
    /// Events ordered by start date; `None` lists every region.
    async fn list_events(&self, region: Option<RegionId>) -> StoreResult<Vec<Event>>;
    /// Removes the event together with its inscription types and tickets.
    async fn delete_event(&self, id: EventId) -> StoreResult<()>;
}

#[async_trait]
pub trait TypeInscriptionRepository: Send + Sync {
    async fn insert_type(&self, kind: &TypeInscription) -> StoreResult<()>;
    async fn get_type(&self, id: TypeInscriptionId) -> StoreResult<Option<TypeInscription>>;
    async fn list_types(&self, event_id: EventId) -> StoreResult<Vec<TypeInscription>>;
    async fn delete_type(&self, id: TypeInscriptionId) -> StoreResult<()>;
}

#[async_trait]
pub trait EventTicketRepository: Send + Sync {
    async fn insert_ticket(&self, ticket: &EventTicket) -> StoreResult<()>;
    async fn update_ticket(&self, ticket: &EventTicket) -> StoreResult<()>;
    async fn get_ticket(&self, id: EventTicketId) -> StoreResult<Option<EventTicket>>;
    async fn list_tickets(&self, event_id: EventId) -> StoreResult<Vec<EventTicket>>;
}

#[async_trait]
pub trait InscriptionRepository: Send + Sync {
    async fn insert_inscription(&self, inscription: &Inscription, participants: &[Participant]) -> StoreResult<()>;
    async fn update_inscription(&self, inscription: &Inscription) -> StoreResult<()>;
    async fn get_inscription(&self, id: InscriptionId) -> StoreResult<Option<Inscription>>;
    async fn list_participants(&self, inscription_id: InscriptionId) -> StoreResult<Vec<Participant>>;
    async fn list_inscriptions_by_event(&self, event_id: EventId) -> StoreResult<Vec<Inscription>>;
    async fn list_inscriptions_by_account(&self, account_id: AccountId) -> StoreResult<Vec<Inscription>>;
    /// Removes the inscription and its participants.
    async fn delete_inscription(&self, id: InscriptionId) -> StoreResult<()>;
    async fn count_inscriptions_by_event(&self, event_id: EventId) -> StoreResult<u64>;
    /// Pending inscriptions whose `expires_at` is before `now`.
    async fn list_expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Inscription>>;
    /// Unpaid guest inscriptions whose `expires_at` is before `now`.
    async fn list_expired_guests(&self, now: DateTime<Utc>) -> StoreResult<Vec<Inscription>>;
    /// Whether any participant references the inscription type.
    async fn type_in_use(&self, type_id: TypeInscriptionId) -> StoreResult<bool>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Persists the payment with its allocations and installments.
    async fn insert_payment(&self, payment: &Payment) -> StoreResult<()>;
    /// Updates status fields and installments.
    async fn update_payment(&self, payment: &Payment) -> StoreResult<()>;
    async fn get_payment(&self, id: PaymentId) -> StoreResult<Option<Payment>>;
    async fn list_payments_by_event(&self, event_id: EventId) -> StoreResult<Vec<Payment>>;
    async fn list_payments_by_inscription(&self, inscription_id: InscriptionId) -> StoreResult<Vec<Payment>>;
    async fn delete_payment(&self, id: PaymentId) -> StoreResult<()>;
    async fn find_payment_by_installment_reference(&self, reference: &str) -> StoreResult<Option<Payment>>;
}

#[async_trait]
pub trait PaymentLinkRepository: Send + Sync {
    async fn insert_link(&self, link: &PaymentLink) -> StoreResult<()>;
    async fn update_link(&self, link: &PaymentLink) -> StoreResult<()>;
    async fn get_link(&self, id: PaymentLinkId) -> StoreResult<Option<PaymentLink>>;
    async fn get_link_by_token(&self, token: &str) -> StoreResult<Option<PaymentLink>>;
    async fn delete_links_by_inscription(&self, inscription_id: InscriptionId) -> StoreResult<u64>;
}

#[async_trait]
pub trait TicketSaleRepository: Send + Sync {
    async fn insert_sale(&self, sale: &TicketSale) -> StoreResult<()>;
    async fn update_sale(&self, sale: &TicketSale) -> StoreResult<()>;
    async fn get_sale(&self, id: TicketSaleId) -> StoreResult<Option<TicketSale>>;
    async fn list_sales_by_event(&self, event_id: EventId) -> StoreResult<Vec<TicketSale>>;
}

#[async_trait]
pub trait CashRegisterRepository: Send + Sync {
    async fn insert_register(&self, register: &CashRegister) -> StoreResult<()>;
    /// Persists name, status and event allocations (not the balance).
    async fn save_register(&self, register: &CashRegister) -> StoreResult<()>;
    async fn get_register(&self, id: CashRegisterId) -> StoreResult<Option<CashRegister>>;
    async fn list_registers(&self, region: Option<RegionId>) -> StoreResult<Vec<CashRegister>>;
    async fn find_register_by_event(&self, event_id: EventId) -> StoreResult<Option<CashRegister>>;
    /// Atomically stores new balances and the movements that produced them.
    async fn record_movements(&self, registers: &[CashRegister], movements: &[CashMovement]) -> StoreResult<()>;
    /// Movements in chronological order.
    async fn list_movements(&self, register_id: CashRegisterId) -> StoreResult<Vec<CashMovement>>;
}

/// Every repository in one backend.
pub trait StoreBackend:
    RegionRepository
    + AccountRepository
    + AccountParticipantRepository
    + EventRepository
    + TypeInscriptionRepository
    + EventTicketRepository
    + InscriptionRepository
    + PaymentRepository
    + PaymentLinkRepository
    + TicketSaleRepository
    + CashRegisterRepository
{
}

impl<T> StoreBackend for T where
    T: RegionRepository
        + AccountRepository
        + AccountParticipantRepository
        + EventRepository
        + TypeInscriptionRepository
        + EventTicketRepository
        + InscriptionRepository
        + PaymentRepository
        + PaymentLinkRepository
        + TicketSaleRepository
        + CashRegisterRepository
{
}

/// Repository handles shared by use cases.
#[derive(Clone)]
pub struct Stores {
    pub regions: Arc<dyn RegionRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub account_participants: Arc<dyn AccountParticipantRepository>,
    pub events: Arc<dyn EventRepository>,
    pub types: Arc<dyn TypeInscriptionRepository>,
    pub tickets: Arc<dyn EventTicketRepository>,
    pub inscriptions: Arc<dyn InscriptionRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub links: Arc<dyn PaymentLinkRepository>,
    pub sales: Arc<dyn TicketSaleRepository>,
    pub registers: Arc<dyn CashRegisterRepository>,
}

impl Stores {
    pub fn from_backend<B: StoreBackend + 'static>(backend: Arc<B>) -> Self {
        Self {
            regions: backend.clone(),
            accounts: backend.clone(),
            account_participants: backend.clone(),
            events: backend.clone(),
            types: backend.clone(),
            tickets: backend.clone(),
            inscriptions: backend.clone(),
            payments: backend.clone(),
            links: backend.clone(),
            sales: backend.clone(),
            registers: backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(InMemoryStore::new()))
    }
}
