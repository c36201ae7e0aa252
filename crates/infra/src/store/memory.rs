use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use regdesk_accounts::{Account, AccountParticipant, AccountParticipantId, Region};
use regdesk_core::{AccountId, RegionId};
use regdesk_events::{Event, EventId, EventTicket, EventTicketId, TypeInscription, TypeInscriptionId};
use regdesk_finance::{CashMovement, CashRegister, CashRegisterId, CashRegisterRecord};
use regdesk_inscriptions::{Inscription, InscriptionId, InscriptionStatus, Participant};
use regdesk_payments::{Payment, PaymentId, PaymentLink, PaymentLinkId};
use regdesk_tickets::{TicketSale, TicketSaleId};

use super::{
    AccountParticipantRepository, AccountRepository, CashRegisterRepository, EventRepository, EventTicketRepository,
    InscriptionRepository, PaymentLinkRepository, PaymentRepository, RegionRepository, StoreError, StoreResult,
    TicketSaleRepository, TypeInscriptionRepository,
};

struct Table<K, V> {
    rows: RwLock<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> Table<K, V> {
    fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<K, V>>> {
        self.rows
            .read()
            .map_err(|_| StoreError::Backend("in-memory table lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<K, V>>> {
        self.rows
            .write()
            .map_err(|_| StoreError::Backend("in-memory table lock poisoned".to_string()))
    }

    fn insert(&self, key: K, value: V) -> StoreResult<()> {
        let mut rows = self.write()?;
        if rows.contains_key(&key) {
            return Err(StoreError::Conflict("record already exists".to_string()));
        }
        rows.insert(key, value);
        Ok(())
    }

    fn update(&self, key: K, value: V) -> StoreResult<()> {
        let mut rows = self.write()?;
        match rows.get_mut(&key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn get(&self, key: &K) -> StoreResult<Option<V>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn remove(&self, key: &K) -> StoreResult<()> {
        self.write()?.remove(key).map(|_| ()).ok_or(StoreError::NotFound)
    }

    fn filter(&self, predicate: impl Fn(&V) -> bool) -> StoreResult<Vec<V>> {
        Ok(self.read()?.values().filter(|v| predicate(v)).cloned().collect())
    }
}

/// In-memory backend for every repository (tests/dev).
///
/// Each table is guarded by its own lock, so multi-table writes are not atomic.
pub struct InMemoryStore {
    regions: Table<RegionId, Region>,
    accounts: Table<AccountId, Account>,
    account_participants: Table<AccountParticipantId, AccountParticipant>,
    events: Table<EventId, Event>,
    types: Table<TypeInscriptionId, TypeInscription>,
    tickets: Table<EventTicketId, EventTicket>,
    inscriptions: Table<InscriptionId, Inscription>,
    participants: Table<InscriptionId, Vec<Participant>>,
    payments: Table<PaymentId, Payment>,
    links: Table<PaymentLinkId, PaymentLink>,
    sales: Table<TicketSaleId, TicketSale>,
    registers: Table<CashRegisterId, CashRegister>,
    movements: Table<CashRegisterId, Vec<CashMovement>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            regions: Table::new(),
            accounts: Table::new(),
            account_participants: Table::new(),
            events: Table::new(),
            types: Table::new(),
            tickets: Table::new(),
            inscriptions: Table::new(),
            participants: Table::new(),
            payments: Table::new(),
            links: Table::new(),
            sales: Table::new(),
            registers: Table::new(),
            movements: Table::new(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|r| key(r));
    rows
}

#[async_trait]
impl RegionRepository for InMemoryStore {
    async fn insert_region(&self, region: &Region) -> StoreResult<()> {
        self.regions.insert(region.id_typed(), region.clone())
    }

    async fn get_region(&self, id: RegionId) -> StoreResult<Option<Region>> {
        self.regions.get(&id)
    }

    async fn list_regions(&self) -> StoreResult<Vec<Region>> {
        Ok(sorted_by(self.regions.filter(|_| true)?, |r| r.name().to_string()))
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut rows = self.accounts.write()?;
        if rows.values().any(|a| a.username() == account.username()) {
            return Err(StoreError::Conflict(format!("username '{}' is taken", account.username())));
        }
        rows.insert(account.id_typed(), account.clone());
        Ok(())
    }

    async fn update_account(&self, account: &Account) -> StoreResult<()> {
        self.accounts.update(account.id_typed(), account.clone())
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        self.accounts.get(&id)
    }

    async fn list_accounts(&self, region: Option<RegionId>) -> StoreResult<Vec<Account>> {
        let rows = self
            .accounts
            .filter(|a| region.is_none_or(|r| a.region_id() == Some(r)))?;
        Ok(sorted_by(rows, |a| a.username().to_string()))
    }
}

#[async_trait]
impl AccountParticipantRepository for InMemoryStore {
    async fn insert_account_participant(&self, participant: &AccountParticipant) -> StoreResult<()> {
        self.account_participants
            .insert(participant.id_typed(), participant.clone())
    }

    async fn update_account_participant(&self, participant: &AccountParticipant) -> StoreResult<()> {
        self.account_participants
            .update(participant.id_typed(), participant.clone())
    }

    async fn get_account_participant(&self, id: AccountParticipantId) -> StoreResult<Option<AccountParticipant>> {
        self.account_participants.get(&id)
    }

    async fn list_account_participants(&self, account_id: AccountId) -> StoreResult<Vec<AccountParticipant>> {
        let rows = self.account_participants.filter(|p| p.account_id() == account_id)?;
        Ok(sorted_by(rows, |p| p.name().to_string()))
    }

    async fn delete_account_participant(&self, id: AccountParticipantId) -> StoreResult<()> {
        self.account_participants.remove(&id)
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        self.events.insert(event.id_typed(), event.clone())
    }

    async fn update_event(&self, event: &Event) -> StoreResult<()> {
        self.events.update(event.id_typed(), event.clone())
    }

    async fn get_event(&self, id: EventId) -> StoreResult<Option<Event>> {
        self.events.get(&id)
    }

    async fn list_events(&self, region: Option<RegionId>) -> StoreResult<Vec<Event>> {
        let rows = self.events.filter(|e| region.is_none_or(|r| e.region_id() == r))?;
        Ok(sorted_by(rows, |e| (e.starts_on(), e.name().to_string())))
    }

    async fn delete_event(&self, id: EventId) -> StoreResult<()> {
        self.events.remove(&id)?;
        self.types.write()?.retain(|_, t| t.event_id() != id);
        self.tickets.write()?.retain(|_, t| t.event_id() != id);
        Ok(())
    }
}

#[async_trait]
impl TypeInscriptionRepository for InMemoryStore {
    async fn insert_type(&self, kind: &TypeInscription) -> StoreResult<()> {
        self.types.insert(kind.id_typed(), kind.clone())
    }

    async fn get_type(&self, id: TypeInscriptionId) -> StoreResult<Option<TypeInscription>> {
        self.types.get(&id)
    }

    async fn list_types(&self, event_id: EventId) -> StoreResult<Vec<TypeInscription>> {
        let rows = self.types.filter(|t| t.event_id() == event_id)?;
        Ok(sorted_by(rows, |t| t.description().to_string()))
    }

    async fn delete_type(&self, id: TypeInscriptionId) -> StoreResult<()> {
        self.types.remove(&id)
    }
}

#[async_trait]
impl EventTicketRepository for InMemoryStore {
    async fn insert_ticket(&self, ticket: &EventTicket) -> StoreResult<()> {
        self.tickets.insert(ticket.id_typed(), ticket.clone())
    }

    async fn update_ticket(&self, ticket: &EventTicket) -> StoreResult<()> {
        self.tickets.update(ticket.id_typed(), ticket.clone())
    }

    async fn get_ticket(&self, id: EventTicketId) -> StoreResult<Option<EventTicket>> {
        self.tickets.get(&id)
    }

    async fn list_tickets(&self, event_id: EventId) -> StoreResult<Vec<EventTicket>> {
        let rows = self.tickets.filter(|t| t.event_id() == event_id)?;
        Ok(sorted_by(rows, |t| t.created_at()))
    }
}

#[async_trait]
impl InscriptionRepository for InMemoryStore {
    async fn insert_inscription(&self, inscription: &Inscription, participants: &[Participant]) -> StoreResult<()> {
        self.inscriptions
            .insert(inscription.id_typed(), inscription.clone())?;
        self.participants
            .write()?
            .insert(inscription.id_typed(), participants.to_vec());
        Ok(())
    }

    async fn update_inscription(&self, inscription: &Inscription) -> StoreResult<()> {
        self.inscriptions
            .update(inscription.id_typed(), inscription.clone())
    }

    async fn get_inscription(&self, id: InscriptionId) -> StoreResult<Option<Inscription>> {
        self.inscriptions.get(&id)
    }

    async fn list_participants(&self, inscription_id: InscriptionId) -> StoreResult<Vec<Participant>> {
        Ok(self.participants.get(&inscription_id)?.unwrap_or_default())
    }

    async fn list_inscriptions_by_event(&self, event_id: EventId) -> StoreResult<Vec<Inscription>> {
        let rows = self.inscriptions.filter(|i| i.event_id() == event_id)?;
        Ok(sorted_by(rows, |i| i.created_at()))
    }

    async fn list_inscriptions_by_account(&self, account_id: AccountId) -> StoreResult<Vec<Inscription>> {
        let rows = self.inscriptions.filter(|i| i.account_id() == Some(account_id))?;
        Ok(sorted_by(rows, |i| i.created_at()))
    }

    async fn delete_inscription(&self, id: InscriptionId) -> StoreResult<()> {
        self.inscriptions.remove(&id)?;
        self.participants.write()?.remove(&id);
        Ok(())
    }

    async fn count_inscriptions_by_event(&self, event_id: EventId) -> StoreResult<u64> {
        Ok(self.inscriptions.filter(|i| i.event_id() == event_id)?.len() as u64)
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Inscription>> {
        self.inscriptions.filter(|i| i.is_expired_at(now))
    }

    async fn list_expired_guests(&self, now: DateTime<Utc>) -> StoreResult<Vec<Inscription>> {
        self.inscriptions.filter(|i| {
            i.is_guest() && i.status() != InscriptionStatus::Paid && i.expires_at().is_some_and(|at| at < now)
        })
    }

    async fn type_in_use(&self, type_id: TypeInscriptionId) -> StoreResult<bool> {
        Ok(self
            .participants
            .read()?
            .values()
            .flatten()
            .any(|p| p.type_inscription_id() == type_id))
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> StoreResult<()> {
        self.payments.insert(payment.id_typed(), payment.clone())
    }

    async fn update_payment(&self, payment: &Payment) -> StoreResult<()> {
        self.payments.update(payment.id_typed(), payment.clone())
    }

    async fn get_payment(&self, id: PaymentId) -> StoreResult<Option<Payment>> {
        self.payments.get(&id)
    }

    async fn list_payments_by_event(&self, event_id: EventId) -> StoreResult<Vec<Payment>> {
        let rows = self.payments.filter(|p| p.event_id() == event_id)?;
        Ok(sorted_by(rows, |p| p.created_at()))
    }

    async fn list_payments_by_inscription(&self, inscription_id: InscriptionId) -> StoreResult<Vec<Payment>> {
        let rows = self
            .payments
            .filter(|p| p.allocation_for(inscription_id).is_some())?;
        Ok(sorted_by(rows, |p| p.created_at()))
    }

    async fn delete_payment(&self, id: PaymentId) -> StoreResult<()> {
        self.payments.remove(&id)
    }

    async fn find_payment_by_installment_reference(&self, reference: &str) -> StoreResult<Option<Payment>> {
        Ok(self
            .payments
            .filter(|p| p.installments().iter().any(|i| i.gateway_reference() == Some(reference)))?
            .into_iter()
            .next())
    }
}

#[async_trait]
impl PaymentLinkRepository for InMemoryStore {
    async fn insert_link(&self, link: &PaymentLink) -> StoreResult<()> {
        self.links.insert(link.id_typed(), link.clone())
    }

    async fn update_link(&self, link: &PaymentLink) -> StoreResult<()> {
        self.links.update(link.id_typed(), link.clone())
    }

    async fn get_link(&self, id: PaymentLinkId) -> StoreResult<Option<PaymentLink>> {
        self.links.get(&id)
    }

    async fn get_link_by_token(&self, token: &str) -> StoreResult<Option<PaymentLink>> {
        Ok(self.links.filter(|l| l.token() == token)?.into_iter().next())
    }

    async fn delete_links_by_inscription(&self, inscription_id: InscriptionId) -> StoreResult<u64> {
        let mut rows = self.links.write()?;
        let before = rows.len();
        rows.retain(|_, l| l.inscription_id() != inscription_id);
        Ok((before - rows.len()) as u64)
    }
}

#[async_trait]
impl TicketSaleRepository for InMemoryStore {
    async fn insert_sale(&self, sale: &TicketSale) -> StoreResult<()> {
        self.sales.insert(sale.id_typed(), sale.clone())
    }

    async fn update_sale(&self, sale: &TicketSale) -> StoreResult<()> {
        self.sales.update(sale.id_typed(), sale.clone())
    }

    async fn get_sale(&self, id: TicketSaleId) -> StoreResult<Option<TicketSale>> {
        self.sales.get(&id)
    }

    async fn list_sales_by_event(&self, event_id: EventId) -> StoreResult<Vec<TicketSale>> {
        let rows = self.sales.filter(|s| s.event_id() == event_id)?;
        Ok(sorted_by(rows, |s| s.created_at()))
    }
}

#[async_trait]
impl CashRegisterRepository for InMemoryStore {
    async fn insert_register(&self, register: &CashRegister) -> StoreResult<()> {
        self.registers.insert(register.id_typed(), register.clone())
    }

    async fn save_register(&self, register: &CashRegister) -> StoreResult<()> {
        let mut rows = self.registers.write()?;
        let stored = rows.get(&register.id_typed()).ok_or(StoreError::NotFound)?;
        if register
            .event_ids()
            .iter()
            .any(|e| rows.values().any(|r| r.id_typed() != register.id_typed() && r.holds_event(*e)))
        {
            return Err(StoreError::Conflict("event is allocated to another cash register".to_string()));
        }
        // Balance only changes through record_movements.
        let updated = CashRegister::with(CashRegisterRecord {
            id: register.id_typed(),
            name: register.name().to_string(),
            region_id: register.region_id(),
            balance: stored.balance(),
            status: register.status(),
            event_ids: register.event_ids().to_vec(),
            created_at: register.created_at(),
        });
        rows.insert(register.id_typed(), updated);
        Ok(())
    }

    async fn get_register(&self, id: CashRegisterId) -> StoreResult<Option<CashRegister>> {
        self.registers.get(&id)
    }

    async fn list_registers(&self, region: Option<RegionId>) -> StoreResult<Vec<CashRegister>> {
        let rows = self.registers.filter(|r| region.is_none_or(|id| r.region_id() == id))?;
        Ok(sorted_by(rows, |r| r.name().to_string()))
    }

    async fn find_register_by_event(&self, event_id: EventId) -> StoreResult<Option<CashRegister>> {
        Ok(self.registers.filter(|r| r.holds_event(event_id))?.into_iter().next())
    }

    async fn record_movements(&self, registers: &[CashRegister], movements: &[CashMovement]) -> StoreResult<()> {
        let mut rows = self.registers.write()?;
        let mut history = self.movements.write()?;
        for register in registers {
            if !rows.contains_key(&register.id_typed()) {
                return Err(StoreError::NotFound);
            }
        }
        for register in registers {
            rows.insert(register.id_typed(), register.clone());
        }
        for movement in movements {
            history
                .entry(movement.cash_register_id())
                .or_default()
                .push(movement.clone());
        }
        Ok(())
    }

    async fn list_movements(&self, register_id: CashRegisterId) -> StoreResult<Vec<CashMovement>> {
        let rows = self.movements.get(&register_id)?.unwrap_or_default();
        Ok(sorted_by(rows, |m| m.created_at()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use regdesk_auth::Role;
    use regdesk_accounts::NewAccount;
    use regdesk_core::Money;
    use regdesk_events::NewEvent;
    use regdesk_finance::{MovementKind, MovementOrigin, NewCashMovement};
    use regdesk_inscriptions::NewInscription;

    fn account(username: &str) -> Account {
        Account::create(
            NewAccount {
                username: username.to_string(),
                name: "Nome".to_string(),
                email: None,
                role: Role::User,
                region_id: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn event() -> Event {
        Event::create(
            NewEvent {
                region_id: RegionId::new(),
                name: "Encontro".to_string(),
                description: None,
                location: None,
                starts_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                ends_on: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                max_participants: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = InMemoryStore::new();
        store.insert_account(&account("maria")).await.unwrap();
        assert!(matches!(
            store.insert_account(&account("maria")).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let store = InMemoryStore::new();
        assert_eq!(store.update_event(&event()).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn expired_guest_query_skips_paid_and_member_inscriptions() {
        let store = InMemoryStore::new();
        let e = event();
        let now = Utc::now();
        let make = |account_id, total| {
            Inscription::create(
                NewInscription {
                    event_id: e.id_typed(),
                    account_id,
                    responsible: "R".to_string(),
                    email: None,
                    phone: None,
                    total_value: Money::from_cents(total),
                },
                Some(now - chrono::Duration::minutes(1)),
                now - chrono::Duration::hours(1),
            )
            .unwrap()
        };
        let guest = make(None, 100);
        let free_guest = make(None, 0);
        let member = make(Some(AccountId::new()), 100);
        for i in [&guest, &free_guest, &member] {
            store.insert_inscription(i, &[]).await.unwrap();
        }

        let guests = store.list_expired_guests(now).await.unwrap();
        assert_eq!(guests.len(), 1);
        assert_eq!(guests[0].id_typed(), guest.id_typed());

        let pending = store.list_expired_pending(now).await.unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn movements_are_listed_in_time_order() {
        let store = InMemoryStore::new();
        let mut register = CashRegister::create("Caixa", RegionId::new(), Utc::now()).unwrap();
        store.insert_register(&register).await.unwrap();

        let start = Utc::now();
        let mut movements = Vec::new();
        for minutes in [3, 1, 2] {
            movements.push(
                register
                    .apply(
                        NewCashMovement {
                            kind: MovementKind::Income,
                            origin: MovementOrigin::Manual,
                            value: Money::from_cents(minutes * 100),
                            description: "entrada".to_string(),
                            reference_id: None,
                        },
                        start + chrono::Duration::minutes(minutes),
                    )
                    .unwrap(),
            );
        }
        store.record_movements(&[register.clone()], &movements).await.unwrap();

        let listed = store.list_movements(register.id_typed()).await.unwrap();
        let values: Vec<i64> = listed.iter().map(|m| m.value().cents()).collect();
        assert_eq!(values, vec![100, 200, 300]);
        let stored = store.get_register(register.id_typed()).await.unwrap().unwrap();
        assert_eq!(stored.balance(), Money::from_cents(600));
    }
}
