//! Fixtures shared by the use-case tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use regdesk_accounts::{Gender, Region};
use regdesk_auth::Role;
use regdesk_core::{AccountId, Money, RegionId};
use regdesk_events::{Event, EventId, NewEvent, NewTypeInscription, TypeInscription};
use regdesk_finance::CashRegister;
use regdesk_infra::{FakePaymentGateway, InscriptionCache, Stores};
use regdesk_inscriptions::{CacheRecord, Inscription};
use regdesk_payments::{Payment, PaymentMethod};

use crate::clock::ManualClock;
use crate::context::ActorContext;
use crate::finance::NewCashRegister;
use crate::inscriptions::{
    GuestInscription, GuestParticipant, IndividualInscription, InscriptionDetail, ParticipantSource,
};
use crate::payments::{AllocationRequest, PaymentRequest};
use crate::services::{AppServices, Settings};

pub const WEBHOOK_TOKEN: &str = "whsec-test";

pub struct Harness {
    pub services: AppServices,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<FakePaymentGateway>,
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    now().date_naive()
}

pub fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(now()));
    let gateway = Arc::new(FakePaymentGateway::new());
    let settings = Settings {
        webhook_token: Some(WEBHOOK_TOKEN.to_string()),
        ..Settings::default()
    };
    let services = AppServices::new(
        Stores::in_memory(),
        InscriptionCache::in_memory(),
        gateway.clone(),
        clock.clone(),
        settings,
    );
    Harness {
        services,
        clock,
        gateway,
    }
}

pub fn admin() -> ActorContext {
    ActorContext::new(AccountId::new(), Role::Admin, None)
}

pub fn manager(region_id: RegionId) -> ActorContext {
    ActorContext::new(AccountId::new(), Role::Manager, Some(region_id))
}

pub fn user() -> ActorContext {
    ActorContext::new(AccountId::new(), Role::User, None)
}

/// The user who staged `record`.
pub fn actor_for(record: &CacheRecord) -> ActorContext {
    ActorContext::new(record.owner, Role::User, None)
}

pub async fn seed_region(services: &AppServices) -> Region {
    services.create_region(&admin(), "Norte").await.unwrap()
}

pub fn new_event(region_id: RegionId, max_participants: Option<u32>) -> NewEvent {
    NewEvent {
        region_id,
        name: "Encontro Regional".to_string(),
        description: None,
        location: Some("Ginásio Municipal".to_string()),
        starts_on: today() + Duration::days(20),
        ends_on: today() + Duration::days(22),
        max_participants,
    }
}

pub async fn seed_event(services: &AppServices, max_participants: Option<u32>) -> Event {
    let region = seed_region(services).await;
    services
        .create_event(&admin(), new_event(region.id_typed(), max_participants))
        .await
        .unwrap()
}

pub async fn seed_paid_event(services: &AppServices, max_participants: Option<u32>) -> Event {
    let event = seed_event(services, max_participants).await;
    services
        .set_event_payments(&admin(), event.id_typed(), true)
        .await
        .unwrap()
}

pub async fn seed_type(services: &AppServices, event_id: EventId, description: &str, cents: i64) -> TypeInscription {
    services
        .create_type_inscription(
            &admin(),
            event_id,
            NewTypeInscription {
                description: description.to_string(),
                value: Money::from_cents(cents),
            },
        )
        .await
        .unwrap()
}

/// Open register in the event's region with the event allocated to it.
pub async fn seed_register(services: &AppServices, event: &Event) -> CashRegister {
    let admin = admin();
    let register = services
        .create_register(
            &admin,
            NewCashRegister {
                name: "Caixa do evento".to_string(),
                region_id: event.region_id(),
            },
        )
        .await
        .unwrap();
    services
        .allocate_event(&admin, register.id_typed(), event.id_typed())
        .await
        .unwrap()
}

pub fn inline_input(kind: &TypeInscription) -> IndividualInscription {
    IndividualInscription {
        type_inscription_id: kind.id_typed(),
        participant: ParticipantSource::Inline {
            name: "Joana Lima".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1995, 8, 14).unwrap(),
            gender: Gender::Female,
        },
        responsible: None,
        email: Some("joana@example.com".to_string()),
        phone: None,
    }
}

pub async fn stage_inline(
    services: &AppServices,
    actor: &ActorContext,
    event: &Event,
    kind: &TypeInscription,
) -> CacheRecord {
    services
        .stage_individual(actor, event.id_typed(), inline_input(kind))
        .await
        .unwrap()
}

pub async fn confirm_individual(
    services: &AppServices,
    actor: &ActorContext,
    event: &Event,
    kind: &TypeInscription,
) -> InscriptionDetail {
    let record = stage_inline(services, actor, event, kind).await;
    services.confirm_cache(actor, &record.key).await.unwrap()
}

pub fn guest_input(kind: &TypeInscription, participants: usize) -> GuestInscription {
    GuestInscription {
        responsible: "Responsável Teste".to_string(),
        email: Some("guest@example.com".to_string()),
        phone: None,
        participants: (0..participants)
            .map(|i| GuestParticipant {
                name: format!("Convidado {}", i + 1),
                birth_date: NaiveDate::from_ymd_opt(2001, 2, 3).unwrap(),
                gender: Gender::Male,
                type_inscription_id: kind.id_typed(),
            })
            .collect(),
    }
}

pub async fn submit_payment(
    services: &AppServices,
    actor: &ActorContext,
    event: &Event,
    allocations: &[(&Inscription, i64)],
) -> Payment {
    services
        .create_payment(
            actor,
            PaymentRequest {
                event_id: event.id_typed(),
                method: PaymentMethod::Pix,
                receipt_url: Some("https://files.example.com/receipt.pdf".to_string()),
                allocations: allocations
                    .iter()
                    .map(|(inscription, cents)| AllocationRequest {
                        inscription_id: inscription.id_typed(),
                        value: Money::from_cents(*cents),
                    })
                    .collect(),
            },
        )
        .await
        .unwrap()
}
