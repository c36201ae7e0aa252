//! Inscription flows: staging into the two-tier cache, confirmation, guest
//! inscriptions and the expiry passes run by the workers.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use regdesk_accounts::{AccountParticipantId, Gender};
use regdesk_auth::Permission;
use regdesk_events::{Event, EventId, TypeInscriptionId};
use regdesk_inscriptions::{
    CacheRecord, Inscription, InscriptionId, InscriptionStatus, NewInscription, Participant, StagedInscription,
    StagedKind, StagedParticipant, parse_group_csv,
};
use regdesk_payments::PaymentLink;

use crate::context::ActorContext;
use crate::error::{UsecaseError, UsecaseResult};
use crate::services::AppServices;

/// Contact data of whoever answers for a group upload.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupResponsible {
    pub responsible: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ParticipantSource {
    /// One of the caller's saved participant profiles.
    Profile { account_participant_id: AccountParticipantId },
    Inline {
        name: String,
        birth_date: NaiveDate,
        gender: Gender,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndividualInscription {
    pub type_inscription_id: TypeInscriptionId,
    pub participant: ParticipantSource,
    /// Defaults to the participant's name.
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuestParticipant {
    pub name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub type_inscription_id: TypeInscriptionId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuestInscription {
    pub responsible: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub participants: Vec<GuestParticipant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InscriptionDetail {
    pub inscription: Inscription,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuestReceipt {
    pub inscription: Inscription,
    pub participants: Vec<Participant>,
    /// Absent for free inscriptions.
    pub payment_link: Option<PaymentLink>,
}

impl AppServices {
    /// Parse and price a group spreadsheet, then stage it for review.
    #[instrument(skip(self, actor, contact, csv), fields(account_id = %actor.account_id(), bytes = csv.len()), err)]
    pub async fn upload_group(
        &self,
        actor: &ActorContext,
        event_id: EventId,
        contact: GroupResponsible,
        csv: &[u8],
    ) -> UsecaseResult<CacheRecord> {
        let event = self.load_open_event(event_id).await?;
        let types = self.stores.types.list_types(event_id).await?;
        if types.is_empty() {
            return Err(
                UsecaseError::invariant("event has no inscription types").with_context("event_id", event_id.to_string())
            );
        }

        let participants = parse_group_csv(csv, &types)?;
        let payload = StagedInscription::new(
            StagedKind::Group,
            &contact.responsible,
            contact.email,
            contact.phone,
            participants,
        )?;
        ensure_capacity(&event, payload.participant_count())?;
        self.stage(actor, event_id, payload).await
    }

    /// Stage a single participant, from a saved profile or inline data.
    pub async fn stage_individual(
        &self,
        actor: &ActorContext,
        event_id: EventId,
        input: IndividualInscription,
    ) -> UsecaseResult<CacheRecord> {
        let event = self.load_open_event(event_id).await?;
        let kind = self
            .stores
            .types
            .get_type(input.type_inscription_id)
            .await?
            .filter(|t| t.event_id() == event_id)
            .ok_or_else(|| UsecaseError::type_inscription_not_found(input.type_inscription_id))?;

        let (name, birth_date, gender, account_participant_id) = match input.participant {
            ParticipantSource::Profile { account_participant_id } => {
                let profile = self.load_own_participant(actor, account_participant_id).await?;
                (
                    profile.name().to_string(),
                    profile.birth_date(),
                    profile.gender(),
                    Some(account_participant_id),
                )
            }
            ParticipantSource::Inline { name, birth_date, gender } => (name, birth_date, gender, None),
        };

        let responsible = input.responsible.unwrap_or_else(|| name.clone());
        let participant = StagedParticipant {
            name,
            birth_date,
            gender,
            type_inscription_id: kind.id_typed(),
            type_description: kind.description().to_string(),
            value: kind.value(),
            account_participant_id,
        };
        let payload = StagedInscription::new(
            StagedKind::Individual,
            &responsible,
            input.email,
            input.phone,
            vec![participant],
        )?;
        ensure_capacity(&event, 1)?;
        self.stage(actor, event_id, payload).await
    }

    async fn stage(
        &self,
        actor: &ActorContext,
        event_id: EventId,
        payload: StagedInscription,
    ) -> UsecaseResult<CacheRecord> {
        let now = self.now();
        let record = CacheRecord::stage(actor.account_id(), event_id, payload, self.settings.cache_ttl, now);
        self.cache.put(&record, now).await?;
        info!(
            key = %record.key,
            event_id = %event_id,
            participants = record.payload.participant_count(),
            total = record.payload.total_value.cents(),
            "inscription staged"
        );
        Ok(record)
    }

    pub async fn find_cache(&self, actor: &ActorContext, key: &str) -> UsecaseResult<CacheRecord> {
        self.load_cache(actor, key).await
    }

    /// Turn a staged record into a persisted inscription.
    #[instrument(skip(self, actor), fields(account_id = %actor.account_id()), err)]
    pub async fn confirm_cache(&self, actor: &ActorContext, key: &str) -> UsecaseResult<InscriptionDetail> {
        let record = self.load_cache(actor, key).await?;
        let now = self.now();

        let mut event = self.load_open_event(record.event_id).await?;
        event.reserve_spots(record.payload.participant_count())?;

        let (inscription, participants) = record.into_inscription(Some(now + self.settings.pending_ttl), now)?;
        self.stores
            .inscriptions
            .insert_inscription(&inscription, &participants)
            .await?;
        self.stores.events.update_event(&event).await?;

        if let Err(e) = self.cache.delete(key).await {
            warn!(key, error = %e, "confirmed cache record could not be removed");
        }
        info!(
            inscription_id = %inscription.id_typed(),
            event_id = %inscription.event_id(),
            status = inscription.status().as_str(),
            participants = participants.len(),
            "inscription confirmed"
        );
        Ok(InscriptionDetail {
            inscription,
            participants,
        })
    }

    pub async fn cancel_cache(&self, actor: &ActorContext, key: &str) -> UsecaseResult<()> {
        let record = self
            .cache
            .get(key, self.now())
            .await?
            .ok_or_else(|| UsecaseError::cache_record_not_found(key))?;
        if record.ensure_owner(actor.account_id()).is_err() {
            return Err(UsecaseError::cache_record_forbidden(key));
        }
        self.cache.delete(key).await?;
        info!(key, "staged inscription discarded");
        Ok(())
    }

    /// Lookup + ownership + expiry. Expired records are removed from both tiers.
    async fn load_cache(&self, actor: &ActorContext, key: &str) -> UsecaseResult<CacheRecord> {
        let now = self.now();
        let record = self
            .cache
            .get(key, now)
            .await?
            .ok_or_else(|| UsecaseError::cache_record_not_found(key))?;
        if record.ensure_owner(actor.account_id()).is_err() {
            return Err(UsecaseError::cache_record_forbidden(key));
        }
        if record.is_expired(now) {
            self.cache.delete(key).await?;
            return Err(UsecaseError::cache_record_expired(key));
        }
        Ok(record)
    }

    /// Public inscription without an account; paid through a payment link.
    #[instrument(skip(self, input), err)]
    pub async fn create_guest(&self, event_id: EventId, input: GuestInscription) -> UsecaseResult<GuestReceipt> {
        if input.participants.is_empty() {
            return Err(UsecaseError::validation("at least one participant is required"));
        }
        let mut event = self.load_open_event(event_id).await?;
        let types = self.stores.types.list_types(event_id).await?;

        let mut priced = Vec::with_capacity(input.participants.len());
        let mut total = regdesk_core::Money::zero();
        for participant in input.participants {
            let kind = types
                .iter()
                .find(|t| t.id_typed() == participant.type_inscription_id)
                .ok_or_else(|| UsecaseError::type_inscription_not_found(participant.type_inscription_id))?;
            total = total.checked_add(kind.value())?;
            priced.push((participant, kind.value()));
        }
        if total.is_positive() && !event.payment_enabled() {
            return Err(UsecaseError::payments_disabled(event_id));
        }

        let now = self.now();
        let inscription = Inscription::create(
            NewInscription {
                event_id,
                account_id: None,
                responsible: input.responsible,
                email: input.email,
                phone: input.phone,
                total_value: total,
            },
            Some(now + self.settings.guest_ttl),
            now,
        )?;
        let participants = priced
            .into_iter()
            .map(|(p, value)| {
                Participant::create(
                    inscription.id_typed(),
                    &p.name,
                    p.birth_date,
                    p.gender,
                    p.type_inscription_id,
                    value,
                    None,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        event.reserve_spots(participants.len() as u32)?;
        self.stores
            .inscriptions
            .insert_inscription(&inscription, &participants)
            .await?;
        self.stores.events.update_event(&event).await?;

        let payment_link = if inscription.remaining().is_positive() {
            let ttl = self.settings.link_ttl.min(self.settings.guest_ttl);
            let link = PaymentLink::create(event_id, inscription.id_typed(), inscription.remaining(), ttl, now)?;
            self.stores.links.insert_link(&link).await?;
            Some(link)
        } else {
            None
        };

        info!(
            inscription_id = %inscription.id_typed(),
            event_id = %event_id,
            total = total.cents(),
            "guest inscription created"
        );
        Ok(GuestReceipt {
            inscription,
            participants,
            payment_link,
        })
    }

    pub async fn list_event_inscriptions(
        &self,
        actor: &ActorContext,
        event_id: EventId,
    ) -> UsecaseResult<Vec<Inscription>> {
        self.load_event_for_staff(actor, event_id, &Permission::INSCRIPTIONS_MANAGE)
            .await?;
        Ok(self.stores.inscriptions.list_inscriptions_by_event(event_id).await?)
    }

    pub async fn list_my_inscriptions(&self, actor: &ActorContext) -> UsecaseResult<Vec<Inscription>> {
        Ok(self
            .stores
            .inscriptions
            .list_inscriptions_by_account(actor.account_id())
            .await?)
    }

    pub async fn find_inscription(&self, actor: &ActorContext, id: InscriptionId) -> UsecaseResult<InscriptionDetail> {
        let inscription = self.load_visible_inscription(actor, id).await?;
        let participants = self.stores.inscriptions.list_participants(id).await?;
        Ok(InscriptionDetail {
            inscription,
            participants,
        })
    }

    /// Owner or staff; releases the inscription's spots on the event.
    pub async fn cancel_inscription(&self, actor: &ActorContext, id: InscriptionId) -> UsecaseResult<Inscription> {
        let mut inscription = self.load_visible_inscription(actor, id).await?;
        if !inscription.is_owned_by(actor.account_id()) {
            actor.require(&Permission::INSCRIPTIONS_MANAGE)?;
        }
        inscription.cancel()?;

        let participants = self.stores.inscriptions.list_participants(id).await?;
        let mut event = self.load_event(inscription.event_id()).await?;
        event.release_spots(participants.len() as u32);

        self.stores.inscriptions.update_inscription(&inscription).await?;
        self.stores.events.update_event(&event).await?;
        info!(inscription_id = %id, released = participants.len(), "inscription cancelled");
        Ok(inscription)
    }

    /// Staff only, and only for inscriptions without payments.
    pub async fn delete_inscription(&self, actor: &ActorContext, id: InscriptionId) -> UsecaseResult<()> {
        actor.require(&Permission::INSCRIPTIONS_MANAGE)?;
        let inscription = self.load_visible_inscription(actor, id).await?;
        let payments = self.stores.payments.list_payments_by_inscription(id).await?;
        if !payments.is_empty() {
            return Err(UsecaseError::invariant(format!(
                "inscription has {} payment(s) and cannot be deleted",
                payments.len()
            ))
            .with_context("inscription_id", id.to_string()));
        }
        self.remove_inscription(&inscription).await?;
        info!(inscription_id = %id, "inscription deleted");
        Ok(())
    }

    /// Delete an inscription with its links, giving back spots it still holds.
    async fn remove_inscription(&self, inscription: &Inscription) -> UsecaseResult<u32> {
        let id = inscription.id_typed();
        let released = if holds_spots(inscription.status()) {
            self.stores.inscriptions.list_participants(id).await?.len() as u32
        } else {
            0
        };

        self.stores.links.delete_links_by_inscription(id).await?;
        self.stores.inscriptions.delete_inscription(id).await?;
        if released > 0 {
            let mut event = self.load_event(inscription.event_id()).await?;
            event.release_spots(released);
            self.stores.events.update_event(&event).await?;
        }
        Ok(released)
    }

    /// Pending inscriptions past their expiry become expired. Returns how many.
    #[instrument(skip(self), err)]
    pub async fn cancel_expired(&self) -> UsecaseResult<u64> {
        let now = self.now();
        let overdue = self.stores.inscriptions.list_expired_pending(now).await?;
        let mut released: HashMap<EventId, u32> = HashMap::new();
        let mut expired = 0u64;

        for mut inscription in overdue {
            let id = inscription.id_typed();
            if let Err(e) = inscription.expire(now) {
                debug!(inscription_id = %id, error = %e, "skipping inscription");
                continue;
            }
            let participants = self.stores.inscriptions.list_participants(id).await?;
            self.stores.inscriptions.update_inscription(&inscription).await?;
            *released.entry(inscription.event_id()).or_default() += participants.len() as u32;
            expired += 1;
        }

        self.release_event_spots(released).await?;
        if expired > 0 {
            info!(expired, "expired pending inscriptions");
        }
        Ok(expired)
    }

    /// Unpaid guest inscriptions past their expiry are deleted. Also purges
    /// expired staged records from the cache. Returns the deleted inscriptions.
    #[instrument(skip(self), err)]
    pub async fn cleanup_guests(&self) -> UsecaseResult<u64> {
        let now = self.now();
        let stale = self.stores.inscriptions.list_expired_guests(now).await?;
        let mut removed = 0u64;

        for inscription in stale {
            let id = inscription.id_typed();
            if !self.stores.payments.list_payments_by_inscription(id).await?.is_empty() {
                debug!(inscription_id = %id, "guest inscription has payments; kept");
                continue;
            }
            self.remove_inscription(&inscription).await?;
            removed += 1;
        }

        let purged = self.cache.purge_expired(now).await?;
        if removed > 0 || purged > 0 {
            info!(removed, purged, "guest inscriptions cleaned up");
        }
        Ok(removed)
    }

    async fn release_event_spots(&self, released: HashMap<EventId, u32>) -> UsecaseResult<()> {
        for (event_id, spots) in released {
            match self.stores.events.get_event(event_id).await? {
                Some(mut event) => {
                    event.release_spots(spots);
                    self.stores.events.update_event(&event).await?;
                }
                None => warn!(event_id = %event_id, "event vanished while releasing spots"),
            }
        }
        Ok(())
    }

    pub(crate) async fn load_inscription(&self, id: InscriptionId) -> UsecaseResult<Inscription> {
        self.stores
            .inscriptions
            .get_inscription(id)
            .await?
            .ok_or_else(|| UsecaseError::inscription_not_found(id))
    }

    /// Owners see their own inscriptions; staff those of events in their reach.
    pub(crate) async fn load_visible_inscription(
        &self,
        actor: &ActorContext,
        id: InscriptionId,
    ) -> UsecaseResult<Inscription> {
        let inscription = self.load_inscription(id).await?;
        if inscription.is_owned_by(actor.account_id()) {
            return Ok(inscription);
        }
        if !actor.is_staff() {
            return Err(UsecaseError::inscription_not_found(id));
        }
        let event = self.load_event(inscription.event_id()).await?;
        actor.ensure_region(event.region_id())?;
        Ok(inscription)
    }

    async fn load_open_event(&self, id: EventId) -> UsecaseResult<Event> {
        let event = self.load_event(id).await?;
        if !event.accepts_inscriptions(self.now().date_naive()) {
            return Err(UsecaseError::event_not_accepting_inscriptions(id));
        }
        Ok(event)
    }
}

fn ensure_capacity(event: &Event, participants: u32) -> UsecaseResult<()> {
    match event.remaining_spots() {
        Some(remaining) if participants > remaining => Err(UsecaseError::invariant(format!(
            "event has {remaining} spot(s) left, {participants} requested"
        ))
        .with_context("event_id", event.id_typed().to_string())),
        _ => Ok(()),
    }
}

/// Whether an inscription in this status still counts against event capacity.
fn holds_spots(status: InscriptionStatus) -> bool {
    !matches!(status, InscriptionStatus::Cancelled | InscriptionStatus::Expired)
}
