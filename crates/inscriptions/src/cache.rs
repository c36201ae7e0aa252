//! Staged (not yet confirmed) inscriptions.
//!
//! A [`CacheRecord`] is what gets written to both cache tiers between upload
//! and confirmation. It carries the fully priced payload so confirming never
//! re-reads the CSV.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use regdesk_accounts::{AccountParticipantId, Gender};
use regdesk_core::{AccountId, DomainError, DomainResult, Money, require_text};
use regdesk_events::{EventId, TypeInscriptionId};

use crate::inscription::{Inscription, NewInscription};
use crate::participant::Participant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagedKind {
    Individual,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedParticipant {
    pub name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub type_inscription_id: TypeInscriptionId,
    pub type_description: String,
    pub value: Money,
    #[serde(default)]
    pub account_participant_id: Option<AccountParticipantId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedInscription {
    pub kind: StagedKind,
    pub responsible: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub participants: Vec<StagedParticipant>,
    pub total_value: Money,
}

impl StagedInscription {
    pub fn new(
        kind: StagedKind,
        responsible: &str,
        email: Option<String>,
        phone: Option<String>,
        participants: Vec<StagedParticipant>,
    ) -> DomainResult<Self> {
        let responsible = require_text("responsible", responsible)?;
        if participants.is_empty() {
            return Err(DomainError::validation("at least one participant is required"));
        }
        if kind == StagedKind::Individual && participants.len() != 1 {
            return Err(DomainError::validation("individual inscriptions have exactly one participant"));
        }

        let mut total_value = Money::zero();
        for participant in &participants {
            total_value = total_value.checked_add(participant.value)?;
        }

        Ok(Self {
            kind,
            responsible,
            email,
            phone,
            participants,
            total_value,
        })
    }

    pub fn participant_count(&self) -> u32 {
        self.participants.len() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    pub owner: AccountId,
    pub event_id: EventId,
    pub payload: StagedInscription,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheRecord {
    /// Stage a payload under a fresh key valid for `ttl`.
    pub fn stage(
        owner: AccountId,
        event_id: EventId,
        payload: StagedInscription,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: Uuid::now_v7().simple().to_string(),
            owner,
            event_id,
            payload,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn ensure_owner(&self, account_id: AccountId) -> DomainResult<()> {
        if self.owner != account_id {
            return Err(DomainError::forbidden("cache record belongs to another account"));
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Remaining lifetime in whole seconds (0 once expired).
    pub fn ttl_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }

    /// Build the inscription and its participants for persistence.
    pub fn into_inscription(
        self,
        pending_expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Inscription, Vec<Participant>)> {
        let payload = self.payload;
        let inscription = Inscription::create(
            NewInscription {
                event_id: self.event_id,
                account_id: Some(self.owner),
                responsible: payload.responsible,
                email: payload.email,
                phone: payload.phone,
                total_value: payload.total_value,
            },
            pending_expires_at,
            now,
        )?;

        let participants = payload
            .participants
            .into_iter()
            .map(|p| {
                Participant::create(
                    inscription.id_typed(),
                    &p.name,
                    p.birth_date,
                    p.gender,
                    p.type_inscription_id,
                    p.value,
                    p.account_participant_id,
                )
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Ok((inscription, participants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inscription::InscriptionStatus;

    fn staged(value: i64) -> StagedParticipant {
        StagedParticipant {
            name: "Joao".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
            gender: Gender::Male,
            type_inscription_id: TypeInscriptionId::new(),
            type_description: "Adulto".to_string(),
            value: Money::from_cents(value),
            account_participant_id: None,
        }
    }

    #[test]
    fn totals_participant_values() {
        let payload = StagedInscription::new(
            StagedKind::Group,
            "Maria",
            None,
            None,
            vec![staged(5_000), staged(2_500)],
        )
        .unwrap();
        assert_eq!(payload.total_value, Money::from_cents(7_500));
        assert_eq!(payload.participant_count(), 2);
    }

    #[test]
    fn requires_participants() {
        assert!(StagedInscription::new(StagedKind::Group, "Maria", None, None, vec![]).is_err());
        assert!(
            StagedInscription::new(StagedKind::Individual, "Maria", None, None, vec![staged(1), staged(2)]).is_err()
        );
    }

    #[test]
    fn owner_and_expiry_checks() {
        let owner = AccountId::new();
        let now = Utc::now();
        let payload = StagedInscription::new(StagedKind::Individual, "Maria", None, None, vec![staged(100)]).unwrap();
        let record = CacheRecord::stage(owner, EventId::new(), payload, Duration::minutes(30), now);

        assert!(record.ensure_owner(owner).is_ok());
        assert!(matches!(record.ensure_owner(AccountId::new()), Err(DomainError::Forbidden(_))));
        assert!(!record.is_expired(now));
        assert!(record.is_expired(now + Duration::minutes(30)));
        assert_eq!(record.ttl_seconds(now), 1_800);
        assert_eq!(record.ttl_seconds(now + Duration::hours(1)), 0);
    }

    #[test]
    fn converts_into_pending_or_paid_inscription() {
        let owner = AccountId::new();
        let now = Utc::now();

        let paid = StagedInscription::new(StagedKind::Individual, "Maria", None, None, vec![staged(0)]).unwrap();
        let (inscription, participants) = CacheRecord::stage(owner, EventId::new(), paid, Duration::minutes(1), now)
            .into_inscription(Some(now + Duration::hours(72)), now)
            .unwrap();
        assert_eq!(inscription.status(), InscriptionStatus::Paid);
        assert_eq!(participants.len(), 1);

        let owed =
            StagedInscription::new(StagedKind::Group, "Maria", None, None, vec![staged(10), staged(20)]).unwrap();
        let (inscription, participants) = CacheRecord::stage(owner, EventId::new(), owed, Duration::minutes(1), now)
            .into_inscription(Some(now + Duration::hours(72)), now)
            .unwrap();
        assert_eq!(inscription.status(), InscriptionStatus::Pending);
        assert_eq!(inscription.account_id(), Some(owner));
        assert!(participants.iter().all(|p| p.inscription_id() == inscription.id_typed()));
    }
}
