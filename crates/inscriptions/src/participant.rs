use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use regdesk_accounts::{AccountParticipantId, Gender};
use regdesk_core::{DomainResult, Money, define_id, require_text};
use regdesk_events::TypeInscriptionId;

use crate::inscription::InscriptionId;

define_id!(
    /// Identifier of a participant inside an inscription.
    ParticipantId,
    "ParticipantId"
);

/// A person attending the event under an inscription.
///
/// `value` is the price of the inscription type at the moment the inscription
/// was confirmed; later changes to the type do not reprice it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    id: ParticipantId,
    inscription_id: InscriptionId,
    name: String,
    birth_date: NaiveDate,
    gender: Gender,
    type_inscription_id: TypeInscriptionId,
    value: Money,
    account_participant_id: Option<AccountParticipantId>,
}

impl Participant {
    pub fn create(
        inscription_id: InscriptionId,
        name: &str,
        birth_date: NaiveDate,
        gender: Gender,
        type_inscription_id: TypeInscriptionId,
        value: Money,
        account_participant_id: Option<AccountParticipantId>,
    ) -> DomainResult<Self> {
        let name = require_text("participant name", name)?;
        let value = value.ensure_non_negative("participant value")?;
        Ok(Self {
            id: ParticipantId::new(),
            inscription_id,
            name,
            birth_date,
            gender,
            type_inscription_id,
            value,
            account_participant_id,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with(
        id: ParticipantId,
        inscription_id: InscriptionId,
        name: String,
        birth_date: NaiveDate,
        gender: Gender,
        type_inscription_id: TypeInscriptionId,
        value: Money,
        account_participant_id: Option<AccountParticipantId>,
    ) -> Self {
        Self {
            id,
            inscription_id,
            name,
            birth_date,
            gender,
            type_inscription_id,
            value,
            account_participant_id,
        }
    }

    pub fn id_typed(&self) -> ParticipantId {
        self.id
    }

    pub fn inscription_id(&self) -> InscriptionId {
        self.inscription_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.birth_date
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn type_inscription_id(&self) -> TypeInscriptionId {
        self.type_inscription_id
    }

    pub fn value(&self) -> Money {
        self.value
    }

    pub fn account_participant_id(&self) -> Option<AccountParticipantId> {
        self.account_participant_id
    }
}
