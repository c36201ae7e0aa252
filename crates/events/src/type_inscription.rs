use serde::{Deserialize, Serialize};

use regdesk_core::{DomainResult, Money, define_id, require_text};

use crate::EventId;

define_id!(
    /// Identifier of a priced inscription type (e.g. "Adulto", "Criança").
    TypeInscriptionId,
    "TypeInscriptionId"
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTypeInscription {
    pub description: String,
    pub value: Money,
}

/// A price category participants are registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInscription {
    id: TypeInscriptionId,
    event_id: EventId,
    description: String,
    value: Money,
}

impl TypeInscription {
    /// Free types (value zero) are allowed; negative values are not.
    pub fn create(event_id: EventId, input: NewTypeInscription) -> DomainResult<Self> {
        Ok(Self {
            id: TypeInscriptionId::new(),
            event_id,
            description: require_text("description", &input.description)?,
            value: input.value.ensure_non_negative("value")?,
        })
    }

    pub fn with(id: TypeInscriptionId, event_id: EventId, description: String, value: Money) -> Self {
        Self {
            id,
            event_id,
            description,
            value,
        }
    }

    /// Case-insensitive match used when parsing uploaded spreadsheets.
    pub fn matches_description(&self, raw: &str) -> bool {
        self.description.to_lowercase() == raw.trim().to_lowercase()
    }

    pub fn id_typed(&self) -> TypeInscriptionId {
        self.id
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn value(&self) -> Money {
        self.value
    }
}
