use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

use regdesk_core::{DomainError, DomainResult, Money, define_id};
use regdesk_events::EventId;
use regdesk_inscriptions::InscriptionId;

define_id!(
    /// Payment link identifier.
    PaymentLinkId,
    "PaymentLinkId"
);

const TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentLinkStatus {
    Active,
    Used,
    Expired,
    Revoked,
}

impl PaymentLinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentLinkStatus::Active => "active",
            PaymentLinkStatus::Used => "used",
            PaymentLinkStatus::Expired => "expired",
            PaymentLinkStatus::Revoked => "revoked",
        }
    }
}

impl core::str::FromStr for PaymentLinkStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PaymentLinkStatus::Active),
            "used" => Ok(PaymentLinkStatus::Used),
            "expired" => Ok(PaymentLinkStatus::Expired),
            "revoked" => Ok(PaymentLinkStatus::Revoked),
            other => Err(DomainError::validation(format!("unknown payment link status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLinkRecord {
    pub id: PaymentLinkId,
    pub event_id: EventId,
    pub inscription_id: InscriptionId,
    pub token: String,
    pub value: Money,
    pub status: PaymentLinkStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Public, single-use token that lets someone pay an inscription's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    id: PaymentLinkId,
    event_id: EventId,
    inscription_id: InscriptionId,
    token: String,
    value: Money,
    status: PaymentLinkStatus,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl PaymentLink {
    pub fn create(
        event_id: EventId,
        inscription_id: InscriptionId,
        value: Money,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let value = value.ensure_positive("payment link value")?;
        if ttl <= Duration::zero() {
            return Err(DomainError::validation("payment link lifetime must be positive"));
        }
        Ok(Self {
            id: PaymentLinkId::new(),
            event_id,
            inscription_id,
            token: generate_token(),
            value,
            status: PaymentLinkStatus::Active,
            expires_at: now + ttl,
            created_at: now,
        })
    }

    pub fn with(record: PaymentLinkRecord) -> Self {
        Self {
            id: record.id,
            event_id: record.event_id,
            inscription_id: record.inscription_id,
            token: record.token,
            value: record.value,
            status: record.status,
            expires_at: record.expires_at,
            created_at: record.created_at,
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentLinkStatus::Active && now < self.expires_at
    }

    /// Status as seen at `now`; an active link past its expiry reads as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> PaymentLinkStatus {
        if self.status == PaymentLinkStatus::Active && now >= self.expires_at {
            PaymentLinkStatus::Expired
        } else {
            self.status
        }
    }

    pub fn mark_used(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_usable(now) {
            return Err(DomainError::invariant(format!(
                "payment link is {}",
                self.effective_status(now).as_str()
            )));
        }
        self.status = PaymentLinkStatus::Used;
        Ok(())
    }

    pub fn revoke(&mut self) -> DomainResult<()> {
        match self.status {
            PaymentLinkStatus::Active => {
                self.status = PaymentLinkStatus::Revoked;
                Ok(())
            }
            other => Err(DomainError::conflict(format!("payment link is already {}", other.as_str()))),
        }
    }

    pub fn id_typed(&self) -> PaymentLinkId {
        self.id
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn inscription_id(&self) -> InscriptionId {
        self.inscription_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn value(&self) -> Money {
        self.value
    }

    pub fn status(&self) -> PaymentLinkStatus {
        self.status
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
