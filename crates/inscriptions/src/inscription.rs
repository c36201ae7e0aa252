use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use regdesk_core::{AccountId, DomainError, DomainResult, Money, define_id, require_text};
use regdesk_events::EventId;

define_id!(
    /// Inscription identifier.
    InscriptionId,
    "InscriptionId"
);

/// Inscription status lifecycle.
///
/// ```text
/// pending ──submit payment──▶ under_review ──approve (full)──▶ paid
///    ▲  │                         │
///    │  └──cancel/expire──▶ cancelled / expired
///    └────────refuse──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InscriptionStatus {
    Pending,
    UnderReview,
    Paid,
    Cancelled,
    Expired,
}

impl InscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InscriptionStatus::Pending => "pending",
            InscriptionStatus::UnderReview => "under_review",
            InscriptionStatus::Paid => "paid",
            InscriptionStatus::Cancelled => "cancelled",
            InscriptionStatus::Expired => "expired",
        }
    }

    /// Cancelled and expired inscriptions no longer hold event spots.
    pub fn is_closed(&self) -> bool {
        matches!(self, InscriptionStatus::Cancelled | InscriptionStatus::Expired)
    }
}

impl core::str::FromStr for InscriptionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InscriptionStatus::Pending),
            "under_review" => Ok(InscriptionStatus::UnderReview),
            "paid" => Ok(InscriptionStatus::Paid),
            "cancelled" => Ok(InscriptionStatus::Cancelled),
            "expired" => Ok(InscriptionStatus::Expired),
            other => Err(DomainError::validation(format!("unknown inscription status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInscription {
    pub event_id: EventId,
    /// `None` for guest inscriptions.
    pub account_id: Option<AccountId>,
    pub responsible: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub total_value: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InscriptionRecord {
    pub id: InscriptionId,
    pub event_id: EventId,
    pub account_id: Option<AccountId>,
    pub responsible: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: InscriptionStatus,
    pub total_value: Money,
    pub total_paid: Money,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A registration of one or more participants into an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inscription {
    id: InscriptionId,
    event_id: EventId,
    account_id: Option<AccountId>,
    responsible: String,
    email: Option<String>,
    phone: Option<String>,
    status: InscriptionStatus,
    total_value: Money,
    total_paid: Money,
    is_guest: bool,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl Inscription {
    /// Create a new inscription.
    ///
    /// Free inscriptions (total zero) are paid immediately and never expire.
    pub fn create(input: NewInscription, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DomainResult<Self> {
        let responsible = require_text("responsible", &input.responsible)?;
        let total_value = input.total_value.ensure_non_negative("total value")?;

        let (status, expires_at) = if total_value.is_zero() {
            (InscriptionStatus::Paid, None)
        } else {
            (InscriptionStatus::Pending, expires_at)
        };

        Ok(Self {
            id: InscriptionId::new(),
            event_id: input.event_id,
            is_guest: input.account_id.is_none(),
            account_id: input.account_id,
            responsible,
            email: input.email,
            phone: input.phone,
            status,
            total_value,
            total_paid: Money::zero(),
            created_at: now,
            expires_at,
        })
    }

    pub fn with(record: InscriptionRecord) -> Self {
        Self {
            id: record.id,
            event_id: record.event_id,
            account_id: record.account_id,
            responsible: record.responsible,
            email: record.email,
            phone: record.phone,
            status: record.status,
            total_value: record.total_value,
            total_paid: record.total_paid,
            is_guest: record.is_guest,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }

    /// Amount still owed.
    pub fn remaining(&self) -> Money {
        self.total_value.saturating_sub(self.total_paid)
    }

    pub fn is_owned_by(&self, account_id: AccountId) -> bool {
        self.account_id == Some(account_id)
    }

    /// Whether a new payment may be allocated to this inscription.
    pub fn accepts_payments(&self) -> bool {
        matches!(self.status, InscriptionStatus::Pending | InscriptionStatus::UnderReview)
    }

    /// A payment covering this inscription was submitted for review.
    pub fn mark_under_review(&mut self) -> DomainResult<()> {
        if !self.accepts_payments() {
            return Err(DomainError::invariant(format!(
                "inscription is {} and cannot receive payments",
                self.status.as_str()
            )));
        }
        self.status = InscriptionStatus::UnderReview;
        Ok(())
    }

    /// The payment under review was refused.
    pub fn return_to_pending(&mut self) {
        if self.status == InscriptionStatus::UnderReview {
            self.status = InscriptionStatus::Pending;
        }
    }

    /// Register an approved payment allocation.
    pub fn register_payment(&mut self, value: Money) -> DomainResult<()> {
        value.ensure_positive("payment value")?;
        if !self.accepts_payments() {
            return Err(DomainError::invariant(format!(
                "inscription is {} and cannot receive payments",
                self.status.as_str()
            )));
        }
        let paid = self.total_paid.checked_add(value)?;
        if paid > self.total_value {
            return Err(DomainError::invariant("payment exceeds the inscription total"));
        }

        self.total_paid = paid;
        // Any settled money stops the expiry clock.
        self.expires_at = None;
        self.status = if self.total_paid == self.total_value {
            InscriptionStatus::Paid
        } else {
            InscriptionStatus::Pending
        };
        Ok(())
    }

    /// Undo a previously registered payment (the payment is back under review).
    pub fn revert_payment(&mut self, value: Money) -> DomainResult<()> {
        value.ensure_positive("payment value")?;
        if value > self.total_paid {
            return Err(DomainError::invariant("cannot revert more than was paid"));
        }
        self.total_paid = self.total_paid.checked_sub(value)?;
        self.status = InscriptionStatus::UnderReview;
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        match self.status {
            InscriptionStatus::Cancelled | InscriptionStatus::Expired => Err(DomainError::conflict(format!(
                "inscription is already {}",
                self.status.as_str()
            ))),
            InscriptionStatus::Paid => Err(DomainError::invariant("paid inscriptions cannot be cancelled")),
            _ if self.total_paid.is_positive() => {
                Err(DomainError::invariant("inscriptions with payments cannot be cancelled"))
            }
            _ => {
                self.status = InscriptionStatus::Cancelled;
                Ok(())
            }
        }
    }

    /// Whether this inscription is pending past its expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == InscriptionStatus::Pending
            && self.total_paid.is_zero()
            && self.expires_at.is_some_and(|at| at < now)
    }

    pub fn expire(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_expired_at(now) {
            return Err(DomainError::invariant("inscription is not past its expiry"));
        }
        self.status = InscriptionStatus::Expired;
        Ok(())
    }

    pub fn id_typed(&self) -> InscriptionId {
        self.id
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn account_id(&self) -> Option<AccountId> {
        self.account_id
    }

    pub fn responsible(&self) -> &str {
        &self.responsible
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn status(&self) -> InscriptionStatus {
        self.status
    }

    pub fn total_value(&self) -> Money {
        self.total_value
    }

    pub fn total_paid(&self) -> Money {
        self.total_paid
    }

    pub fn is_guest(&self) -> bool {
        self.is_guest
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn inscription(total: i64) -> Inscription {
        let now = Utc::now();
        Inscription::create(
            NewInscription {
                event_id: EventId::new(),
                account_id: Some(AccountId::new()),
                responsible: "Ana".to_string(),
                email: None,
                phone: None,
                total_value: Money::from_cents(total),
            },
            Some(now + Duration::hours(72)),
            now,
        )
        .unwrap()
    }

    #[test]
    fn free_inscription_is_paid_on_creation() {
        let i = inscription(0);
        assert_eq!(i.status(), InscriptionStatus::Paid);
        assert_eq!(i.expires_at(), None);
    }

    #[test]
    fn guest_flag_follows_missing_account() {
        let i = Inscription::create(
            NewInscription {
                event_id: EventId::new(),
                account_id: None,
                responsible: "Visitante".to_string(),
                email: None,
                phone: None,
                total_value: Money::from_cents(100),
            },
            None,
            Utc::now(),
        )
        .unwrap();
        assert!(i.is_guest());
    }

    #[test]
    fn partial_then_full_payment() {
        let mut i = inscription(10_000);
        i.mark_under_review().unwrap();
        i.register_payment(Money::from_cents(4_000)).unwrap();
        assert_eq!(i.status(), InscriptionStatus::Pending);
        assert_eq!(i.remaining(), Money::from_cents(6_000));

        i.register_payment(Money::from_cents(6_000)).unwrap();
        assert_eq!(i.status(), InscriptionStatus::Paid);
        assert!(i.remaining().is_zero());
        assert_eq!(i.expires_at(), None);
    }

    #[test]
    fn overpayment_is_rejected() {
        let mut i = inscription(1_000);
        assert!(i.register_payment(Money::from_cents(1_001)).is_err());
        assert!(i.total_paid().is_zero());
    }

    #[test]
    fn paid_inscription_cannot_be_cancelled_or_receive_more() {
        let mut i = inscription(1_000);
        i.register_payment(Money::from_cents(1_000)).unwrap();
        assert!(i.cancel().is_err());
        assert!(i.mark_under_review().is_err());
    }

    #[test]
    fn partially_paid_inscription_cannot_be_cancelled() {
        let mut i = inscription(1_000);
        i.register_payment(Money::from_cents(10)).unwrap();
        assert!(matches!(i.cancel(), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn revert_moves_back_to_review() {
        let mut i = inscription(1_000);
        i.register_payment(Money::from_cents(1_000)).unwrap();
        i.revert_payment(Money::from_cents(1_000)).unwrap();
        assert_eq!(i.status(), InscriptionStatus::UnderReview);
        assert!(i.total_paid().is_zero());
        assert!(i.revert_payment(Money::from_cents(1)).is_err());
    }

    #[test]
    fn refused_payment_returns_to_pending() {
        let mut i = inscription(1_000);
        i.mark_under_review().unwrap();
        i.return_to_pending();
        assert_eq!(i.status(), InscriptionStatus::Pending);
    }

    #[test]
    fn only_pending_past_expiry_expires() {
        let mut i = inscription(1_000);
        let later = Utc::now() + Duration::hours(73);
        assert!(i.expire(Utc::now()).is_err());

        i.mark_under_review().unwrap();
        assert!(!i.is_expired_at(later));

        i.return_to_pending();
        i.expire(later).unwrap();
        assert_eq!(i.status(), InscriptionStatus::Expired);
        assert!(i.cancel().is_err());
    }

    #[test]
    fn partially_paid_inscription_never_expires() {
        let mut i = inscription(10_000);
        let later = Utc::now() + Duration::hours(73);
        i.mark_under_review().unwrap();
        i.register_payment(Money::from_cents(4_000)).unwrap();

        assert_eq!(i.status(), InscriptionStatus::Pending);
        assert_eq!(i.expires_at(), None);
        assert!(!i.is_expired_at(later));
        assert!(i.expire(later).is_err());
    }

    proptest! {
        #[test]
        fn paid_never_exceeds_total(total in 1i64..1_000_000, payments in prop::collection::vec(1i64..500_000, 1..10)) {
            let mut i = inscription(total);
            for p in payments {
                let _ = i.register_payment(Money::from_cents(p));
                prop_assert!(i.total_paid() <= i.total_value());
                prop_assert_eq!(i.status() == InscriptionStatus::Paid, i.total_paid() == i.total_value());
            }
        }
    }
}
