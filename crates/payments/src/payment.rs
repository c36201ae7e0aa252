use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use regdesk_core::{AccountId, DomainError, DomainResult, Money, define_id, require_text};
use regdesk_events::EventId;
use regdesk_inscriptions::InscriptionId;

use crate::installment::{InstallmentStatus, PaymentInstallment};

define_id!(
    /// Payment identifier.
    PaymentId,
    "PaymentId"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    Cash,
    Transfer,
    CreditCard,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Pix,
        PaymentMethod::Cash,
        PaymentMethod::Transfer,
        PaymentMethod::CreditCard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "pix",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::CreditCard => "credit_card",
        }
    }

    /// Only card payments may be split into installments.
    pub fn allows_installments(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard)
    }
}

impl core::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pix" => Ok(PaymentMethod::Pix),
            "cash" => Ok(PaymentMethod::Cash),
            "transfer" => Ok(PaymentMethod::Transfer),
            "credit_card" => Ok(PaymentMethod::CreditCard),
            other => Err(DomainError::validation(format!("unknown payment method '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOrigin {
    Manual,
    Link,
    Gateway,
}

impl PaymentOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOrigin::Manual => "manual",
            PaymentOrigin::Link => "link",
            PaymentOrigin::Gateway => "gateway",
        }
    }
}

impl core::str::FromStr for PaymentOrigin {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(PaymentOrigin::Manual),
            "link" => Ok(PaymentOrigin::Link),
            "gateway" => Ok(PaymentOrigin::Gateway),
            other => Err(DomainError::validation(format!("unknown payment origin '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    UnderReview,
    Approved,
    Refused,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::UnderReview => "under_review",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Refused => "refused",
        }
    }
}

impl core::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "under_review" => Ok(PaymentStatus::UnderReview),
            "approved" => Ok(PaymentStatus::Approved),
            "refused" => Ok(PaymentStatus::Refused),
            other => Err(DomainError::validation(format!("unknown payment status '{other}'"))),
        }
    }
}

/// Share of a payment credited to one inscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub payment_id: PaymentId,
    pub inscription_id: InscriptionId,
    pub value: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub event_id: EventId,
    pub account_id: Option<AccountId>,
    pub method: PaymentMethod,
    pub origin: PaymentOrigin,
    pub total_value: Money,
    pub receipt_url: Option<String>,
    pub gateway_reference: Option<String>,
    pub allocations: Vec<(InscriptionId, Money)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub event_id: EventId,
    pub account_id: Option<AccountId>,
    pub method: PaymentMethod,
    pub origin: PaymentOrigin,
    pub status: PaymentStatus,
    pub total_value: Money,
    pub receipt_url: Option<String>,
    pub rejection_reason: Option<String>,
    pub gateway_reference: Option<String>,
    pub allocations: Vec<PaymentAllocation>,
    pub installments: Vec<PaymentInstallment>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// A payment submitted for one event.
///
/// Every payment starts `under_review`. Approval is the only path that credits
/// inscriptions, and only an approved payment can be reverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    event_id: EventId,
    account_id: Option<AccountId>,
    method: PaymentMethod,
    origin: PaymentOrigin,
    status: PaymentStatus,
    total_value: Money,
    receipt_url: Option<String>,
    rejection_reason: Option<String>,
    gateway_reference: Option<String>,
    allocations: Vec<PaymentAllocation>,
    installments: Vec<PaymentInstallment>,
    created_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn create(input: NewPayment, now: DateTime<Utc>) -> DomainResult<Self> {
        let total_value = input.total_value.ensure_positive("payment total")?;
        if input.allocations.is_empty() {
            return Err(DomainError::validation("a payment must be allocated to at least one inscription"));
        }

        let id = PaymentId::new();
        let mut seen = HashSet::new();
        let mut allocated = Money::zero();
        let mut allocations = Vec::with_capacity(input.allocations.len());
        for (inscription_id, value) in input.allocations {
            let value = value.ensure_positive("allocation value")?;
            if !seen.insert(inscription_id) {
                return Err(DomainError::validation(format!(
                    "inscription {inscription_id} is allocated more than once"
                )));
            }
            allocated = allocated.checked_add(value)?;
            allocations.push(PaymentAllocation { payment_id: id, inscription_id, value });
        }
        if allocated != total_value {
            return Err(DomainError::validation(format!(
                "allocations sum to {allocated} but the payment total is {total_value}"
            )));
        }

        let receipt_url = input.receipt_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());

        Ok(Self {
            id,
            event_id: input.event_id,
            account_id: input.account_id,
            method: input.method,
            origin: input.origin,
            status: PaymentStatus::UnderReview,
            total_value,
            receipt_url,
            rejection_reason: None,
            gateway_reference: input.gateway_reference,
            allocations,
            installments: Vec::new(),
            created_at: now,
            reviewed_at: None,
        })
    }

    pub fn with(record: PaymentRecord) -> Self {
        Self {
            id: record.id,
            event_id: record.event_id,
            account_id: record.account_id,
            method: record.method,
            origin: record.origin,
            status: record.status,
            total_value: record.total_value,
            receipt_url: record.receipt_url,
            rejection_reason: record.rejection_reason,
            gateway_reference: record.gateway_reference,
            allocations: record.allocations,
            installments: record.installments,
            created_at: record.created_at,
            reviewed_at: record.reviewed_at,
        }
    }

    /// Attach the installment plan. The plan must cover the total exactly.
    pub fn attach_installments(&mut self, installments: Vec<PaymentInstallment>) -> DomainResult<()> {
        if installments.len() > 1 && !self.method.allows_installments() {
            return Err(DomainError::validation(format!(
                "{} payments cannot be split into installments",
                self.method.as_str()
            )));
        }
        let sum: Money = installments.iter().map(|i| i.value()).sum();
        if sum != self.total_value {
            return Err(DomainError::invariant("installments must add up to the payment total"));
        }
        if installments.iter().any(|i| i.payment_id() != self.id) {
            return Err(DomainError::invariant("installment belongs to another payment"));
        }
        self.installments = installments;
        Ok(())
    }

    /// Record the gateway charge this payment was created for.
    pub fn link_gateway_charge(&mut self, reference: impl Into<String>) -> DomainResult<()> {
        let reference = require_text("gateway reference", &reference.into())?;
        if self.gateway_reference.is_some() {
            return Err(DomainError::conflict("payment is already linked to a gateway charge"));
        }
        self.gateway_reference = Some(reference);
        Ok(())
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_under_review("approved")?;
        self.status = PaymentStatus::Approved;
        self.rejection_reason = None;
        self.reviewed_at = Some(now);
        Ok(())
    }

    pub fn reject(&mut self, reason: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let reason = require_text("rejection reason", reason)?;
        self.ensure_under_review("refused")?;
        self.status = PaymentStatus::Refused;
        self.rejection_reason = Some(reason);
        self.reviewed_at = Some(now);
        Ok(())
    }

    pub fn revert(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != PaymentStatus::Approved {
            return Err(DomainError::invariant(format!(
                "only approved payments can be reverted (payment is {})",
                self.status.as_str()
            )));
        }
        self.status = PaymentStatus::UnderReview;
        self.reviewed_at = Some(now);
        Ok(())
    }

    pub fn ensure_deletable(&self) -> DomainResult<()> {
        if self.status == PaymentStatus::Approved {
            return Err(DomainError::invariant("approved payments cannot be deleted"));
        }
        Ok(())
    }

    pub fn all_installments_paid(&self) -> bool {
        !self.installments.is_empty() && self.installments.iter().all(|i| i.status() == InstallmentStatus::Paid)
    }

    pub fn installment_by_reference_mut(&mut self, reference: &str) -> Option<&mut PaymentInstallment> {
        self.installments
            .iter_mut()
            .find(|i| i.gateway_reference() == Some(reference))
    }

    pub fn allocation_for(&self, inscription_id: InscriptionId) -> Option<&PaymentAllocation> {
        self.allocations.iter().find(|a| a.inscription_id == inscription_id)
    }

    fn ensure_under_review(&self, target: &str) -> DomainResult<()> {
        if self.status != PaymentStatus::UnderReview {
            return Err(DomainError::invariant(format!(
                "payment is {} and cannot be {target}",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    pub fn id_typed(&self) -> PaymentId {
        self.id
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn account_id(&self) -> Option<AccountId> {
        self.account_id
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn origin(&self) -> PaymentOrigin {
        self.origin
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn total_value(&self) -> Money {
        self.total_value
    }

    pub fn receipt_url(&self) -> Option<&str> {
        self.receipt_url.as_deref()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn gateway_reference(&self) -> Option<&str> {
        self.gateway_reference.as_deref()
    }

    pub fn allocations(&self) -> &[PaymentAllocation] {
        &self.allocations
    }

    pub fn installments(&self) -> &[PaymentInstallment] {
        &self.installments
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.reviewed_at
    }
}
