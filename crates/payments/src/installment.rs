use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use regdesk_core::{DomainError, DomainResult, Money, define_id};

use crate::payment::PaymentId;

define_id!(
    /// Installment identifier.
    InstallmentId,
    "InstallmentId"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Overdue,
    Refunded,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Overdue => "overdue",
            InstallmentStatus::Refunded => "refunded",
        }
    }
}

impl core::str::FromStr for InstallmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InstallmentStatus::Pending),
            "paid" => Ok(InstallmentStatus::Paid),
            "overdue" => Ok(InstallmentStatus::Overdue),
            "refunded" => Ok(InstallmentStatus::Refunded),
            other => Err(DomainError::validation(format!("unknown installment status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstallment {
    id: InstallmentId,
    payment_id: PaymentId,
    number: u32,
    value: Money,
    net_value: Money,
    status: InstallmentStatus,
    due_on: NaiveDate,
    paid_at: Option<DateTime<Utc>>,
    gateway_reference: Option<String>,
}

impl PaymentInstallment {
    #[allow(clippy::too_many_arguments)]
    pub fn with(
        id: InstallmentId,
        payment_id: PaymentId,
        number: u32,
        value: Money,
        net_value: Money,
        status: InstallmentStatus,
        due_on: NaiveDate,
        paid_at: Option<DateTime<Utc>>,
        gateway_reference: Option<String>,
    ) -> Self {
        Self {
            id,
            payment_id,
            number,
            value,
            net_value,
            status,
            due_on,
            paid_at,
            gateway_reference,
        }
    }

    pub fn set_gateway_reference(&mut self, reference: impl Into<String>) {
        self.gateway_reference = Some(reference.into());
    }

    /// Mark paid. Returns `false` when it already was (repeated webhook).
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> DomainResult<bool> {
        match self.status {
            InstallmentStatus::Paid => Ok(false),
            InstallmentStatus::Refunded => Err(DomainError::invariant("refunded installments cannot be paid")),
            InstallmentStatus::Pending | InstallmentStatus::Overdue => {
                self.status = InstallmentStatus::Paid;
                self.paid_at = Some(now);
                Ok(true)
            }
        }
    }

    pub fn mark_overdue(&mut self) -> bool {
        if self.status == InstallmentStatus::Pending {
            self.status = InstallmentStatus::Overdue;
            return true;
        }
        false
    }

    pub fn mark_refunded(&mut self) -> bool {
        if self.status == InstallmentStatus::Refunded {
            return false;
        }
        self.status = InstallmentStatus::Refunded;
        true
    }

    pub fn id_typed(&self) -> InstallmentId {
        self.id
    }

    pub fn payment_id(&self) -> PaymentId {
        self.payment_id
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn value(&self) -> Money {
        self.value
    }

    pub fn net_value(&self) -> Money {
        self.net_value
    }

    pub fn status(&self) -> InstallmentStatus {
        self.status
    }

    pub fn due_on(&self) -> NaiveDate {
        self.due_on
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn gateway_reference(&self) -> Option<&str> {
        self.gateway_reference.as_deref()
    }
}

/// Split `total` into `count` monthly installments.
///
/// Values differ by at most one cent and the remainder lands on the first
/// installments. `net_value` is the value minus the gateway fee of `fee_bps`
/// basis points (rounded half up). The first installment is due on
/// `first_due`, each following one a month later.
pub fn split_installments(
    payment_id: PaymentId,
    total: Money,
    count: u32,
    max: u32,
    first_due: NaiveDate,
    fee_bps: u32,
) -> DomainResult<Vec<PaymentInstallment>> {
    let total = total.ensure_positive("installment total")?;
    if count == 0 || count > max {
        return Err(DomainError::validation(format!("installments must be between 1 and {max}")));
    }
    if i64::from(count) > total.cents() {
        return Err(DomainError::validation("each installment must be at least one cent"));
    }

    let base = total.cents() / i64::from(count);
    let remainder = total.cents() % i64::from(count);

    (0..count)
        .map(|index| {
            let cents = base + i64::from(i64::from(index) < remainder);
            let value = Money::from_cents(cents);
            let net_value = value.checked_sub(value.basis_points(fee_bps))?;
            let due_on = first_due
                .checked_add_months(Months::new(index))
                .ok_or_else(|| DomainError::validation("installment due date out of range"))?;
            Ok(PaymentInstallment {
                id: InstallmentId::new(),
                payment_id,
                number: index + 1,
                value,
                net_value,
                status: InstallmentStatus::Pending,
                due_on,
                paid_at: None,
                gateway_reference: None,
            })
        })
        .collect()
}
