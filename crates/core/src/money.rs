//! Monetary amounts in the smallest currency unit (centavos).

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Amount of money in cents.
///
/// Signed so that reversals can be represented during arithmetic, but the
/// entities that hold balances never persist a negative amount.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("monetary overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("monetary overflow"))
    }

    /// Subtract, clamping at zero.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }

    pub fn checked_mul(self, factor: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(factor)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("monetary overflow"))
    }

    /// Require a strictly positive amount.
    pub fn ensure_positive(self, field: &str) -> DomainResult<Money> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(DomainError::validation(format!("{field} must be positive")))
        }
    }

    /// Require a non-negative amount.
    pub fn ensure_non_negative(self, field: &str) -> DomainResult<Money> {
        if self.is_negative() {
            Err(DomainError::validation(format!("{field} cannot be negative")))
        } else {
            Ok(self)
        }
    }

    /// Basis-point share of this amount, rounded half up (`399` bps = 3.99%).
    pub fn basis_points(self, bps: u32) -> Money {
        let raw = i128::from(self.0) * i128::from(bps);
        let rounded = (raw + 5_000) / 10_000;
        Money(rounded as i64)
    }

    /// Brazilian real formatting: `R$ 1.234,56`.
    pub fn format_brl(&self) -> String {
        let negative = self.0 < 0;
        let abs = self.0.unsigned_abs();
        let units = (abs / 100).to_string();
        let cents = abs % 100;

        let mut grouped = String::with_capacity(units.len() + units.len() / 3);
        for (i, ch) in units.chars().enumerate() {
            if i > 0 && (units.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        let sign = if negative { "-" } else { "" };
        format!("{sign}R$ {grouped},{cents:02}")
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.format_brl())
    }
}

// Operator arithmetic saturates at the i64 bounds. Balance-changing code goes
// through `checked_add`/`checked_sub` instead.
impl core::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl core::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl core::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> core::iter::Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
