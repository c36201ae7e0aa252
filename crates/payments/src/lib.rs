//! Payments domain module.
//!
//! A [`Payment`] is split across one or more inscriptions through
//! [`PaymentAllocation`]s and, for card payments, into monthly
//! [`PaymentInstallment`]s. [`PaymentLink`]s let guests pay without an account.

pub mod installment;
pub mod link;
pub mod payment;

pub use installment::{InstallmentId, InstallmentStatus, PaymentInstallment, split_installments};
pub use link::{PaymentLink, PaymentLinkId, PaymentLinkRecord, PaymentLinkStatus};
pub use payment::{
    NewPayment, Payment, PaymentAllocation, PaymentId, PaymentMethod, PaymentOrigin, PaymentRecord, PaymentStatus,
};
