//! Application use cases.
//!
//! Every operation is a method on [`AppServices`], takes the caller's
//! [`ActorContext`] where authorization applies and returns a
//! [`UsecaseResult`].

pub mod accounts;
pub mod clock;
pub mod context;
pub mod error;
pub mod events;
pub mod finance;
pub mod inscriptions;
pub mod payments;
pub mod reports;
pub mod services;
pub mod tickets;
pub mod workers;

#[cfg(test)]
mod testkit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::ActorContext;
pub use error::{ErrorKind, UsecaseError, UsecaseResult};
pub use finance::{CashTransfer, ManualMovement, NewCashRegister};
pub use inscriptions::{
    GroupResponsible, GuestInscription, GuestParticipant, GuestReceipt, IndividualInscription, InscriptionDetail,
    ParticipantSource,
};
pub use payments::{
    AllocationRequest, CheckoutRequest, CheckoutResult, PaymentLinkSummary, PaymentRequest, WebhookOutcome,
};
pub use services::{AppServices, Settings};
pub use tickets::SellTicket;
pub use workers::{WorkerHandle, spawn_default_workers, spawn_worker};
