//! Accounts domain module: regions, accounts and the reusable participant
//! profiles an account registers into events.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod account;
pub mod participant;
pub mod region;

pub use account::{Account, AccountRecord, NewAccount};
pub use participant::{
    AccountParticipant, AccountParticipantId, AccountParticipantRecord, Gender, NewAccountParticipant,
    UpdateAccountParticipant,
};
pub use region::Region;
