//! Inscriptions domain module.
//!
//! An inscription links an account (or a guest) to an event together with its
//! participants. New inscriptions are first staged as a [`CacheRecord`] so the
//! caller can review the computed price before confirming.

pub mod cache;
pub mod inscription;
pub mod participant;
pub mod upload;

pub use cache::{CacheRecord, StagedInscription, StagedKind, StagedParticipant};
pub use inscription::{Inscription, InscriptionId, InscriptionRecord, InscriptionStatus, NewInscription};
pub use participant::{Participant, ParticipantId};
pub use upload::{GroupUploadError, UploadLineError, parse_group_csv};
