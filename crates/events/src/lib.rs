//! Events domain module: events, their priced inscription types and the
//! tickets sold at the door.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod event;
pub mod ticket;
pub mod type_inscription;

pub use event::{Event, EventId, EventRecord, EventStatus, NewEvent, UpdateEvent};
pub use ticket::{EventTicket, EventTicketId, EventTicketRecord, NewEventTicket};
pub use type_inscription::{NewTypeInscription, TypeInscription, TypeInscriptionId};
